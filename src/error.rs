use crate::transport::TransportError;

/// Error returned when a handler cannot be constructed.
///
/// Only construction can fail; once built, a handler absorbs every
/// transport failure itself.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("capacity must be a positive number of records")]
    ZeroCapacity,

    #[error("database and collection names must not be empty")]
    EmptyNamespace,

    #[error("could not connect while preparing the handler: {0}")]
    Connect(#[source] TransportError),

    #[error("could not create the target collection: {0}")]
    CollectionSetup(#[source] TransportError),
}

/// Error returned when configuration read from the environment is invalid.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
