pub mod record;
pub mod buffer;
pub mod dispatch;
pub mod transport;
pub mod connection;
pub mod engine;
pub mod stats;
pub mod error;
pub mod config;
pub mod env;

pub mod handler;
pub mod buffered;
pub mod direct;

pub mod layer;
pub mod init;
pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongo;
