//! Error types for the cache
//!
//! Cache operations themselves never fail. Errors only come from loading
//! configuration and from polling a subscription without waiting.

use thiserror::Error;

// == Config Error Enum ==
/// Errors produced while loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

// == Try Recv Error Enum ==
/// Returned by [`Subscription::try_recv`](crate::cache::Subscription::try_recv).
///
/// Subscriptions never complete, so the only failure is an empty queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// No emission is pending right now
    #[error("No emission pending")]
    Empty,
}

// == Result Type Alias ==
/// Convenience Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;
