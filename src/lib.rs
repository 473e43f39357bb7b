pub mod authenticator;
pub mod client;
pub mod config;
pub mod credential;
pub mod credential_store;
pub mod http;
pub mod http_client;
pub mod parameters;
pub mod telemetry;
pub mod token_manager;

pub use client::{SmartControl, SmartControlError};
pub use config::SmartControlConfig;

use crate::token_manager::{TokenManagerError, ValidToken};

/// The TokenRetriever will be the responsible to hand out a usable bearer token
pub trait TokenRetriever {
    fn retrieve(&self) -> Result<ValidToken, TokenManagerError>;
}
