//! # Configuration
//!
//! Controller and server settings loaded from environment variables.
//! Values are read once at start-up; changing them requires a restart.

mod controller;
mod env;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
