//! Player Server Library
//!
//! A restartable HTTP listener exposing a single status endpoint.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod server;

pub use api::ApiServer;
pub use config::Config;
pub use error::{Result, ServerError};
pub use lifecycle::{Endpoint, LifecycleState};
pub use server::{Server, ServerHandle};
