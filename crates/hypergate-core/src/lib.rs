//! hypergate core library
//!
//! Shared functionality for the hypergate gateway:
//! - Environment-driven configuration resolution, including the
//!   simulation-mode overrides
//! - RPC endpoint resolution for the hyperspace daemon socket
//! - Common error types
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod socket;
pub mod tracing_init;

pub use config::{GatewayConfig, Mode, ResolvedConfig, Storage};
pub use error::{Error, Result};
pub use socket::{RpcEndpoint, RpcStream};
