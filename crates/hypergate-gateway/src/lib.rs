//! Hypergate gateway library.
//!
//! Bridges WebSocket clients into a hyperspace daemon's RPC socket and owns
//! the daemon's lifecycle: attach to a running daemon, spawn one when
//! nothing answers, or bootstrap an isolated simulator stack.

pub mod gateway;
pub mod hyperspace;
pub mod supervisor;
