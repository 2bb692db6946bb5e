//! Taskboard Protocol
//!
//! Shared types for communication between the Taskboard API and its clients.
//! These types are serialized as JSON over HTTP and the notification WebSocket.

pub mod client;
pub mod server;
pub mod types;

pub use client::*;
pub use server::*;
pub use types::*;
