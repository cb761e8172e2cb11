//! tanq realtime server library.
//! Voice signaling rooms over WebSocket and per-user notification streams
//! over Server-Sent Events. Modules are public for integration testing;
//! the binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod notifications;
pub mod routes;
pub mod state;
pub mod voice;
pub mod ws;
