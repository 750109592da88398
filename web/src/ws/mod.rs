//! WebSocket transport for the relay socket.
//!
//! This module only adapts axum WebSocket sessions to Router events. Connection
//! state, registration and fan-out live in the `relay` crate.

pub mod handler;
