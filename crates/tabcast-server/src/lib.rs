//! tabcast Server Library
//!
//! Core functionality for the tabcast relay server:
//! - Correlation store for in-flight extension commands
//! - Relay engine bridging HTTP callers to the extension WebSocket
//! - HTTP API routes and the extension WebSocket endpoint
//! - HTML → Markdown conversion boundary

pub mod markdown;
pub mod registry;
pub mod relay;
pub mod server;
