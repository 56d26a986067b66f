//! # Application Layer Network Protocols
//!
//! This module contains the application layer (OSI Layer 7) protocols built on
//! the core network traits.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 engine for lightweight publish-subscribe messaging
//!
//! ## Design Principles
//!
//! - **Transport Agnostic**: Work with any type implementing [`Transport`](crate::network::Transport)
//! - **No-std Compatible**: Designed for embedded systems with an allocator
//! - **Non-blocking**: Progress is made by pumping, never by waiting
//! - **Error Handling**: Typed errors for every failure path

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 session engine and packet codec, commonly used in
/// IoT applications.
pub mod mqtt;
