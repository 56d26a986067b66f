//! # libiot-mqtt - MQTT 3.1.1 for IoT devices
//!
//! A device-side MQTT 3.1.1 protocol engine for embedded systems. It is split
//! into three parts:
//!
//! - a **packet codec** that builds outbound control packets and splits an
//!   inbound byte stream into frames, whatever size the chunks arrive in,
//! - a **session engine** that owns one broker connection: the CONNECT
//!   handshake, QoS acknowledgment flows and keep-alive pings,
//! - a **message** value type shared by both.
//!
//! The engine never blocks and never spawns threads. It talks to the network
//! through the completion-driven [`Transport`](network::Transport) trait and
//! reads time from a [`TickCounter`](system::TickCounter); the application
//! calls [`Client::pump`](network::application::mqtt::Client::pump)
//! periodically and receives results through an
//! [`EventHandler`](network::application::mqtt::EventHandler).
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libiot-mqtt = "0.1.0"
//! ```
//!
//! ### Encoding and decoding
//!
//! ```rust
//! use libiot_mqtt::network::application::mqtt::codec::{self, Decoder, PacketType};
//!
//! let mut stream = codec::encode_connack(false, 0);
//! stream.extend(codec::encode_puback(7));
//!
//! let mut decoder = Decoder::new();
//! let types: Vec<PacketType> = decoder
//!     .feed(&stream)
//!     .map(|frame| frame.unwrap().packet_type)
//!     .collect();
//!
//! assert_eq!(types, [PacketType::ConnAck, PacketType::PubAck]);
//! ```
//!
//! ### Running a session
//!
//! See [`Client`](network::application::mqtt::Client) for a complete example
//! using [`StreamTransport`](network::StreamTransport) over any
//! [`Connect`](network::Connect) implementation.
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.) with a global allocator
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` and `alloc` libraries
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support and [`StdTickCounter`](system::StdTickCounter) (default: disabled)
//! - `defmt`: Enable defmt formatting of states and errors for embedded debugging

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiot/")]

extern crate alloc;

/// Network abstraction layer providing transports and protocol implementations.
///
/// This module contains the transport traits the MQTT engine runs on and the
/// MQTT implementation itself.
pub mod network;

/// System utilities for embedded devices.
///
/// Contains the monotonic tick counter the session engine uses for keep-alive.
pub mod system;
