//! MQTT 3.1.1 protocol implementation for embedded systems.
//!
//! This module provides a device-side MQTT 3.1.1 engine designed for `no_std`
//! environments with an allocator. MQTT (Message Queuing Telemetry Transport)
//! is a lightweight publish-subscribe messaging protocol ideal for IoT
//! applications.
//!
//! # Protocol Overview
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! # Layout
//!
//! - [`codec`]: frame encoders and the incremental [`Decoder`]
//! - [`packet`]: typed views of decoded frames
//! - [`Message`] and [`QoS`]: the application message value
//! - [`ConnectOptions`] and [`Will`]: connection configuration
//! - [`Client`]: the session engine
//! - [`EventHandler`] and [`EventQueue`]: the callback surface
//!
//! # Usage
//!
//! ```rust
//! use libiot_mqtt::network::application::mqtt::codec::{self, Decoder};
//! use libiot_mqtt::network::application::mqtt::packet::Packet;
//! use libiot_mqtt::network::application::mqtt::{Message, QoS};
//!
//! let message = Message::new(1, "status", QoS::AtLeastOnce, b"online".to_vec()).unwrap();
//! let bytes = Packet::Publish(message.clone()).encode().unwrap();
//!
//! let mut decoder = Decoder::new();
//! let frame = decoder.feed(&bytes).next().unwrap().unwrap();
//! assert_eq!(Packet::from_frame(&frame).unwrap(), Packet::Publish(message));
//! # let _ = codec::encode_ping();
//! ```
//!
//! See [`Client`] for driving a full session.

/// The session engine.
pub mod client;

pub mod codec;

mod cursor;

/// Error types for the codec and the engine.
pub mod error;

pub mod event;

pub mod message;

pub mod options;

pub mod packet;

pub use client::{Client, PendingOperation, ProtocolState, TransportState};
pub use codec::{DecodedPacket, Decoder, PacketType};
pub use error::{ClientError, DecodeError, EncodeError, ErrorKind};
pub use event::{Event, EventHandler, EventQueue, OperationResult};
pub use message::{Message, QoS};
pub use options::{ConnectOptions, Will};
pub use packet::{ConnAck, ConnectReturnCode, Packet, SubAck, SubscribeReturnCode};
