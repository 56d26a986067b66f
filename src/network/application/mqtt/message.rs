//! Application messages and delivery guarantees.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use super::error::ClientError;

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. Higher QoS levels
/// provide stronger delivery guarantees but require more packets per message.
///
/// # Examples
///
/// ```rust
/// use libiot_mqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::AtLeastOnce as u8, 1);
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// assert_eq!(QoS::from_bits(0b10), Some(QoS::ExactlyOnce));
/// assert_eq!(QoS::from_bits(0b11), None);
/// ```
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    /// **QoS 0**: At most once delivery. No acknowledgment.
    #[default]
    AtMostOnce = 0,

    /// **QoS 1**: At least once delivery. Acknowledged with PUBACK; duplicates
    /// can occur.
    AtLeastOnce = 1,

    /// **QoS 2**: Exactly once delivery. Four-packet PUBLISH, PUBREC, PUBREL,
    /// PUBCOMP handshake.
    ExactlyOnce = 2,
}

impl QoS {
    /// Decodes the two-bit QoS value. `0b11` is reserved and yields `None`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }

    /// Human-readable name used in packet traces.
    pub fn as_str(self) -> &'static str {
        match self {
            QoS::AtMostOnce => "DELIVER_AT_MOST_ONCE",
            QoS::AtLeastOnce => "DELIVER_AT_LEAST_ONCE",
            QoS::ExactlyOnce => "DELIVER_EXACTLY_ONCE",
        }
    }
}

/// One application message, sent or received.
///
/// A message is built once and then only read: the duplicate and retained flags
/// are chosen at construction time through the `with_*` builders. The packet
/// identifier is only meaningful for QoS 1 and 2.
///
/// # Examples
///
/// ```rust
/// use libiot_mqtt::network::application::mqtt::{Message, QoS};
///
/// let message = Message::new(7, "devices/dev1/telemetry", QoS::AtLeastOnce, b"23.5".to_vec())
///     .unwrap()
///     .with_retained(true);
///
/// assert_eq!(message.packet_id(), 7);
/// assert_eq!(message.topic(), "devices/dev1/telemetry");
/// assert_eq!(message.payload(), b"23.5");
/// assert!(message.is_retained());
/// assert!(!message.is_duplicate());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    packet_id: u16,
    topic: String,
    payload: Vec<u8>,
    qos: QoS,
    duplicate: bool,
    retained: bool,
}

impl Message {
    /// Creates a message. The topic must not be empty.
    pub fn new(
        packet_id: u16,
        topic: impl Into<String>,
        qos: QoS,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, ClientError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ClientError::InvalidTopic);
        }
        Ok(Self {
            packet_id,
            topic,
            payload: payload.into(),
            qos,
            duplicate: false,
            retained: false,
        })
    }

    /// Sets the DUP flag.
    #[must_use]
    pub fn with_duplicate(mut self, duplicate: bool) -> Self {
        self.duplicate = duplicate;
        self
    }

    /// Sets the RETAIN flag.
    #[must_use]
    pub fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    pub fn packet_id(&self) -> u16 {
        self.packet_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }

    /// Consumes the message, returning its topic and payload.
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.topic, self.payload)
    }
}
