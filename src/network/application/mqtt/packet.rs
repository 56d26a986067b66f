//! Typed views of decoded control packets.
//!
//! [`Packet::from_frame`] interprets a [`DecodedPacket`] body according to its
//! type and flags, validating every field with a [`Cursor`]. [`Packet::encode`]
//! goes the other way for all fourteen packet types, which is what the session
//! engine's dispatch, the packet trace and the round-trip tests build on.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use super::codec::{
    self, DecodedPacket, PacketType, CONNECT_FLAG_CLEAN_SESSION, CONNECT_FLAG_PASSWORD,
    CONNECT_FLAG_USERNAME, CONNECT_FLAG_WILL, CONNECT_FLAG_WILL_RETAIN, CONNECT_WILL_QOS_SHIFT,
    PROTOCOL_LEVEL, PROTOCOL_NAME, PUBLISH_FLAG_DUP, PUBLISH_FLAG_RETAIN, PUBLISH_QOS_SHIFT,
};
use super::cursor::Cursor;
use super::error::{DecodeError, EncodeError};
use super::message::{Message, QoS};
use super::options::{ConnectOptions, Will};

/// Return code carried by CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReturnCode {
    Accepted,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServerUnavailable,
    BadUserNameOrPassword,
    NotAuthorized,
    /// A code MQTT 3.1.1 reserves. Treated as a refusal.
    Reserved(u8),
}

impl From<u8> for ConnectReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            other => Self::Reserved(other),
        }
    }
}

impl From<ConnectReturnCode> for u8 {
    fn from(code: ConnectReturnCode) -> Self {
        match code {
            ConnectReturnCode::Accepted => 0,
            ConnectReturnCode::UnacceptableProtocolVersion => 1,
            ConnectReturnCode::IdentifierRejected => 2,
            ConnectReturnCode::ServerUnavailable => 3,
            ConnectReturnCode::BadUserNameOrPassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
            ConnectReturnCode::Reserved(other) => other,
        }
    }
}

/// Body of a CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnAck {
    /// Whether the broker resumed a stored session.
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

/// Per-filter outcome carried by SUBACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeReturnCode {
    /// The subscription was accepted with this maximum QoS.
    Granted(QoS),
    /// The broker refused the subscription (`0x80`).
    Failure,
}

impl SubscribeReturnCode {
    const FAILURE: u8 = 0x80;

    fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            Self::FAILURE => Ok(Self::Failure),
            other => QoS::from_bits(other)
                .map(Self::Granted)
                .ok_or(DecodeError::MalformedPacket),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Self::Granted(qos) => qos as u8,
            Self::Failure => Self::FAILURE,
        }
    }
}

/// Body of a SUBACK: one return code per filter, in request order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubAck {
    pub packet_id: u16,
    pub return_codes: Vec<SubscribeReturnCode>,
}

/// A decoded control packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Packet {
    /// The session-level `qos` option is not on the wire and decodes as the default.
    Connect(ConnectOptions),
    ConnAck(ConnAck),
    Publish(Message),
    PubAck(u16),
    PubRec(u16),
    PubRel(u16),
    PubComp(u16),
    Subscribe {
        packet_id: u16,
        topics: Vec<(String, QoS)>,
    },
    SubAck(SubAck),
    Unsubscribe {
        packet_id: u16,
        topics: Vec<String>,
    },
    UnsubAck(u16),
    PingReq,
    PingResp,
    Disconnect,
}

/// Flags nibble MQTT 3.1.1 requires for every type except PUBLISH.
fn required_flags(packet_type: PacketType) -> u8 {
    match packet_type {
        PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => 0b0010,
        _ => 0,
    }
}

impl Packet {
    /// Interprets a frame body.
    ///
    /// # Errors
    ///
    /// [`DecodeError::MalformedPacket`] for wrong flags, reserved values,
    /// trailing bytes or an empty topic; [`DecodeError::Truncated`] and
    /// [`DecodeError::InvalidUtf8`] for bad fields.
    pub fn from_frame(frame: &DecodedPacket) -> Result<Self, DecodeError> {
        let packet_type = frame.packet_type;
        if packet_type != PacketType::Publish && frame.flags != required_flags(packet_type) {
            return Err(DecodeError::MalformedPacket);
        }

        let mut cursor = Cursor::new(&frame.payload);
        let packet = match packet_type {
            PacketType::Connect => Self::Connect(decode_connect(&mut cursor)?),
            PacketType::ConnAck => {
                let ack_flags = cursor.read_u8()?;
                if ack_flags & !0x01 != 0 {
                    return Err(DecodeError::MalformedPacket);
                }
                Self::ConnAck(ConnAck {
                    session_present: ack_flags & 0x01 != 0,
                    return_code: cursor.read_u8()?.into(),
                })
            }
            PacketType::Publish => Self::Publish(decode_publish(frame.flags, &mut cursor)?),
            PacketType::PubAck => Self::PubAck(cursor.read_u16()?),
            PacketType::PubRec => Self::PubRec(cursor.read_u16()?),
            PacketType::PubRel => Self::PubRel(cursor.read_u16()?),
            PacketType::PubComp => Self::PubComp(cursor.read_u16()?),
            PacketType::Subscribe => {
                let packet_id = cursor.read_u16()?;
                let mut topics = Vec::new();
                while !cursor.is_empty() {
                    let topic = cursor.read_utf8()?.to_string();
                    let qos = QoS::from_bits(cursor.read_u8()?).ok_or(DecodeError::MalformedPacket)?;
                    topics.push((topic, qos));
                }
                if topics.is_empty() {
                    return Err(DecodeError::MalformedPacket);
                }
                Self::Subscribe { packet_id, topics }
            }
            PacketType::SubAck => {
                let packet_id = cursor.read_u16()?;
                let return_codes = cursor
                    .read_rest()
                    .iter()
                    .map(|byte| SubscribeReturnCode::from_byte(*byte))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::SubAck(SubAck {
                    packet_id,
                    return_codes,
                })
            }
            PacketType::Unsubscribe => {
                let packet_id = cursor.read_u16()?;
                let mut topics = Vec::new();
                while !cursor.is_empty() {
                    topics.push(cursor.read_utf8()?.to_string());
                }
                if topics.is_empty() {
                    return Err(DecodeError::MalformedPacket);
                }
                Self::Unsubscribe { packet_id, topics }
            }
            PacketType::UnsubAck => Self::UnsubAck(cursor.read_u16()?),
            PacketType::PingReq => Self::PingReq,
            PacketType::PingResp => Self::PingResp,
            PacketType::Disconnect => Self::Disconnect,
        };
        cursor.finish()?;
        Ok(packet)
    }

    /// Encodes the packet as a complete frame.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(match self {
            Self::Connect(options) => codec::encode_connect(options)?,
            Self::ConnAck(ack) => codec::encode_connack(ack.session_present, ack.return_code.into()),
            Self::Publish(message) => codec::encode_publish(
                message.qos(),
                message.is_duplicate(),
                message.is_retained(),
                message.packet_id(),
                message.topic(),
                message.payload(),
            )?,
            Self::PubAck(id) => codec::encode_puback(*id),
            Self::PubRec(id) => codec::encode_pubrec(*id),
            Self::PubRel(id) => codec::encode_pubrel(*id),
            Self::PubComp(id) => codec::encode_pubcomp(*id),
            Self::Subscribe { packet_id, topics } => {
                let topics: Vec<(&str, QoS)> =
                    topics.iter().map(|(topic, qos)| (topic.as_str(), *qos)).collect();
                codec::encode_subscribe(*packet_id, &topics)?
            }
            Self::SubAck(ack) => {
                let codes: Vec<u8> = ack.return_codes.iter().map(|code| code.to_byte()).collect();
                codec::encode_suback(ack.packet_id, &codes)?
            }
            Self::Unsubscribe { packet_id, topics } => {
                let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
                codec::encode_unsubscribe(*packet_id, &topics)?
            }
            Self::UnsubAck(id) => codec::encode_unsuback(*id),
            Self::PingReq => codec::encode_ping(),
            Self::PingResp => codec::encode_pingresp(),
            Self::Disconnect => codec::encode_disconnect(),
        })
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::ConnAck(_) => PacketType::ConnAck,
            Self::Publish(_) => PacketType::Publish,
            Self::PubAck(_) => PacketType::PubAck,
            Self::PubRec(_) => PacketType::PubRec,
            Self::PubRel(_) => PacketType::PubRel,
            Self::PubComp(_) => PacketType::PubComp,
            Self::Subscribe { .. } => PacketType::Subscribe,
            Self::SubAck(_) => PacketType::SubAck,
            Self::Unsubscribe { .. } => PacketType::Unsubscribe,
            Self::UnsubAck(_) => PacketType::UnsubAck,
            Self::PingReq => PacketType::PingReq,
            Self::PingResp => PacketType::PingResp,
            Self::Disconnect => PacketType::Disconnect,
        }
    }
}

fn decode_connect(cursor: &mut Cursor<'_>) -> Result<ConnectOptions, DecodeError> {
    if cursor.read_utf8()? != PROTOCOL_NAME || cursor.read_u8()? != PROTOCOL_LEVEL {
        return Err(DecodeError::MalformedPacket);
    }
    let flags = cursor.read_u8()?;
    if flags & 0x01 != 0 {
        return Err(DecodeError::MalformedPacket);
    }
    let keep_alive_interval = cursor.read_u16()?;
    let client_id = cursor.read_utf8()?.to_string();

    let will = if flags & CONNECT_FLAG_WILL != 0 {
        let qos = QoS::from_bits((flags >> CONNECT_WILL_QOS_SHIFT) & 0b11)
            .ok_or(DecodeError::MalformedPacket)?;
        let topic = cursor.read_utf8()?;
        let message = cursor.read_utf8()?;
        Some(
            Will::new(topic, message)
                .with_qos(qos)
                .with_retain(flags & CONNECT_FLAG_WILL_RETAIN != 0),
        )
    } else {
        None
    };
    let username = if flags & CONNECT_FLAG_USERNAME != 0 {
        Some(cursor.read_utf8()?.to_string())
    } else {
        None
    };
    let password = if flags & CONNECT_FLAG_PASSWORD != 0 {
        Some(cursor.read_utf8()?.to_string())
    } else {
        None
    };

    Ok(ConnectOptions {
        client_id,
        username,
        password,
        will,
        keep_alive_interval,
        clean_session: flags & CONNECT_FLAG_CLEAN_SESSION != 0,
        ..ConnectOptions::default()
    })
}

fn decode_publish(flags: u8, cursor: &mut Cursor<'_>) -> Result<Message, DecodeError> {
    let qos = QoS::from_bits((flags >> PUBLISH_QOS_SHIFT) & 0b11).ok_or(DecodeError::MalformedPacket)?;
    let topic = cursor.read_utf8()?;
    let packet_id = if qos == QoS::AtMostOnce {
        0
    } else {
        cursor.read_u16()?
    };
    let payload = cursor.read_rest();

    Message::new(packet_id, topic, qos, payload)
        .map(|message| {
            message
                .with_duplicate(flags & PUBLISH_FLAG_DUP != 0)
                .with_retained(flags & PUBLISH_FLAG_RETAIN != 0)
        })
        .map_err(|_| DecodeError::MalformedPacket)
}

impl fmt::Display for Packet {
    /// One-line summary used by the packet trace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.packet_type().as_str();
        match self {
            Self::Connect(options) => write!(
                f,
                "{name} | CLIENT_ID: {} | CLEAN: {} | KEEP_ALIVE: {} | USERNAME: {} | WILL: {}",
                options.client_id,
                options.clean_session,
                options.keep_alive_interval,
                options.username.is_some(),
                options.will.is_some(),
            ),
            Self::ConnAck(ack) => write!(
                f,
                "{name} | SESSION_PRESENT: {} | RETURN_CODE: {}",
                ack.session_present,
                u8::from(ack.return_code)
            ),
            Self::Publish(message) => write!(
                f,
                "{name} | IS_DUP: {} | RETAIN: {} | QOS: {} | PACKET_ID: {} | TOPIC_NAME: {} | PAYLOAD_LEN: {}",
                message.is_duplicate(),
                message.is_retained(),
                message.qos().as_str(),
                message.packet_id(),
                message.topic(),
                message.payload().len(),
            ),
            Self::PubAck(id) | Self::PubRec(id) | Self::PubRel(id) | Self::PubComp(id) | Self::UnsubAck(id) => {
                write!(f, "{name} | PACKET_ID: {id}")
            }
            Self::Subscribe { packet_id, topics } => {
                write!(f, "{name} | PACKET_ID: {packet_id}")?;
                for (topic, qos) in topics {
                    write!(f, " | TOPIC_NAME: {topic} | QOS: {}", *qos as u8)?;
                }
                Ok(())
            }
            Self::SubAck(ack) => {
                write!(f, "{name} | PACKET_ID: {}", ack.packet_id)?;
                for code in &ack.return_codes {
                    write!(f, " | RETURN_CODE: {}", code.to_byte())?;
                }
                Ok(())
            }
            Self::Unsubscribe { packet_id, topics } => {
                write!(f, "{name} | PACKET_ID: {packet_id}")?;
                for topic in topics {
                    write!(f, " | TOPIC_NAME: {topic}")?;
                }
                Ok(())
            }
            Self::PingReq | Self::PingResp | Self::Disconnect => f.write_str(name),
        }
    }
}
