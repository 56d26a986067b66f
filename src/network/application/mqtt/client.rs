//! MQTT 3.1.1 session engine for embedded systems.
//!
//! [`Client`] owns one logical connection to a broker. It drives the CONNECT
//! handshake, answers the broker's acknowledgment flows, runs the keep-alive
//! timer and reports everything through an [`EventHandler`].
//!
//! The engine is single-threaded and cooperative. Operations such as
//! [`Client::publish`] encode a frame, hand it to the [`Transport`] and return
//! at once; acknowledgments and inbound messages are processed inside
//! [`Client::pump`], which the application must call periodically (every
//! 100 ms or so). Nothing blocks.
//!
//! # Examples
//!
//! ```rust,no_run
//! use libiot_mqtt::network::StreamTransport;
//! use libiot_mqtt::network::application::mqtt::{Client, ConnectOptions, Event, EventQueue, Message, QoS};
//! use libiot_mqtt::system::TickCounter;
//! # use libiot_mqtt::network::{error::Error, Close, Connect, Connection, Read, Write};
//! # struct Socket;
//! # impl Connection for Socket {}
//! # impl Read for Socket {
//! #     type Error = Error;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Socket {
//! #     type Error = Error;
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for Socket {
//! #     type Error = Error;
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Network;
//! # impl Connect for Network {
//! #     type Connection = Socket;
//! #     type Error = Error;
//! #     fn connect(&mut self, _remote: &str) -> Result<Socket, Error> { Ok(Socket) }
//! # }
//! # struct Clock;
//! # impl TickCounter for Clock {
//! #     fn now_ms(&self) -> u64 { 0 }
//! # }
//!
//! let transport = StreamTransport::new(Network, "broker.local:1883");
//! let mut client = Client::new(EventQueue::new(), Clock);
//!
//! client.connect(transport, &ConnectOptions::new("sensor_node_1").with_keep_alive(60))?;
//! while !client.is_connected() {
//!     client.pump();
//! }
//!
//! client.subscribe(1, &[("commands/+", QoS::AtLeastOnce)])?;
//! client.publish(&Message::new(2, "sensors/temperature", QoS::AtLeastOnce, b"23.5".to_vec())?)?;
//!
//! loop {
//!     client.pump();
//!     while let Some(event) = client.handler_mut().pop() {
//!         if let Event::Message(message) = event {
//!             // handle message.topic() / message.payload()
//!             # let _ = message;
//!         }
//!     }
//! #   break;
//! }
//! # Ok::<(), libiot_mqtt::network::application::mqtt::ClientError>(())
//! ```

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use log::{debug, error, info, warn};

use super::codec::{self, DecodedPacket, Decoder};
use super::error::{ClientError, ErrorKind};
use super::event::{EventHandler, OperationResult};
use super::message::{Message, QoS};
use super::options::ConnectOptions;
use super::packet::{ConnAck, ConnectReturnCode, Packet};
use crate::network::{IoEvent, Transport};
use crate::system::TickCounter;

/// Seconds subtracted from the keep-alive interval when deciding to ping.
pub const KEEP_ALIVE_BUFFER_SECS: u64 = 10;

/// Upper bound on the time allowed for a PINGRESP to arrive.
pub const DEFAULT_MAX_PING_RESPONSE_SECS: u16 = 80;

/// Lifecycle of the underlying transport.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportState {
    /// No connection has been attempted.
    Idle,
    /// `open` was requested; waiting for it to complete.
    Connecting,
    /// The transport is open.
    Connected,
    /// Closed after a DISCONNECT.
    Disconnected,
    /// Closed after a fatal error.
    Error,
}

/// Progress of the MQTT handshake.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolState {
    /// No handshake in progress.
    Unconnected,
    /// CONNECT went out; waiting for CONNACK.
    ConnectSent,
    /// A CONNACK with return code 0 arrived.
    Accepted,
}

/// The last control packet the caller asked the engine to send.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingOperation {
    /// Nothing requested.
    None,
    /// CONNECT, until CONNACK arrives.
    Connect,
    /// PUBLISH.
    Publish,
    /// SUBSCRIBE.
    Subscribe,
    /// UNSUBSCRIBE.
    Unsubscribe,
    /// DISCONNECT, until its send completes. No other request is accepted.
    Disconnect,
}

#[derive(Debug, Default, Clone, Copy)]
struct Trace {
    packets: bool,
    raw_bytes: bool,
}

/// Formats bytes as `0x10 0x02 ...` for the raw-byte trace.
struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "0x{byte:02x}")?;
        }
        Ok(())
    }
}

/// An MQTT 3.1.1 session over a completion-driven [`Transport`].
///
/// # Type Parameters
///
/// * `T` - The transport carrying the byte stream
/// * `H` - The [`EventHandler`] receiving callbacks
/// * `K` - The millisecond [`TickCounter`] driving keep-alive
pub struct Client<T: Transport, H: EventHandler, K: TickCounter> {
    transport: Option<T>,
    handler: H,
    clock: K,
    decoder: Decoder,
    options: Option<ConnectOptions>,
    connect_frame: Option<Vec<u8>>,
    transport_state: TransportState,
    protocol_state: ProtocolState,
    pending: PendingOperation,
    last_send_ms: u64,
    last_ping_sent_ms: Option<u64>,
    max_ping_response_secs: u64,
    trace: Trace,
}

impl<T: Transport, H: EventHandler, K: TickCounter> fmt::Debug for Client<T, H, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport_state", &self.transport_state)
            .field("protocol_state", &self.protocol_state)
            .field("pending", &self.pending)
            .field("last_send_ms", &self.last_send_ms)
            .field("last_ping_sent_ms", &self.last_ping_sent_ms)
            .field("max_ping_response_secs", &self.max_ping_response_secs)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, H: EventHandler, K: TickCounter> Client<T, H, K> {
    /// Creates an idle engine. Nothing happens until [`connect`](Self::connect).
    pub fn new(handler: H, clock: K) -> Self {
        Self {
            transport: None,
            handler,
            clock,
            decoder: Decoder::new(),
            options: None,
            connect_frame: None,
            transport_state: TransportState::Idle,
            protocol_state: ProtocolState::Unconnected,
            pending: PendingOperation::None,
            last_send_ms: 0,
            last_ping_sent_ms: None,
            max_ping_response_secs: 0,
            trace: Trace::default(),
        }
    }

    /// Starts a session over `transport`.
    ///
    /// The options are copied into the engine and the CONNECT frame is built
    /// up front, then the transport is asked to open. CONNECT is sent from
    /// [`pump`](Self::pump) once the open completes; the outcome of the
    /// handshake arrives as [`OperationResult::ConnAck`].
    ///
    /// # Errors
    ///
    /// * [`ClientError::AlreadyConnected`] - A session is opening or open
    /// * [`ClientError::InvalidClientId`] - The client id is empty
    /// * [`ClientError::Encode`] - The options cannot be encoded
    /// * [`ClientError::OpenFailed`] - The transport refused to start opening
    pub fn connect(&mut self, mut transport: T, options: &ConnectOptions) -> Result<(), ClientError> {
        if matches!(
            self.transport_state,
            TransportState::Connecting | TransportState::Connected
        ) {
            return Err(ClientError::AlreadyConnected);
        }
        if options.client_id.is_empty() {
            return Err(ClientError::InvalidClientId);
        }
        let connect_frame = codec::encode_connect(options)?;

        self.options = Some(options.clone());
        self.connect_frame = Some(connect_frame);
        self.max_ping_response_secs =
            u64::from(DEFAULT_MAX_PING_RESPONSE_SECS.min(options.keep_alive_interval / 2));
        self.decoder.reset();
        self.protocol_state = ProtocolState::Unconnected;
        self.pending = PendingOperation::None;
        self.last_ping_sent_ms = None;
        self.last_send_ms = self.clock.now_ms();

        let opened = transport.open();
        self.transport = Some(transport);
        match opened {
            Ok(()) => {
                debug!("mqtt: opening transport for {}", options.client_id);
                self.transport_state = TransportState::Connecting;
                Ok(())
            }
            Err(e) => {
                warn!("mqtt: transport open failed: {:?}", e);
                self.transport_state = TransportState::Error;
                self.connect_frame = None;
                Err(ClientError::OpenFailed)
            }
        }
    }

    /// Publishes `message`.
    ///
    /// Returns once the frame is handed to the transport. For QoS 1 and 2 the
    /// broker's acknowledgments arrive later through
    /// [`EventHandler::on_operation`].
    pub fn publish(&mut self, message: &Message) -> Result<(), ClientError> {
        self.ensure_accepted()?;
        if message.qos() != QoS::AtMostOnce && message.packet_id() == 0 {
            return Err(ClientError::InvalidPacketId);
        }
        let frame = codec::encode_publish(
            message.qos(),
            message.is_duplicate(),
            message.is_retained(),
            message.packet_id(),
            message.topic(),
            message.payload(),
        )?;
        self.send_request(&frame, PendingOperation::Publish)?;
        self.trace_outgoing(|| Packet::Publish(message.clone()));
        Ok(())
    }

    /// Subscribes to each `(filter, qos)` pair under `packet_id`.
    ///
    /// The caller allocates packet identifiers and must not reuse one until
    /// its SUBACK has arrived.
    pub fn subscribe(&mut self, packet_id: u16, topics: &[(&str, QoS)]) -> Result<(), ClientError> {
        if topics.is_empty() {
            return Err(ClientError::EmptyTopicList);
        }
        if topics.iter().any(|(topic, _)| topic.is_empty()) {
            return Err(ClientError::InvalidTopic);
        }
        if packet_id == 0 {
            return Err(ClientError::InvalidPacketId);
        }
        self.ensure_accepted()?;
        let frame = codec::encode_subscribe(packet_id, topics)?;
        self.send_request(&frame, PendingOperation::Subscribe)?;
        self.trace_outgoing(|| Packet::Subscribe {
            packet_id,
            topics: topics.iter().map(|(topic, qos)| (topic.to_string(), *qos)).collect(),
        });
        Ok(())
    }

    /// Unsubscribes from each filter under `packet_id`.
    pub fn unsubscribe(&mut self, packet_id: u16, topics: &[&str]) -> Result<(), ClientError> {
        if topics.is_empty() {
            return Err(ClientError::EmptyTopicList);
        }
        if topics.iter().any(|topic| topic.is_empty()) {
            return Err(ClientError::InvalidTopic);
        }
        if packet_id == 0 {
            return Err(ClientError::InvalidPacketId);
        }
        self.ensure_accepted()?;
        let frame = codec::encode_unsubscribe(packet_id, topics)?;
        self.send_request(&frame, PendingOperation::Unsubscribe)?;
        self.trace_outgoing(|| Packet::Unsubscribe {
            packet_id,
            topics: topics.iter().map(|topic| topic.to_string()).collect(),
        });
        Ok(())
    }

    /// Sends DISCONNECT.
    ///
    /// When the transport reports the send complete, the engine reports
    /// [`OperationResult::Disconnect`] and closes the transport. Until then every
    /// other request fails with [`ClientError::NotConnected`].
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        if self.transport_state != TransportState::Connected
            || self.pending == PendingOperation::Disconnect
        {
            return Err(ClientError::NotConnected);
        }
        self.send_request(&codec::encode_disconnect(), PendingOperation::Disconnect)?;
        self.trace_outgoing(|| Packet::Disconnect);
        Ok(())
    }

    /// Drives transport I/O, processes every completion it produced and runs
    /// the keep-alive check.
    pub fn pump(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.pump_io();
        }
        while let Some(event) = self.transport.as_mut().and_then(|t| t.next_event()) {
            self.on_io_event(event);
        }
        self.check_keep_alive();
    }

    /// Enables the packet trace and the raw-byte trace for this engine.
    ///
    /// Trace lines go to the `log` facade at info level, prefixed `->` for
    /// outbound and `<-` for inbound traffic.
    pub fn set_trace(&mut self, packets: bool, raw_bytes: bool) {
        self.trace = Trace { packets, raw_bytes };
    }

    /// Returns `true` once the broker has accepted the session.
    pub fn is_connected(&self) -> bool {
        self.transport_state == TransportState::Connected
            && self.protocol_state == ProtocolState::Accepted
    }

    /// Current transport lifecycle state.
    pub fn transport_state(&self) -> TransportState {
        self.transport_state
    }

    /// Current handshake state.
    pub fn protocol_state(&self) -> ProtocolState {
        self.protocol_state
    }

    /// The last request still in flight.
    pub fn pending_operation(&self) -> PendingOperation {
        self.pending
    }

    /// The options copied in by the last [`connect`](Self::connect).
    pub fn options(&self) -> Option<&ConnectOptions> {
        self.options.as_ref()
    }

    /// The event handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The event handler, mutably. Use it to drain an [`EventQueue`](super::EventQueue).
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The attached transport, if `connect` was called.
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// The attached transport, mutably.
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Tears the engine down, returning the handler and the transport.
    pub fn into_parts(self) -> (H, Option<T>) {
        (self.handler, self.transport)
    }

    fn ensure_accepted(&self) -> Result<(), ClientError> {
        if self.is_connected() && self.pending != PendingOperation::Disconnect {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn keep_alive_secs(&self) -> u64 {
        self.options
            .as_ref()
            .map_or(0, |options| u64::from(options.keep_alive_interval))
    }

    fn send_frame(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        if self.trace.raw_bytes {
            info!("-> {}", Hex(frame));
        }
        if let Err(e) = transport.send(frame) {
            warn!("mqtt: transport send failed: {:?}", e);
            return Err(ClientError::SendFailed);
        }
        self.last_send_ms = self.clock.now_ms();
        Ok(())
    }

    /// Sends a caller-requested frame and records it as pending.
    fn send_request(&mut self, frame: &[u8], operation: PendingOperation) -> Result<(), ClientError> {
        let previous = self.pending;
        self.pending = operation;
        self.send_frame(frame).inspect_err(|_| self.pending = previous)
    }

    /// Sends a frame the engine produced on its own. A failure is fatal.
    fn send_internal(&mut self, frame: &[u8]) -> bool {
        match self.send_frame(frame) {
            Ok(()) => true,
            Err(_) => {
                self.fail(ErrorKind::CommunicationError);
                false
            }
        }
    }

    fn trace_outgoing(&self, packet: impl FnOnce() -> Packet) {
        if self.trace.packets {
            info!("-> {}", packet());
        }
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.close() {
                debug!("mqtt: transport close failed: {:?}", e);
            }
        }
    }

    /// Reports a fatal error once and tears the connection down.
    fn fail(&mut self, kind: ErrorKind) {
        error!("mqtt: connection failed: {}", kind);
        self.handler.on_error(kind);
        self.close_transport();
        self.transport_state = TransportState::Error;
        self.protocol_state = ProtocolState::Unconnected;
        self.pending = PendingOperation::None;
        self.connect_frame = None;
        self.last_ping_sent_ms = None;
        self.last_send_ms = 0;
        self.decoder.reset();
    }

    fn on_io_event(&mut self, event: IoEvent) {
        if let IoEvent::CloseComplete = event {
            debug!("mqtt: transport closed");
            return;
        }
        if !matches!(
            self.transport_state,
            TransportState::Connecting | TransportState::Connected
        ) {
            debug!("mqtt: dropping {:?} on a closed transport", event);
            return;
        }

        match event {
            IoEvent::OpenComplete(Ok(())) => self.on_open_complete(),
            IoEvent::OpenComplete(Err(e)) => {
                warn!("mqtt: transport open failed: {:?}", e);
                self.fail(ErrorKind::ConnectionError);
            }
            IoEvent::BytesReceived(bytes) => self.on_bytes_received(&bytes),
            IoEvent::SendComplete(Ok(())) => self.on_send_complete(),
            IoEvent::SendComplete(Err(e)) => {
                warn!("mqtt: send failed: {:?}", e);
                self.fail(ErrorKind::CommunicationError);
            }
            IoEvent::IoError(e) => {
                warn!("mqtt: transport error: {:?}", e);
                self.fail(ErrorKind::ConnectionError);
            }
            IoEvent::CloseComplete => {}
        }
    }

    fn on_open_complete(&mut self) {
        if self.transport_state != TransportState::Connecting {
            warn!("mqtt: ignoring open completion on an open transport");
            return;
        }
        self.transport_state = TransportState::Connected;

        let Some(frame) = self.connect_frame.take() else {
            return;
        };
        self.pending = PendingOperation::Connect;
        if self.send_internal(&frame) {
            self.protocol_state = ProtocolState::ConnectSent;
            self.trace_outgoing(|| Packet::Connect(self.options.clone().unwrap_or_default()));
        }
    }

    fn on_send_complete(&mut self) {
        if self.pending != PendingOperation::Disconnect {
            return;
        }
        self.pending = PendingOperation::None;
        self.handler.on_operation(&OperationResult::Disconnect);
        self.close_transport();
        self.transport_state = TransportState::Disconnected;
        self.protocol_state = ProtocolState::Unconnected;
        self.last_ping_sent_ms = None;
        self.decoder.reset();
    }

    fn on_bytes_received(&mut self, bytes: &[u8]) {
        if self.transport_state != TransportState::Connected {
            warn!("mqtt: {} bytes arrived before the transport opened", bytes.len());
            return;
        }
        if self.trace.raw_bytes {
            info!("<- {}", Hex(bytes));
        }

        let mut input = bytes;
        while self.transport_state == TransportState::Connected {
            match self.decoder.decode_next(&mut input) {
                Ok(Some(frame)) => self.dispatch(frame),
                Ok(None) => break,
                Err(e) => {
                    warn!("mqtt: decode failed: {}", e);
                    self.fail(e.into());
                }
            }
        }
    }

    fn dispatch(&mut self, frame: DecodedPacket) {
        let packet = match Packet::from_frame(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("mqtt: malformed {}: {}", frame.packet_type.as_str(), e);
                self.fail(e.into());
                return;
            }
        };
        if self.trace.packets {
            info!("<- {}", packet);
        }

        match packet {
            Packet::ConnAck(ack) => self.on_connack(ack),
            Packet::Publish(message) => self.on_publish(message),
            Packet::PubAck(id) => self.handler.on_operation(&OperationResult::PubAck(id)),
            Packet::PubRec(id) => {
                self.handler.on_operation(&OperationResult::PubRec(id));
                if self.send_internal(&codec::encode_pubrel(id)) {
                    self.trace_outgoing(|| Packet::PubRel(id));
                }
            }
            Packet::PubRel(id) => {
                self.handler.on_operation(&OperationResult::PubRel(id));
                if self.send_internal(&codec::encode_pubcomp(id)) {
                    self.trace_outgoing(|| Packet::PubComp(id));
                }
            }
            Packet::PubComp(id) => self.handler.on_operation(&OperationResult::PubComp(id)),
            Packet::SubAck(ack) => self.handler.on_operation(&OperationResult::SubAck(ack)),
            Packet::UnsubAck(id) => self.handler.on_operation(&OperationResult::UnsubAck(id)),
            Packet::PingResp => self.last_ping_sent_ms = None,
            other => warn!("mqtt: ignoring {} from broker", other.packet_type().as_str()),
        }
    }

    fn on_connack(&mut self, ack: ConnAck) {
        if self.protocol_state != ProtocolState::ConnectSent {
            warn!("mqtt: ignoring unexpected CONNACK");
            return;
        }
        self.handler.on_operation(&OperationResult::ConnAck(ack));
        if ack.return_code == ConnectReturnCode::Accepted {
            debug!("mqtt: session accepted (session present: {})", ack.session_present);
            self.protocol_state = ProtocolState::Accepted;
            self.pending = PendingOperation::None;
        } else {
            warn!("mqtt: broker refused connection: {:?}", ack.return_code);
            self.fail(ErrorKind::ConnectionError);
        }
    }

    fn on_publish(&mut self, message: Message) {
        if self.protocol_state != ProtocolState::Accepted {
            warn!("mqtt: ignoring PUBLISH before CONNACK");
            return;
        }
        self.handler.on_message(&message);

        let id = message.packet_id();
        match message.qos() {
            QoS::AtMostOnce => {}
            QoS::AtLeastOnce => {
                if self.send_internal(&codec::encode_puback(id)) {
                    self.trace_outgoing(|| Packet::PubAck(id));
                }
            }
            QoS::ExactlyOnce => {
                if self.send_internal(&codec::encode_pubrec(id)) {
                    self.trace_outgoing(|| Packet::PubRec(id));
                }
            }
        }
    }

    fn check_keep_alive(&mut self) {
        let keep_alive = self.keep_alive_secs();
        if !self.is_connected() || keep_alive == 0 {
            return;
        }
        let now = self.clock.now_ms();

        match self.last_ping_sent_ms {
            Some(sent) => {
                if now.saturating_sub(sent) / 1000 > self.max_ping_response_secs {
                    self.fail(ErrorKind::NoPingResponse);
                }
            }
            None => {
                if now.saturating_sub(self.last_send_ms) / 1000 + KEEP_ALIVE_BUFFER_SECS > keep_alive
                    && self.send_internal(&codec::encode_ping())
                {
                    self.last_ping_sent_ms = Some(self.clock.now_ms());
                    self.trace_outgoing(|| Packet::PingReq);
                }
            }
        }
    }
}
