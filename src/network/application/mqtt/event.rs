//! The callback surface of the session engine.
//!
//! The engine reports everything that happens on the connection through an
//! [`EventHandler`]: received messages, completed operations, and fatal
//! errors. Handlers run synchronously inside
//! [`Client::pump`](super::Client::pump) and receive no reference to the
//! engine, so they cannot re-enter it.
//!
//! Applications that prefer to inspect results after each pump can use
//! [`EventQueue`], which simply records every event in order.

use alloc::collections::VecDeque;

use super::error::ErrorKind;
use super::message::Message;
use super::packet::{ConnAck, SubAck};

/// A completed operation, reported through [`EventHandler::on_operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The broker answered CONNECT.
    ConnAck(ConnAck),
    /// A QoS 1 publish was acknowledged.
    PubAck(u16),
    /// A QoS 2 publish was received by the broker. PUBREL follows this callback.
    PubRec(u16),
    /// The broker released a QoS 2 message. PUBCOMP follows this callback.
    PubRel(u16),
    /// A QoS 2 publish completed.
    PubComp(u16),
    SubAck(SubAck),
    UnsubAck(u16),
    /// DISCONNECT was sent and the transport is closing.
    Disconnect,
}

/// Receives the engine's callbacks.
///
/// Only [`on_message`](Self::on_message) is required; the other callbacks
/// default to doing nothing.
///
/// ```rust
/// use libiot_mqtt::network::application::mqtt::{ErrorKind, EventHandler, Message};
///
/// #[derive(Default)]
/// struct Counter {
///     messages: usize,
///     errors: usize,
/// }
///
/// impl EventHandler for Counter {
///     fn on_message(&mut self, _message: &Message) {
///         self.messages += 1;
///     }
///
///     fn on_error(&mut self, _error: ErrorKind) {
///         self.errors += 1;
///     }
/// }
/// ```
pub trait EventHandler {
    /// A PUBLISH arrived. Runs before any acknowledgment is sent.
    fn on_message(&mut self, message: &Message);

    /// An operation completed.
    fn on_operation(&mut self, result: &OperationResult) {
        let _ = result;
    }

    /// The connection failed. The engine has already started closing the
    /// transport when this runs.
    fn on_error(&mut self, error: ErrorKind) {
        let _ = error;
    }
}

impl<H: EventHandler + ?Sized> EventHandler for &mut H {
    fn on_message(&mut self, message: &Message) {
        (**self).on_message(message)
    }

    fn on_operation(&mut self, result: &OperationResult) {
        (**self).on_operation(result)
    }

    fn on_error(&mut self, error: ErrorKind) {
        (**self).on_error(error)
    }
}

/// One recorded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message(Message),
    Operation(OperationResult),
    Error(ErrorKind),
}

/// An [`EventHandler`] that queues every callback for later inspection.
///
/// ```rust
/// use libiot_mqtt::network::application::mqtt::{ErrorKind, Event, EventHandler, EventQueue};
///
/// let mut queue = EventQueue::new();
/// queue.on_error(ErrorKind::NoPingResponse);
///
/// assert_eq!(queue.len(), 1);
/// assert_eq!(queue.pop(), Some(Event::Error(ErrorKind::NoPingResponse)));
/// assert!(queue.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventHandler for EventQueue {
    fn on_message(&mut self, message: &Message) {
        self.events.push_back(Event::Message(message.clone()));
    }

    fn on_operation(&mut self, result: &OperationResult) {
        self.events.push_back(Event::Operation(result.clone()));
    }

    fn on_error(&mut self, error: ErrorKind) {
        self.events.push_back(Event::Error(error));
    }
}
