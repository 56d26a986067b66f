//! Connection configuration.

use alloc::string::String;
use serde::{Deserialize, Serialize};

use super::message::QoS;

/// The message the broker publishes on the device's behalf if the connection
/// drops without a DISCONNECT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Will {
    /// Topic the will message is published to.
    pub topic: String,
    /// Will message body.
    pub message: String,
    /// QoS the broker uses to publish the will.
    #[serde(default)]
    pub qos: QoS,
    /// Whether the will is published as a retained message.
    #[serde(default)]
    pub retain: bool,
}

impl Will {
    pub fn new(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }
}

/// Configuration options for an MQTT connection.
///
/// The options are cloned into the engine when `connect` is called, so the
/// caller may drop or reuse its copy afterwards.
///
/// # Examples
///
/// ```rust
/// use libiot_mqtt::network::application::mqtt::{ConnectOptions, QoS, Will};
///
/// let options = ConnectOptions::new("dev1")
///     .with_keep_alive(60)
///     .with_credentials("device", "secret")
///     .with_will(Will::new("devices/dev1/status", "offline").with_retain(true));
///
/// assert_eq!(options.client_id, "dev1");
/// assert!(options.clean_session);
/// assert_eq!(options.qos, QoS::AtMostOnce);
/// ```
///
/// Options can also be loaded from a JSON document:
///
/// ```rust
/// use libiot_mqtt::network::application::mqtt::ConnectOptions;
///
/// let json = br#"{"client_id":"dev1","keep_alive_interval":30,"clean_session":false}"#;
/// let options = ConnectOptions::from_json(json).unwrap();
///
/// assert_eq!(options.keep_alive_interval, 30);
/// assert!(!options.clean_session);
/// assert!(options.username.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// The client identifier. Must be non-empty and should be unique per broker.
    pub client_id: String,

    /// Optional user name sent in the CONNECT payload.
    pub username: Option<String>,

    /// Optional password. Only valid together with a user name.
    pub password: Option<String>,

    /// Optional last-will message.
    pub will: Option<Will>,

    /// Keep-alive interval in seconds. Zero disables keep-alive pings.
    pub keep_alive_interval: u16,

    /// Whether the broker should discard any previous session state.
    pub clean_session: bool,

    /// QoS requested for the session's own traffic.
    pub qos: QoS,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            username: None,
            password: None,
            will: None,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_SECONDS,
            clean_session: true,
            qos: QoS::AtMostOnce,
        }
    }
}

/// Keep-alive interval used when none is configured.
pub const DEFAULT_KEEP_ALIVE_SECONDS: u16 = 240;

impl ConnectOptions {
    /// Creates options with the given client id and defaults for everything else.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive_interval = seconds;
        self
    }

    #[must_use]
    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_will(mut self, will: Will) -> Self {
        self.will = Some(will);
        self
    }

    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Parses options from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json_core::de::Error> {
        serde_json_core::from_slice::<Self>(json).map(|(options, _)| options)
    }
}
