//! Sessions against a real broker. Run with `cargo test -- --ignored`.

use dotenvy::dotenv;
use libiot_mqtt::network::application::mqtt::{
    Client, ConnectOptions, ConnectReturnCode, Event, EventQueue, Message, OperationResult, QoS,
};
use libiot_mqtt::network::error::Error;
use libiot_mqtt::network::{Close, Connect, Connection, Read, StreamTransport, Write};
use libiot_mqtt::system::TickCounter;
use std::env;
use std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use std::net::TcpStream;
use std::time::{Duration, Instant};

struct NetConnection {
    stream: TcpStream,
}

impl Read for NetConnection {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.stream.read(buf) {
            Ok(0) => Err(Error::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(Error::Timeout)
            }
            Err(_) => Err(Error::ReadError),
        }
    }
}

impl Write for NetConnection {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|_| Error::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| Error::WriteError)
    }
}

impl Close for NetConnection {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        self.stream
            .shutdown(std::net::Shutdown::Both)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Connection for NetConnection {}

struct NetConnector;

impl Connect for NetConnector {
    type Connection = NetConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        let stream = TcpStream::connect(remote).map_err(|_| Error::ConnectionRefused)?;
        stream
            .set_read_timeout(Some(Duration::from_millis(20)))
            .map_err(|_| Error::OpenFailed)?;
        Ok(NetConnection { stream })
    }
}

#[derive(Clone, Copy)]
struct WallClock(Instant);

impl TickCounter for WallClock {
    fn now_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

type LiveClient = Client<StreamTransport<NetConnector>, EventQueue, WallClock>;

fn broker_address() -> String {
    dotenv().ok();
    env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string())
}

/// Pumps until `done` accepts an event or five seconds pass.
fn pump_until(client: &mut LiveClient, mut done: impl FnMut(&Event) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        client.pump();
        for event in client.handler_mut().drain() {
            if let Event::Error(kind) = event {
                panic!("session failed: {kind:?}");
            }
            if done(&event) {
                return true;
            }
        }
    }
    false
}

fn connect(client_id: &str) -> LiveClient {
    let transport = StreamTransport::new(NetConnector, &broker_address());
    let mut client = Client::new(EventQueue::new(), WallClock(Instant::now()));
    client.set_trace(true, false);
    client
        .connect(transport, &ConnectOptions::new(client_id).with_keep_alive(10))
        .expect("Failed to start connecting");
    assert!(pump_until(&mut client, |event| matches!(
        event,
        Event::Operation(OperationResult::ConnAck(ack)) if ack.return_code == ConnectReturnCode::Accepted
    )));
    client
}

#[test]
#[ignore = "needs a reachable MQTT broker"]
fn test_connect_to_public_broker() {
    let mut client = connect("libiot-mqtt-test-12345");
    assert!(client.is_connected());

    client.disconnect().expect("Failed to disconnect");
    assert!(pump_until(&mut client, |event| matches!(
        event,
        Event::Operation(OperationResult::Disconnect)
    )));
    assert!(!client.is_connected());
}

#[test]
#[ignore = "needs a reachable MQTT broker"]
fn test_publish_and_subscribe() {
    let mut client = connect("libiot-mqtt-test-67890");
    let topic = "libiot-mqtt/test-topic";

    client
        .subscribe(1, &[(topic, QoS::AtLeastOnce)])
        .expect("Failed to subscribe");
    assert!(pump_until(&mut client, |event| matches!(
        event,
        Event::Operation(OperationResult::SubAck(ack)) if ack.packet_id == 1
    )));

    let message = Message::new(2, topic, QoS::AtLeastOnce, b"hello world".to_vec()).unwrap();
    client.publish(&message).expect("Failed to publish");

    let mut acked = false;
    let mut received = None;
    assert!(pump_until(&mut client, |event| {
        match event {
            Event::Operation(OperationResult::PubAck(2)) => acked = true,
            Event::Message(message) => received = Some(message.clone()),
            _ => {}
        }
        acked && received.is_some()
    }));

    let received = received.unwrap();
    assert_eq!(received.topic(), topic);
    assert_eq!(received.payload(), b"hello world");
}
