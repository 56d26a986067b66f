use libiot_mqtt::network::application::mqtt::{
    Client, ConnectOptions, EventQueue, Message, QoS, codec,
};
use libiot_mqtt::network::error::Error;
use libiot_mqtt::network::*;
use libiot_mqtt::system::TickCounter;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

mod application;

/// The far end of a mock socket, shared between the test and the connection.
#[derive(Debug, Default)]
struct Wire {
    to_device: VecDeque<u8>,
    from_device: Vec<u8>,
    is_open: bool,
    read_error: Option<Error>,
}

type SharedWire = Rc<RefCell<Wire>>;

/// Largest write the mock accepts per call, so `write_all` has to loop.
const MOCK_WRITE_LIMIT: usize = 5;

#[derive(Debug)]
struct MockConnection {
    wire: SharedWire,
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if !wire.is_open {
            return Err(Error::NotOpen);
        }
        if let Some(error) = wire.read_error.take() {
            return Err(error);
        }
        let len = buf.len().min(wire.to_device.len());
        for (slot, byte) in buf.iter_mut().zip(wire.to_device.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if !wire.is_open {
            return Err(Error::NotOpen);
        }
        let len = buf.len().min(MOCK_WRITE_LIMIT);
        wire.from_device.extend_from_slice(&buf[..len]);
        Ok(len)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if !self.wire.borrow().is_open {
            return Err(Error::NotOpen);
        }
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().is_open = false;
        Ok(())
    }
}

// This is needed to satisfy the trait bound on Connect
impl Connection for MockConnection {}

struct MockNetwork {
    wire: SharedWire,
    refuse: bool,
}

impl MockNetwork {
    fn new(wire: &SharedWire) -> Self {
        Self {
            wire: wire.clone(),
            refuse: false,
        }
    }
}

impl Connect for MockNetwork {
    type Connection = MockConnection;
    type Error = Error;

    fn connect(&mut self, _remote: &str) -> Result<Self::Connection, Self::Error> {
        if self.refuse {
            return Err(Error::ConnectionRefused);
        }
        self.wire.borrow_mut().is_open = true;
        Ok(MockConnection {
            wire: self.wire.clone(),
        })
    }
}

fn drain(transport: &mut impl Transport) -> Vec<IoEvent> {
    std::iter::from_fn(|| transport.next_event()).collect()
}

#[test]
fn test_open_and_close() {
    let wire = SharedWire::default();
    let mut transport = StreamTransport::new(MockNetwork::new(&wire), "mock://broker");
    assert!(!transport.is_open());
    assert_eq!(transport.remote(), "mock://broker");

    transport.open().unwrap();
    assert!(transport.is_open());
    assert!(wire.borrow().is_open);
    assert_eq!(drain(&mut transport), vec![IoEvent::OpenComplete(Ok(()))]);

    transport.close().unwrap();
    assert!(!transport.is_open());
    assert!(!wire.borrow().is_open);
    assert_eq!(drain(&mut transport), vec![IoEvent::CloseComplete]);
    assert_eq!(transport.close(), Err(Error::NotOpen));
}

#[test]
fn test_open_refused() {
    let wire = SharedWire::default();
    let mut network = MockNetwork::new(&wire);
    network.refuse = true;
    let mut transport = StreamTransport::new(network, "mock://broker");

    transport.open().unwrap();
    assert!(!transport.is_open());
    assert_eq!(
        drain(&mut transport),
        vec![IoEvent::OpenComplete(Err(Error::ConnectionRefused))]
    );
}

#[test]
fn test_send_before_open() {
    let wire = SharedWire::default();
    let mut transport = StreamTransport::new(MockNetwork::new(&wire), "mock://broker");
    assert_eq!(transport.send(&[1, 2, 3]), Err(Error::NotOpen));
    assert!(drain(&mut transport).is_empty());
}

#[test]
fn test_send_writes_everything() {
    let wire = SharedWire::default();
    let mut transport = StreamTransport::new(MockNetwork::new(&wire), "mock://broker");
    transport.open().unwrap();
    drain(&mut transport);

    let data: Vec<u8> = (0..23).collect();
    transport.send(&data).unwrap();

    assert_eq!(wire.borrow().from_device, data);
    assert_eq!(drain(&mut transport), vec![IoEvent::SendComplete(Ok(()))]);
}

#[test]
fn test_pump_reads_in_chunks() {
    let wire = SharedWire::default();
    let mut transport = StreamTransport::new(MockNetwork::new(&wire), "mock://broker");
    transport.open().unwrap();
    drain(&mut transport);

    let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
    wire.borrow_mut().to_device.extend(data.iter().copied());
    transport.pump_io();

    let mut received = Vec::new();
    for event in drain(&mut transport) {
        match event {
            IoEvent::BytesReceived(chunk) => {
                assert!(chunk.len() <= 512);
                received.extend(chunk);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(received, data);

    // Nothing left to read.
    transport.pump_io();
    assert!(drain(&mut transport).is_empty());
}

#[test]
fn test_pump_read_errors() {
    let wire = SharedWire::default();
    let mut transport = StreamTransport::new(MockNetwork::new(&wire), "mock://broker");
    transport.open().unwrap();
    drain(&mut transport);

    wire.borrow_mut().read_error = Some(Error::Timeout);
    transport.pump_io();
    assert!(drain(&mut transport).is_empty());

    wire.borrow_mut().read_error = Some(Error::ReadError);
    transport.pump_io();
    assert_eq!(drain(&mut transport), vec![IoEvent::IoError(Error::ReadError)]);
}

#[derive(Clone, Copy)]
struct FrozenClock;

impl TickCounter for FrozenClock {
    fn now_ms(&self) -> u64 {
        0
    }
}

#[test]
fn test_session_over_stream_transport() {
    let wire = SharedWire::default();
    let transport = StreamTransport::new(MockNetwork::new(&wire), "mock://broker");
    let mut client = Client::new(EventQueue::new(), FrozenClock);

    client
        .connect(transport, &ConnectOptions::new("dev1").with_keep_alive(60))
        .unwrap();
    client.pump();
    let connect = codec::encode_connect(&ConnectOptions::new("dev1").with_keep_alive(60)).unwrap();
    assert_eq!(wire.borrow().from_device, connect);

    wire.borrow_mut()
        .to_device
        .extend(codec::encode_connack(false, 0));
    client.pump();
    assert!(client.is_connected());

    wire.borrow_mut().from_device.clear();
    let message = Message::new(3, "t", QoS::AtLeastOnce, b"v".to_vec()).unwrap();
    client.publish(&message).unwrap();
    assert_eq!(
        wire.borrow().from_device,
        codec::encode_publish(QoS::AtLeastOnce, false, false, 3, "t", b"v").unwrap()
    );

    client.disconnect().unwrap();
    client.pump();
    assert!(!wire.borrow().is_open);
    assert!(!client.is_connected());
}
