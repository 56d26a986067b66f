use libiot_mqtt::network::application::mqtt::codec::{
    self, DecodedPacket, Decoder, MAX_REMAINING_LENGTH, PacketType,
};
use libiot_mqtt::network::application::mqtt::{
    ConnAck, ConnectOptions, ConnectReturnCode, DecodeError, Message, Packet, QoS, SubAck,
    SubscribeReturnCode, Will,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn decode_all(decoder: &mut Decoder, bytes: &[u8]) -> Vec<DecodedPacket> {
    decoder
        .feed(bytes)
        .collect::<Result<Vec<_>, _>>()
        .expect("valid stream")
}

fn round_trip(packet: &Packet) -> Packet {
    let bytes = packet.encode().expect("encodable");
    let mut decoder = Decoder::new();
    let frames = decode_all(&mut decoder, &bytes);
    assert_eq!(frames.len(), 1, "{packet:?}");
    assert!(decoder.is_idle());
    Packet::from_frame(&frames[0]).expect("well-formed")
}

fn sample_packets() -> Vec<Packet> {
    vec![
        Packet::Connect(ConnectOptions::new("dev1").with_keep_alive(60)),
        Packet::Connect(
            ConnectOptions::new("sensor-7")
                .with_clean_session(false)
                .with_keep_alive(0)
                .with_credentials("user", "pa55")
                .with_will(Will::new("status", "offline").with_qos(QoS::ExactlyOnce).with_retain(true)),
        ),
        Packet::Connect(ConnectOptions::new("u-only").with_username("device")),
        Packet::ConnAck(ConnAck {
            session_present: true,
            return_code: ConnectReturnCode::Accepted,
        }),
        Packet::ConnAck(ConnAck {
            session_present: false,
            return_code: ConnectReturnCode::BadUserNameOrPassword,
        }),
        Packet::Publish(Message::new(0, "a", QoS::AtMostOnce, Vec::new()).unwrap()),
        Packet::Publish(
            Message::new(1, "a/b/c", QoS::AtLeastOnce, b"hello".to_vec())
                .unwrap()
                .with_retained(true),
        ),
        Packet::Publish(
            Message::new(u16::MAX, "x", QoS::ExactlyOnce, vec![0xFF; 300])
                .unwrap()
                .with_duplicate(true),
        ),
        Packet::PubAck(1),
        Packet::PubRec(2),
        Packet::PubRel(3),
        Packet::PubComp(u16::MAX),
        Packet::Subscribe {
            packet_id: 7,
            topics: vec![
                ("a/+".to_string(), QoS::AtMostOnce),
                ("b/#".to_string(), QoS::ExactlyOnce),
            ],
        },
        Packet::SubAck(SubAck {
            packet_id: 7,
            return_codes: vec![
                SubscribeReturnCode::Granted(QoS::AtMostOnce),
                SubscribeReturnCode::Failure,
            ],
        }),
        Packet::Unsubscribe {
            packet_id: 8,
            topics: vec!["a/+".to_string(), "b/#".to_string()],
        },
        Packet::UnsubAck(8),
        Packet::PingReq,
        Packet::PingResp,
        Packet::Disconnect,
    ]
}

#[test]
fn test_round_trip_every_packet_type() {
    let packets = sample_packets();
    let mut types: Vec<PacketType> = packets.iter().map(Packet::packet_type).collect();
    types.dedup();
    assert_eq!(types.len(), 14);

    for packet in &packets {
        assert_eq!(&round_trip(packet), packet);
    }
}

#[test]
fn test_round_trip_boundary_lengths() {
    // PINGREQ, PINGRESP and DISCONNECT cover a remaining length of 0.
    assert_eq!(codec::encode_ping(), vec![0xC0, 0x00]);

    // A QoS 0 PUBLISH on topic "t" has three bytes of variable header.
    for remaining in [127usize, 128, 16_383, 16_384] {
        let payload = vec![0x5A; remaining - 3];
        let packet = Packet::Publish(Message::new(0, "t", QoS::AtMostOnce, payload).unwrap());
        let bytes = packet.encode().unwrap();

        let (value, used) = codec::decode_remaining_length(&bytes[1..]).unwrap().unwrap();
        assert_eq!(value, remaining);
        assert_eq!(bytes.len(), 1 + used + remaining);
        assert_eq!(round_trip(&packet), packet);
    }
}

#[test]
fn test_largest_remaining_length() {
    let field = codec::encode_remaining_length(MAX_REMAINING_LENGTH).unwrap();
    assert_eq!(field.as_slice(), &[0xFF, 0xFF, 0xFF, 0x7F]);
    assert_eq!(
        codec::decode_remaining_length(&field),
        Ok(Some((MAX_REMAINING_LENGTH, 4)))
    );

    // The decoder accepts the header and waits for the body.
    let mut decoder = Decoder::new();
    let mut header = vec![0x30];
    header.extend_from_slice(&field);
    header.extend_from_slice(&[0x00, 0x01, b't']);
    assert_eq!(decoder.feed(&header).count(), 0);
    assert!(!decoder.is_idle());
}

#[test]
fn test_over_length_is_rejected() {
    assert_eq!(
        codec::encode_remaining_length(MAX_REMAINING_LENGTH + 1),
        Err(libiot_mqtt::network::application::mqtt::EncodeError::LengthOverflow)
    );
}

#[test]
fn test_incremental_decode_over_random_partitions() {
    let packets = sample_packets();
    let stream: Vec<u8> = packets
        .iter()
        .flat_map(|packet| packet.encode().unwrap())
        .collect();
    let expected = decode_all(&mut Decoder::new(), &stream);
    assert_eq!(expected.len(), packets.len());

    let mut rng = StdRng::seed_from_u64(0x4D51_5454);
    for _ in 0..500 {
        let mut decoder = Decoder::new();
        let mut decoded = Vec::new();
        let mut rest = stream.as_slice();
        while !rest.is_empty() {
            let take = rng.gen_range(1..=rest.len().min(64));
            let (chunk, tail) = rest.split_at(take);
            decoded.extend(decode_all(&mut decoder, chunk));
            rest = tail;
        }
        assert_eq!(decoded, expected);
        assert!(decoder.is_idle());
    }
}

#[test]
fn test_byte_at_a_time() {
    let bytes = Packet::Publish(Message::new(2, "slow", QoS::AtLeastOnce, vec![1; 200]).unwrap())
        .encode()
        .unwrap();
    let mut decoder = Decoder::new();
    for (i, byte) in bytes.iter().enumerate() {
        let frames = decode_all(&mut decoder, std::slice::from_ref(byte));
        if i + 1 < bytes.len() {
            assert!(frames.is_empty(), "premature frame at byte {i}");
        } else {
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].packet_type, PacketType::Publish);
        }
    }
}

#[test]
fn test_length_split_mid_continuation() {
    // Remaining length 200 needs two bytes: 0xC8 0x01.
    let bytes = codec::encode_publish(QoS::AtMostOnce, false, false, 0, "t", &[7; 197]).unwrap();
    assert_eq!(&bytes[1..3], &[0xC8, 0x01]);

    let mut decoder = Decoder::new();
    assert!(decode_all(&mut decoder, &bytes[..2]).is_empty());
    assert!(decode_all(&mut decoder, &bytes[2..3]).is_empty());
    assert_eq!(decode_all(&mut decoder, &bytes[3..]).len(), 1);
}

#[test]
fn test_malformed_length_across_chunks() {
    let mut decoder = Decoder::new();
    assert_eq!(decoder.feed(&[0x30, 0x80, 0x80]).count(), 0);
    let results: Vec<_> = decoder.feed(&[0x80, 0x80, 0x01]).collect();
    assert_eq!(results, vec![Err(DecodeError::MalformedLength)]);

    // The decoder is usable again afterwards.
    assert_eq!(decode_all(&mut decoder, &codec::encode_pingresp()).len(), 1);
}

#[test]
fn test_decode_next_leaves_following_bytes() {
    let mut stream = codec::encode_puback(1);
    stream.extend(codec::encode_puback(2));

    let mut decoder = Decoder::new();
    let mut input = stream.as_slice();
    let first = decoder.decode_next(&mut input).unwrap().unwrap();
    assert_eq!(first.payload, vec![0x00, 0x01]);
    assert_eq!(input.len(), 4);
    let second = decoder.decode_next(&mut input).unwrap().unwrap();
    assert_eq!(second.payload, vec![0x00, 0x02]);
    assert!(input.is_empty());
    assert_eq!(decoder.decode_next(&mut input), Ok(None));
}
