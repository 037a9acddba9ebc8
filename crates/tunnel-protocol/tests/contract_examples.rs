//! Golden examples for every wire message type this workspace puts on the
//! wire: build a concrete `Msg`, push it through `encode`/`decode`, and
//! assert byte-for-byte equality of every field, including the envelope.

use bytes::Bytes;
use tunnel_protocol::{flags, Body, CacheShareItem, ContentType, Header, Msg, MsgType, StreamId};

fn assert_round_trips(msg: &Msg) {
    let parts = msg.encode().expect("encode");
    let decoded = Msg::decode(parts).expect("decode");
    assert_eq!(decoded.envelope, msg.envelope);
    assert_eq!(decoded.header, msg.header);
    match (&msg.body, &decoded.body) {
        (
            Body::TcpData { content_type: ct1, payload: p1 },
            Body::TcpData { content_type: ct2, payload: p2 },
        ) => {
            assert_eq!(ct1, ct2);
            assert_eq!(p1, p2);
        }
        (Body::CacheShare { items: i1 }, Body::CacheShare { items: i2 }) => {
            assert_eq!(i1, i2);
        }
        (
            Body::Error { content_type: ct1, payload: p1 },
            Body::Error { content_type: ct2, payload: p2 },
        ) => {
            assert_eq!(ct1, ct2);
            assert_eq!(p1, p2);
        }
        (a, b) => panic!("variant mismatch: {a:?} vs {b:?}"),
    }
}

#[test]
fn tcp_connect_round_trips() {
    let msg = Msg::new(
        Header::new(StreamId::new(), MsgType::TcpConnect, flags::TCP | flags::STREAM_BEGIN),
        Body::TcpData {
            content_type: ContentType::Raw,
            payload: Bytes::from_static(b"example.com:443"),
        },
    );
    assert_round_trips(&msg);
}

#[test]
fn tcp_connect_rep_round_trips() {
    let msg = Msg::new(
        Header::new(StreamId::new(), MsgType::TcpConnectRep, flags::TCP | flags::STREAM_BEGIN),
        Body::TcpData {
            content_type: ContentType::Raw,
            payload: Bytes::from_static(b"93.184.216.34:443"),
        },
    );
    assert_round_trips(&msg);
}

#[test]
fn tcp_data_raw_interior_round_trips() {
    let msg = Msg::new(
        Header::new(StreamId::new(), MsgType::TcpData, flags::TCP),
        Body::TcpData {
            content_type: ContentType::Raw,
            payload: Bytes::from_static(b"some chunk of a response body"),
        },
    );
    assert_round_trips(&msg);
}

#[test]
fn tcp_data_cache_diff_round_trips() {
    let diff = tunnel_protocol::DiffContent {
        cache_key: b"http://example.com/a".to_vec(),
        patch_to: vec![0xaa; 16],
        diff: b"bsdiff-patch-bytes".to_vec(),
    };
    let msg = Msg::new(
        Header::new(StreamId::new(), MsgType::TcpData, flags::HTTP | flags::TCP | flags::STREAM_END),
        Body::TcpData {
            content_type: ContentType::CacheDiff,
            payload: Bytes::from(diff.encode().unwrap()),
        },
    );
    assert_round_trips(&msg);
}

#[test]
fn empty_terminal_tcp_data_round_trips() {
    let msg = Msg::new(
        Header::new(StreamId::new(), MsgType::TcpData, flags::TCP | flags::STREAM_END),
        Body::TcpData {
            content_type: ContentType::Raw,
            payload: Bytes::new(),
        },
    );
    assert_round_trips(&msg);
}

#[test]
fn cache_share_round_trips_with_multiple_items() {
    let msg = Msg::new(
        Header::new(StreamId::new(), MsgType::CacheShare, 0),
        Body::CacheShare {
            items: vec![
                CacheShareItem {
                    cache_key: b"http://example.com/a".to_vec(),
                    digest: vec![1; 16],
                },
                CacheShareItem {
                    cache_key: b"http://example.com/b".to_vec(),
                    digest: vec![2; 16],
                },
            ],
        },
    );
    assert_round_trips(&msg);
}

#[test]
fn error_round_trips() {
    let msg = Msg::new(
        Header::new(StreamId::new(), MsgType::Error, flags::STREAM_END),
        Body::Error {
            content_type: ContentType::Raw,
            payload: Bytes::from_static(b"dns failure"),
        },
    );
    assert_round_trips(&msg);
}

#[test]
fn envelope_routing_parts_survive_a_round_trip() {
    let msg = Msg::with_envelope(
        vec![Bytes::from_static(b"peer-1"), Bytes::from_static(b"session-7")],
        Header::new(StreamId::new(), MsgType::TcpData, flags::TCP | flags::STREAM_END),
        Body::TcpData {
            content_type: ContentType::Raw,
            payload: Bytes::new(),
        },
    );
    assert_round_trips(&msg);
}
