//! Stand-alone checksum query behaviour against the simulated peer.

use scriptlink::config::UploadConfig;
use scriptlink::engine::UploadEngine;
use scriptlink::status::StatusCode;

use crate::mock_peer::{MockPeer, Rpc, crc16_xmodem, exchange};

fn engine() -> UploadEngine<MockPeer> {
    UploadEngine::new(MockPeer::new(), &UploadConfig::default())
}

#[test]
fn idle_query_reports_installed_crc() {
    let mut e = engine();
    e.transport_mut().storage = b"previously installed script".to_vec();
    let expected = crc16_xmodem(b"previously installed script");

    e.request_script_checksum();
    exchange(&mut e);

    assert!(e.checksum_available());
    assert_eq!(e.checksum(), expected);
    assert_eq!(e.status(), StatusCode::Ok);
}

#[test]
fn fixed_crc_round_trip() {
    let mut e = engine();
    e.transport_mut().crc_override = Some(0x1234);

    e.request_script_checksum();
    exchange(&mut e);

    assert!(e.checksum_available());
    assert_eq!(e.checksum(), 0x1234);
}

#[test]
fn reissue_clears_availability_until_reply() {
    let mut e = engine();
    e.transport_mut().crc_override = Some(0x1111);
    e.request_script_checksum();
    exchange(&mut e);
    assert!(e.checksum_available());

    // Issue again but hold the reply back.
    e.transport_mut().deaf_to = Some(Rpc::QueryCrc);
    e.request_script_checksum();
    exchange(&mut e);
    assert!(!e.checksum_available());
}

#[test]
fn query_during_upload_has_no_effect() {
    let mut e = engine();
    e.start_upload(b"s", 0x0042, 0);
    exchange(&mut e);

    e.request_script_checksum();
    assert!(!e.checksum_available());
    assert!(
        !e.transport().log.contains(&Rpc::QueryCrc),
        "no CRC query may go out while a session is active"
    );
}

#[test]
fn unanswered_query_times_out_with_status() {
    let cfg = UploadConfig {
        timeout_ticks: 2,
        max_retries: 1,
    };
    let mut e = UploadEngine::new(MockPeer::new(), &cfg);
    e.transport_mut().deaf_to = Some(Rpc::QueryCrc);

    e.request_script_checksum();
    for _ in 0..4 {
        e.tick_100ms();
        exchange(&mut e);
    }

    assert!(!e.checksum_available());
    assert_eq!(e.status(), StatusCode::NoResponseScriptCrcRpc);
}

#[test]
fn upload_then_query_sees_new_script() {
    let script = b"fresh bytecode image";
    let mut e = engine();

    e.start_upload(b"fresh", crc16_xmodem(script), 0);
    exchange(&mut e);
    e.data_block(script);
    exchange(&mut e);
    e.end_of_data();
    exchange(&mut e);
    assert!(e.completed());

    // Terminal state must be left via abort before a new query.
    e.abort();
    e.request_script_checksum();
    exchange(&mut e);

    assert!(e.checksum_available());
    assert_eq!(e.checksum(), crc16_xmodem(script));
}
