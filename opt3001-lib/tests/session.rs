//! Tests for session sequencing over a scripted transport

mod common;

use common::*;
use opt3001_lib::session;

#[tokio::test(start_paused = true)]
async fn test_open_runs_configuration_handshake() {
    let session = Session::open(ScriptedTransport::new()).await.expect("Failed to open session");
    assert_eq!(session.state(), ConfigState::Configured);
    assert_eq!(session.config(), SensorConfig::default());

    let transport = session.into_transport();
    assert_eq!(transport.written_hex(), vec![DEFAULT_CONFIG_FRAME, ACK_TRIGGER_FRAME]);
    assert!(matches!(
        transport.events.as_slice(),
        [Event::Write(_), Event::Read(_), Event::Write(_), Event::Read(_)]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_between_write_and_read() {
    let mut session = Session::open(ScriptedTransport::opened_with(vec![Reply::Frame(response_frame(0, 0))]))
        .await
        .unwrap();
    session.read_register(0).await.unwrap();

    let events = &session.transport().events;
    assert_eq!(events.len(), 6);
    for pair in events.chunks(2) {
        match pair {
            [Event::Write(written), Event::Read(read)] => {
                assert!(*read - *written >= SETTLE_DELAY, "Read issued before settle delay elapsed");
            }
            other => panic!("Expected write followed by read, got {:?}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_read_register_round_trip() {
    let transport = ScriptedTransport::opened_with(vec![Reply::Frame(response_frame(0xC8, 0x10))]);
    let mut session = Session::open(transport).await.unwrap();

    let value = session.read_register(1).await.unwrap();
    assert_eq!(value, RegisterValue::new(0xC8, 0x10));

    let writes = &session.transport().writes;
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[2], encode_read_register(1).unwrap().as_bytes());
}

#[tokio::test(start_paused = true)]
async fn test_read_lux_uses_result_register() {
    let transport = ScriptedTransport::opened_with(vec![Reply::Frame(response_frame(0x1A, 0x2B))]);
    let mut session = Session::open(transport).await.unwrap();

    let lux = session.read_lux().await.unwrap();
    assert!((lux - 52.06).abs() < 1e-9);
    assert_eq!(session.transport().writes[2][10], 0x00);
}

#[tokio::test(start_paused = true)]
async fn test_read_all_registers_in_order() {
    let replies = (0..16u8).map(|i| Reply::Frame(response_frame(i, 0xF0 | i))).collect();
    let mut session = Session::open(ScriptedTransport::opened_with(replies)).await.unwrap();

    let values = session.read_all_registers().await.unwrap();
    assert_eq!(values.len(), 16);
    for (i, value) in values.iter().enumerate() {
        assert_eq!(*value, RegisterValue::new(i as u8, 0xF0 | i as u8));
    }

    let addresses: Vec<u8> = session.transport().writes[2..].iter().map(|w| w[10]).collect();
    assert_eq!(addresses, (0..16).collect::<Vec<u8>>());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_register_does_not_touch_transport() {
    let mut session = Session::open(ScriptedTransport::new()).await.unwrap();
    assert!(matches!(session.read_register(16).await, Err(Error::InvalidRegister(16))));
    assert_eq!(session.transport().writes.len(), 2);
    assert_eq!(session.transport().events.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_reconfigure_is_idempotent_on_the_wire() {
    let mut session = Session::open(ScriptedTransport::new()).await.unwrap();
    session.configure(5, 100, OperatingMode::SingleShot).await.unwrap();
    session.configure(5, 100, OperatingMode::SingleShot).await.unwrap();

    let writes = &session.transport().writes;
    assert_eq!(writes.len(), 6);
    assert_eq!(writes[2..4], writes[4..6]);
    assert_eq!(writes[2][12], 0x52);
    assert_eq!(hex::encode(&writes[3]), ACK_TRIGGER_FRAME);
    assert_eq!(session.config().full_scale.value(), 5);
    assert_eq!(session.config().conversion_time, ConversionTime::Ms100);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_configuration_keeps_previous_state() {
    let mut session = Session::open(ScriptedTransport::new()).await.unwrap();
    assert!(matches!(
        session.configure(13, 800, OperatingMode::Continuous).await,
        Err(Error::InvalidFullScale(13))
    ));
    assert!(matches!(
        session.configure(12, 400, OperatingMode::Continuous).await,
        Err(Error::InvalidConversionTime(400))
    ));
    assert_eq!(session.state(), ConfigState::Configured);
    assert_eq!(session.config(), SensorConfig::default());
    assert_eq!(session.transport().writes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_open_fails_when_write_fails() {
    for index in 0..2 {
        match Session::open(ScriptedTransport::failing_write_at(index)).await {
            Err(Error::Transport(TransportError::Transfer(TransferError::Disconnected))) => {}
            Err(other) => panic!("Expected transport error at write {}, got {:?}", index, other),
            Ok(_) => panic!("Expected open to fail at write {}", index),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_fails_when_ack_read_fails() {
    let mut transport = ScriptedTransport::new();
    transport.replies.push_back(Reply::Frame(vec![0u8; FRAME_LEN]));
    transport.replies.push_back(Reply::Fail(TransferError::Stall));

    assert!(matches!(
        Session::open(transport).await,
        Err(Error::Transport(TransportError::Transfer(TransferError::Stall)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_read_times_out() {
    let transport = ScriptedTransport::opened_with(vec![Reply::Stall]);
    let mut session = Session::open(transport).await.unwrap();

    assert!(matches!(
        session.read_lux().await,
        Err(Error::Transport(TransportError::Timeout(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_custom_read_timeout() {
    let timing = SessionConfig {
        read_timeout: std::time::Duration::from_millis(20),
        ..SessionConfig::default()
    };
    let mut transport = ScriptedTransport::new();
    transport.replies.push_back(Reply::Stall);

    let started = tokio::time::Instant::now();
    let result = Session::open_with(transport, SensorConfig::default(), timing).await;
    assert!(matches!(result, Err(Error::Transport(TransportError::Timeout(_)))));
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_short_response() {
    let transport = ScriptedTransport::opened_with(vec![Reply::Frame(vec![0u8; 8])]);
    let mut session = Session::open(transport).await.unwrap();

    assert!(matches!(
        session.read_register(0).await,
        Err(Error::ShortResponse { expected: 12, actual: 8 })
    ));
    // A malformed reply does not affect the next exchange
    assert_eq!(session.read_register(0).await.unwrap(), RegisterValue::new(0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconfiguration_blocks_reads_until_recovered() {
    let transport = ScriptedTransport::opened_with(vec![Reply::Fail(TransferError::Fault)]);
    let mut session = Session::open(transport).await.unwrap();

    assert!(session.set_config(SensorConfig::default()).await.is_err());
    assert_eq!(session.state(), ConfigState::Configuring);
    assert!(matches!(session.read_lux().await, Err(Error::NotConfigured)));

    session.set_config(SensorConfig::default()).await.unwrap();
    assert_eq!(session.state(), ConfigState::Configured);
    assert!(session.read_lux().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_sample_is_timestamped() {
    let transport = ScriptedTransport::opened_with(vec![Reply::Frame(response_frame(0x0C, 0x00))]);
    let mut session = Session::open(transport).await.unwrap();

    let before = session::timestamp();
    let reading = session.sample().await.unwrap();
    let after = session::timestamp();

    assert!((reading.lux - 30.72).abs() < 1e-9);
    assert!(reading.timestamp >= before && reading.timestamp <= after);
}

#[tokio::test(start_paused = true)]
async fn test_shared_session_serializes_exchanges() {
    let replies = (0..8u8).map(|i| Reply::Frame(response_frame(0x00, i))).collect();
    let session = Session::open(ScriptedTransport::opened_with(replies)).await.unwrap();
    let shared = SharedSession::new(session);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let shared = shared.clone();
        handles.push(tokio::spawn(async move { shared.read_register(2).await }));
    }
    let mut lows = Vec::new();
    for handle in handles {
        lows.push(handle.await.unwrap().unwrap().low);
    }
    lows.sort();
    assert_eq!(lows, (0..8).collect::<Vec<u8>>());

    let guard = shared.lock().await;
    let events = &guard.transport().events;
    assert_eq!(events.len(), 4 + 16);
    for pair in events.chunks(2) {
        assert!(matches!(pair, [Event::Write(_), Event::Read(_)]));
    }
}
