//! Unit tests for the control channel: framing, command parsing, rejected
//! lines, the reader task and outbound encoding.

use bytes::BytesMut;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;

use farm_autopilot::control::codec::{ControlCodec, ControlLine, MAX_LINE_BYTES};
use farm_autopilot::control::messages::{GoldExp, StartConfig};
use farm_autopilot::control::reader::{parse_command_line, recover_request_id, run_reader};
use farm_autopilot::control::writer::{encode_message, run_writer};
use farm_autopilot::control::{ControlCommand, ControlSender, WorkerMessage};
use farm_autopilot::AppError;

#[test]
fn codec_splits_lines() {
    let mut codec = ControlCodec::new();
    let mut buf = BytesMut::from("{\"type\":\"stop\"}\n{\"type\":\"st");

    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some(ControlLine::Text("{\"type\":\"stop\"}".to_owned()))
    );
    assert_eq!(codec.decode(&mut buf).unwrap(), None, "partial line is buffered");

    buf.extend_from_slice(b"op\"}\n");
    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some(ControlLine::Text("{\"type\":\"stop\"}".to_owned()))
    );
}

#[test]
fn codec_flags_and_skips_oversized_line() {
    let mut codec = ControlCodec::new();
    let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_BYTES + 1].as_slice());

    assert_eq!(codec.decode(&mut buf).unwrap(), Some(ControlLine::TooLong));

    buf.extend_from_slice(b"xxxx\n{\"type\":\"stop\"}\n");
    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some(ControlLine::Text("{\"type\":\"stop\"}".to_owned())),
        "the rest of the oversized line is discarded"
    );
}

#[test]
fn codec_strips_carriage_return_and_flags_invalid_utf8() {
    let mut codec = ControlCodec::new();
    let mut buf = BytesMut::from(&b"{\"type\":\"stop\"}\r\nab\xffcd\n"[..]);

    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some(ControlLine::Text("{\"type\":\"stop\"}".to_owned()))
    );
    assert_eq!(
        codec.decode(&mut buf).unwrap(),
        Some(ControlLine::InvalidUtf8("ab\u{fffd}cd".to_owned()))
    );
    assert!(buf.is_empty(), "the invalid line is consumed");
}

#[test]
fn parses_every_command_shape() {
    let start = parse_command_line(
        r#"{"type":"start","config":{"code":"abc","platform":"wx","farmInterval":5000}}"#,
    )
    .unwrap();
    assert_eq!(
        start,
        Some(ControlCommand::Start {
            config: StartConfig {
                code: "abc".into(),
                platform: Some("wx".into()),
                farm_interval: Some(5000),
                friend_interval: None,
            }
        })
    );

    assert_eq!(
        parse_command_line(r#"{"type":"stop"}"#).unwrap(),
        Some(ControlCommand::Stop)
    );

    let call = parse_command_line(r#"{"type":"api_call","id":7,"method":"getLands"}"#)
        .unwrap()
        .unwrap();
    assert_eq!(
        call,
        ControlCommand::ApiCall {
            id: json!(7),
            method: "getLands".into(),
            args: serde_json::Value::Null,
        }
    );

    let sync = parse_command_line(
        r#"{"type":"config_sync","config":{"automation":{"farm":false},"__revision":4}}"#,
    )
    .unwrap()
    .unwrap();
    match sync {
        ControlCommand::ConfigSync { config } => {
            assert_eq!(config.revision, Some(4));
            assert_eq!(config.automation.unwrap().get("farm"), Some(&false));
        }
        other => panic!("expected config_sync, got {other:?}"),
    }
}

#[test]
fn blank_line_is_skipped() {
    assert_eq!(parse_command_line("   ").unwrap(), None);
}

#[test]
fn malformed_and_unknown_lines_are_control_errors() {
    let malformed = parse_command_line("{not json").unwrap_err();
    assert!(matches!(malformed, AppError::Control(ref m) if m.starts_with("malformed json")));

    let unknown = parse_command_line(r#"{"type":"dance"}"#).unwrap_err();
    assert!(matches!(unknown, AppError::Control(ref m) if m.starts_with("invalid command")));
}

#[test]
fn request_id_recovered_only_for_api_calls() {
    assert_eq!(
        recover_request_id(r#"{"type":"api_call","id":"r1","method":42}"#),
        Some(json!("r1"))
    );
    assert_eq!(recover_request_id(r#"{"type":"api_call","id":null}"#), None);
    assert_eq!(recover_request_id(r#"{"type":"stop","id":3}"#), None);
    assert_eq!(recover_request_id("garbage"), None);
}

#[test]
fn outbound_messages_use_wire_shapes() {
    let bytes = encode_message(&WorkerMessage::StatUpdate {
        data: GoldExp { gold: 5, exp: 6 },
    })
    .unwrap();
    assert_eq!(bytes.last(), Some(&b'\n'));
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value, json!({ "type": "stat_update", "data": { "gold": 5, "exp": 6 } }));

    let ok = serde_json::to_value(WorkerMessage::api_response(json!(1), Ok(json!([1, 2])))).unwrap();
    assert_eq!(ok, json!({ "type": "api_response", "id": 1, "result": [1, 2], "error": null }));

    let failed = serde_json::to_value(WorkerMessage::api_response(
        json!(2),
        Err(AppError::Control("Unknown method".into())),
    ))
    .unwrap();
    assert_eq!(
        failed,
        json!({ "type": "api_response", "id": 2, "result": null, "error": "Unknown method" })
    );

    let kicked = serde_json::to_value(WorkerMessage::AccountKicked {
        reason: "elsewhere".into(),
    })
    .unwrap();
    assert_eq!(kicked, json!({ "type": "account_kicked", "reason": "elsewhere" }));
}

#[tokio::test]
async fn reader_forwards_commands_and_answers_bad_lines() {
    let (mut client, server) = tokio::io::duplex(4096);
    let (command_tx, mut command_rx) = mpsc::channel(8);
    let (outbound, mut outbound_rx) = ControlSender::channel();
    let cancel = CancellationToken::new();
    let reader = tokio::spawn(run_reader(server, command_tx, outbound, cancel));

    client
        .write_all(
            concat!(
                "{\"type\":\"api_call\",\"id\":9,\"method\":\"getLands\"}\n",
                "{broken\n",
                "{\"type\":\"api_call\",\"id\":10}\n",
                "\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    drop(client);

    assert!(matches!(
        command_rx.recv().await,
        Some(ControlCommand::ApiCall { ref method, .. }) if method == "getLands"
    ));
    assert_eq!(
        command_rx.recv().await,
        Some(ControlCommand::Stop),
        "EOF is treated as stop"
    );
    reader.await.unwrap().unwrap();

    match outbound_rx.try_recv().unwrap() {
        WorkerMessage::Error { error } => assert!(error.contains("malformed json")),
        other => panic!("expected error, got {other:?}"),
    }
    match outbound_rx.try_recv().unwrap() {
        WorkerMessage::ApiResponse { id, result, error } => {
            assert_eq!(id, json!(10));
            assert!(result.is_null());
            assert!(error.unwrap().contains("invalid command"));
        }
        other => panic!("expected api_response, got {other:?}"),
    }
    assert!(outbound_rx.try_recv().is_err());
}

#[tokio::test]
async fn reader_answers_invalid_utf8_and_keeps_reading() {
    let (mut client, server) = tokio::io::duplex(4096);
    let (command_tx, mut command_rx) = mpsc::channel(8);
    let (outbound, mut outbound_rx) = ControlSender::channel();
    let reader = tokio::spawn(run_reader(server, command_tx, outbound, CancellationToken::new()));

    client
        .write_all(b"{\"type\":\"api_call\",\"id\":1,\"method\":\"\xff\xfe\"}\n\xff\n")
        .await
        .unwrap();
    client
        .write_all(b"{\"type\":\"api_call\",\"id\":2,\"method\":\"getLands\"}\n")
        .await
        .unwrap();
    drop(client);

    assert!(matches!(
        command_rx.recv().await,
        Some(ControlCommand::ApiCall { ref id, ref method, .. }) if *id == json!(2) && method == "getLands"
    ));
    assert_eq!(command_rx.recv().await, Some(ControlCommand::Stop));
    reader.await.unwrap().unwrap();

    match outbound_rx.try_recv().unwrap() {
        WorkerMessage::ApiResponse { id, result, error } => {
            assert_eq!(id, json!(1));
            assert!(result.is_null());
            assert!(error.unwrap().contains("invalid utf-8"));
        }
        other => panic!("expected api_response, got {other:?}"),
    }
    match outbound_rx.try_recv().unwrap() {
        WorkerMessage::Error { error } => assert!(error.contains("invalid utf-8")),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(outbound_rx.try_recv().is_err());
}

#[tokio::test]
async fn reader_survives_oversized_line() {
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let (command_tx, mut command_rx) = mpsc::channel(8);
    let (outbound, mut outbound_rx) = ControlSender::channel();
    let reader = tokio::spawn(run_reader(server, command_tx, outbound, CancellationToken::new()));

    let mut oversized = vec![b'x'; MAX_LINE_BYTES + 16];
    oversized.push(b'\n');
    client.write_all(&oversized).await.unwrap();
    client.write_all(b"{\"type\":\"stop\"}\n").await.unwrap();

    assert_eq!(command_rx.recv().await, Some(ControlCommand::Stop));
    match outbound_rx.try_recv().unwrap() {
        WorkerMessage::Error { error } => assert!(error.contains("line too long")),
        other => panic!("expected error, got {other:?}"),
    }

    drop(client);
    assert_eq!(command_rx.recv().await, Some(ControlCommand::Stop), "EOF still stops");
    reader.await.unwrap().unwrap();
}

#[tokio::test]
async fn writer_emits_one_line_per_message_and_drains_on_cancel() {
    let (client, mut server) = tokio::io::duplex(4096);
    let (outbound, outbound_rx) = ControlSender::channel();
    let cancel = CancellationToken::new();

    outbound.send(WorkerMessage::Error { error: "one".into() });
    outbound.send(WorkerMessage::AccountKicked { reason: "two".into() });
    cancel.cancel();

    run_writer(client, outbound_rx, cancel).await.unwrap();

    let mut raw = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut server, &mut raw)
        .await
        .unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"type\":\"error\""));
    assert!(lines[1].contains("\"type\":\"account_kicked\""));
}
