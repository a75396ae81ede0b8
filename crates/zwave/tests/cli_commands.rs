#![cfg(all(unix, feature = "cli"))]

use std::net::TcpListener;
use std::process::{Command, Output};

fn zwave(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zwave"))
        .args(args)
        .env_remove("ZWAVE_PORT")
        .output()
        .expect("zwave binary should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn decode_prints_application_command_as_json() {
    let output = zwave(&[
        "--format",
        "json",
        "decode",
        "06 01 09 00 04 00 05 03 20 03 63 b4",
    ]);
    assert_eq!(output.status.code(), Some(0), "stderr: {:?}", output.stderr);

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decode output should be json");
    let frames = value["frames"].as_array().expect("frames array");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["frame"], "ack");
    assert_eq!(frames[1]["message"]["message"], "application_command");
}

#[test]
fn decode_bad_checksum_is_data_invalid() {
    let output = zwave(&["decode", "01 09 00 04 00 05 03 20 03 63 00"]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("offset 0"));
}

#[test]
fn decode_bad_hex_is_usage() {
    let output = zwave(&["decode", "0g"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn decode_bare_command_class() {
    let output = zwave(&["--format", "json", "decode", "--cc", "--node", "7", "20 03 63"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Basic"));
}

#[test]
fn version_prints_name() {
    let output = zwave(&["version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with("zwave "));

    let extended = zwave(&["version", "--extended"]);
    assert!(stdout(&extended).contains("target_os:"));
}

#[test]
fn info_without_bridge_is_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        listener.local_addr().expect("local addr").port()
    };

    let output = zwave(&["info", &format!("tcp://127.0.0.1:{port}"), "--timeout", "5s"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("open failed"));
}

#[test]
fn send_rejects_malformed_port() {
    let output = zwave(&["send", "tcp://nohost", "--node", "2", "--cc", "2001ff"]);
    assert_eq!(output.status.code(), Some(64));
}
