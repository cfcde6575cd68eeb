#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use brickwire::frame::{parse_uid, HEADER_SIZE};

fn brickwire(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_brickwire"))
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("BRICKWIRE_HOST")
        .env_remove("BRICKWIRE_PORT")
        .env_remove("BRICKWIRE_SECRET")
        .env_remove("RUST_LOG")
        .output()
        .expect("brickwire should run")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().next().expect("stdout should have a line");
    serde_json::from_str(line).expect("stdout should be json")
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr").port()
}

fn read_packet(stream: &mut TcpStream) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut header = vec![0u8; HEADER_SIZE];
    stream.read_exact(&mut header).ok()?;
    let mut payload = vec![0u8; (header[4] as usize).saturating_sub(HEADER_SIZE)];
    stream.read_exact(&mut payload).ok()?;
    Some((header, payload))
}

/// Accept one client and hand every request to `respond`. Returns the
/// headers received.
fn fake_daemon<F>(respond: F) -> (u16, JoinHandle<Vec<Vec<u8>>>)
where
    F: Fn(&[u8], &[u8]) -> Vec<Vec<u8>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        let mut seen = Vec::new();
        while let Some((header, payload)) = read_packet(&mut stream) {
            for packet in respond(&header, &payload) {
                if stream.write_all(&packet).is_err() {
                    break;
                }
            }
            seen.push(header);
        }
        seen
    });
    (port, handle)
}

#[test]
fn version_prints_package_version() {
    let output = brickwire(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("brickwire {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn uid_converts_base58_to_number() {
    let output = brickwire(&["--format", "json", "uid", "Dq3"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["base58"], "Dq3");
    assert_eq!(json["number"], parse_uid("Dq3").unwrap().to_string());
}

#[test]
fn uid_rejects_invalid_base58() {
    let output = brickwire(&["uid", "0OIl"]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid uid"));
}

#[test]
fn ping_refused_exits_with_transport_code() {
    let port = closed_port().to_string();
    let output = brickwire(&["ping", "--host", "127.0.0.1", "--port", &port]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn send_rejects_bad_hex_before_connecting() {
    let port = closed_port().to_string();
    let output = brickwire(&[
        "send", "--port", &port, "--uid", "Dq3", "--function-id", "1", "--data", "xyz",
    ]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn ping_sends_disconnect_probe() {
    let (port, daemon) = fake_daemon(|_, _| Vec::new());
    let port = port.to_string();
    let output = brickwire(&["--format", "json", "ping", "--host", "127.0.0.1", "--port", &port]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["status"], "reachable");

    let seen = daemon.join().expect("daemon thread");
    assert_eq!(seen.len(), 1);
    let header = &seen[0];
    assert_eq!(&header[..4], &[0, 0, 0, 0]);
    assert_eq!(header[5], 128);
    assert_eq!(header[6] & 0x08, 0, "probe must not expect a response");
}

#[test]
fn send_prints_reply() {
    let (port, daemon) = fake_daemon(|header, _| {
        // Echo the header back with a one-byte payload.
        let mut reply = header.to_vec();
        reply[4] = (HEADER_SIZE + 1) as u8;
        reply.push(0x0A);
        vec![reply]
    });
    let port = port.to_string();
    let output = brickwire(&[
        "--format",
        "json",
        "send",
        "--host",
        "127.0.0.1",
        "--port",
        &port,
        "--uid-number",
        "4660",
        "--function-id",
        "5",
        "--data",
        "0102",
        "--response-expected",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = stdout_json(&output);
    assert_eq!(json["uid_number"], 4660);
    assert_eq!(json["function_id"], 5);
    assert_eq!(json["sequence_number"], 1);
    assert_eq!(json["payload"], "0a");

    let seen = daemon.join().expect("daemon thread");
    assert_eq!(u32::from_le_bytes([seen[0][0], seen[0][1], seen[0][2], seen[0][3]]), 4660);
    assert_eq!(seen[0][4], 10);
}

#[test]
fn enumerate_lists_announced_devices() {
    let (port, _daemon) = fake_daemon(|header, _| {
        if header[5] != 254 {
            return Vec::new();
        }
        let uid = parse_uid("Dq3").unwrap();
        let mut packet = uid.to_le_bytes().to_vec();
        packet.extend_from_slice(&[(HEADER_SIZE + 26) as u8, 253, 0, 0]);
        let mut payload = [0u8; 26];
        payload[..3].copy_from_slice(b"Dq3");
        payload[8..12].copy_from_slice(b"6Dct");
        payload[16] = b'a';
        payload[17..20].copy_from_slice(&[1, 1, 0]);
        payload[20..23].copy_from_slice(&[2, 0, 4]);
        payload[23..25].copy_from_slice(&2113u16.to_le_bytes());
        packet.extend_from_slice(&payload);
        vec![packet]
    });
    let port = port.to_string();
    let output = brickwire(&[
        "--format",
        "json",
        "enumerate",
        "--host",
        "127.0.0.1",
        "--port",
        &port,
        "--count",
        "1",
        "--wait",
        "5s",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = stdout_json(&output);
    assert_eq!(json["uid"], "Dq3");
    assert_eq!(json["kind"], "available");
    assert_eq!(json["connected_uid"], "6Dct");
    assert_eq!(json["position"], "port a");
    assert_eq!(json["device_identifier"], 2113);
}
