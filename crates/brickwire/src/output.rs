use std::io::{IsTerminal, Write};

use brickwire_connection::{EnumerationEvent, Packet, Position};
use brickwire_frame::base58_encode;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EnumerationOutput {
    uid: String,
    kind: String,
    connected_uid: Option<String>,
    position: Option<String>,
    hardware_version: Option<String>,
    firmware_version: Option<String>,
    device_identifier: Option<u16>,
}

impl From<&EnumerationEvent> for EnumerationOutput {
    fn from(event: &EnumerationEvent) -> Self {
        let info = event.info.as_ref();
        Self {
            uid: event.uid_string(),
            kind: event.kind.to_string(),
            connected_uid: info
                .and_then(|info| info.connected_uid)
                .map(|uid| base58_encode(u64::from(uid))),
            position: info.map(|info| position_label(info.position)),
            hardware_version: info.map(|info| version_label(info.hardware_version)),
            firmware_version: info.map(|info| version_label(info.firmware_version)),
            device_identifier: info.map(|info| info.device_identifier),
        }
    }
}

impl EnumerationOutput {
    fn row(&self) -> Vec<String> {
        vec![
            self.uid.clone(),
            self.kind.clone(),
            self.connected_uid.clone().unwrap_or_else(|| "-".into()),
            self.position.clone().unwrap_or_else(|| "-".into()),
            self.hardware_version.clone().unwrap_or_else(|| "-".into()),
            self.firmware_version.clone().unwrap_or_else(|| "-".into()),
            self.device_identifier
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".into()),
        ]
    }
}

/// Print one enumeration event as it arrives. Table output is buffered and
/// printed by [`print_enumeration_table`].
pub fn print_enumeration(event: &EnumerationEvent, format: OutputFormat) {
    let out = EnumerationOutput::from(event);
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Pretty => println!(
            "uid={} kind={} connected_uid={} position={} hardware={} firmware={} device_identifier={}",
            out.uid,
            out.kind,
            out.connected_uid.as_deref().unwrap_or("-"),
            out.position.as_deref().unwrap_or("-"),
            out.hardware_version.as_deref().unwrap_or("-"),
            out.firmware_version.as_deref().unwrap_or("-"),
            out.device_identifier
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".into()),
        ),
        OutputFormat::Raw => println!("{} {}", out.uid, out.kind),
        OutputFormat::Table => {}
    }
}

pub fn print_enumeration_table(events: &[EnumerationEvent]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "UID",
            "KIND",
            "CONNECTED",
            "POSITION",
            "HARDWARE",
            "FIRMWARE",
            "DEVICE",
        ]);
    for event in events {
        table.add_row(EnumerationOutput::from(event).row());
    }
    println!("{table}");
}

#[derive(Serialize)]
struct ReplyOutput {
    uid: String,
    uid_number: u32,
    function_id: u8,
    sequence_number: Option<u8>,
    flags: String,
    payload_size: usize,
    payload: String,
}

pub fn print_reply(reply: &Packet, format: OutputFormat) {
    let header = &reply.header;
    let out = ReplyOutput {
        uid: base58_encode(u64::from(header.uid)),
        uid_number: header.uid,
        function_id: header.function_id.raw(),
        sequence_number: header.sequence_number.map(|seq| seq.get()),
        flags: header.flags.to_string(),
        payload_size: reply.payload.len(),
        payload: hex::encode(&reply.payload),
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["UID", "FUNCTION", "SEQ", "FLAGS", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    out.uid.clone(),
                    out.function_id.to_string(),
                    out.sequence_number
                        .map(|seq| seq.to_string())
                        .unwrap_or_else(|| "-".into()),
                    out.flags.clone(),
                    out.payload_size.to_string(),
                    out.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "uid={} ({}) function_id={} flags={} size={} payload={}",
            out.uid, out.uid_number, out.function_id, out.flags, out.payload_size, out.payload
        ),
        OutputFormat::Raw => print_raw(reply.payload.as_ref()),
    }
}

/// Print an ordered list of named values.
pub fn print_fields(fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|(key, value)| (key.to_string(), serde_json::Value::String(value.clone())))
                .collect();
            println!(
                "{}",
                serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, value) in fields {
                table.add_row(vec![key.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = fields
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            println!("{}", line.join(" "));
        }
        OutputFormat::Raw => {
            let values: Vec<&str> = fields.iter().map(|(_, value)| value.as_str()).collect();
            println!("{}", values.join(" "));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn position_label(position: Position) -> String {
    match position {
        Position::Stack(n) => format!("stack {n}"),
        Position::Port(port) => format!("port {port}"),
    }
}

fn version_label(version: [u8; 3]) -> String {
    format!("{}.{}.{}", version[0], version[1], version[2])
}

#[cfg(test)]
mod tests {
    use brickwire_connection::{DeviceInfo, EnumerationKind};

    use super::*;

    #[test]
    fn enumeration_output_formats_fields() {
        let event = EnumerationEvent {
            uid: 0x2A,
            kind: EnumerationKind::Available,
            info: Some(DeviceInfo {
                connected_uid: None,
                position: Position::Port('c'),
                hardware_version: [1, 1, 0],
                firmware_version: [2, 0, 11],
                device_identifier: 2113,
            }),
        };
        let out = EnumerationOutput::from(&event);
        assert_eq!(out.uid, base58_encode(0x2A));
        assert_eq!(out.kind, "available");
        assert_eq!(out.position.as_deref(), Some("port c"));
        assert_eq!(out.firmware_version.as_deref(), Some("2.0.11"));
        assert_eq!(out.row()[2], "-");
    }

    #[test]
    fn disconnected_event_has_no_details() {
        let event = EnumerationEvent {
            uid: 7,
            kind: EnumerationKind::Disconnected,
            info: None,
        };
        let out = EnumerationOutput::from(&event);
        assert_eq!(out.kind, "disconnected");
        assert!(out.position.is_none());
        assert!(out.row()[3..].iter().all(|cell| cell == "-"));
    }
}
