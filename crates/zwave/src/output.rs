use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use zwave_driver::{DriverEvent, ValueEvent};
use zwave_message::Message;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// One JSON document per line.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// A two-column table of field names and values.
pub fn print_fields(header: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![header, ""]);
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value.clone()]);
    }
    println!("{table}");
}

#[derive(Serialize)]
struct EventOutput<'a> {
    schema_id: &'a str,
    timestamp: String,
    #[serde(flatten)]
    event: &'a DriverEvent,
}

pub fn print_event(event: &DriverEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput {
            schema_id: "https://schemas.3leaps.dev/zwaveprims/cli/v1/driver-event.schema.json",
            timestamp: now_unix_seconds(),
            event,
        }),
        OutputFormat::Table => {
            let (kind, node, detail) = event_columns(event);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "NODE", "DETAIL"])
                .add_row(vec![kind.to_string(), node, detail]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let (kind, node, detail) = event_columns(event);
            println!("{kind:<16} node={node:<4} {detail}");
        }
    }
}

fn event_columns(event: &DriverEvent) -> (&'static str, String, String) {
    match event {
        DriverEvent::Value(value) => {
            let id = value.id();
            let detail = match value {
                ValueEvent::Added { value, .. } => format!("{} = {value}", id.property),
                ValueEvent::Updated {
                    previous, value, ..
                } => format!("{} = {value} (was {previous})", id.property),
                ValueEvent::Removed { .. } => format!("{} removed", id.property),
                ValueEvent::MetadataUpdated { metadata, .. } => {
                    format!("{} metadata {}", id.property, metadata.label)
                }
            };
            (
                "value",
                id.node_id.to_string(),
                format!("cc=0x{:02x} ep={} {detail}", id.cc_id, id.endpoint),
            )
        }
        DriverEvent::Message(message) => ("message", node_label(message), message.to_string()),
        DriverEvent::NodeStatus { node, status } => {
            ("node-status", node.to_string(), status.to_string())
        }
        DriverEvent::ControllerStatus(status) => {
            ("controller-status", "-".to_string(), status.to_string())
        }
        DriverEvent::Fault { code, message } => {
            ("fault", "-".to_string(), format!("{code}: {message}"))
        }
    }
}

fn node_label(message: &Message) -> String {
    message
        .node_id()
        .map_or_else(|| "-".to_string(), |node| node.to_string())
}

/// Space separated upper-case hex, the way serial sniffers print frames.
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use zwave_driver::NodeStatus;

    use super::*;

    #[test]
    fn hex_bytes_spacing() {
        assert_eq!(hex_bytes(&[0x01, 0x03, 0x00, 0x15, 0xE9]), "01 03 00 15 E9");
        assert_eq!(hex_bytes(&[]), "");
    }

    #[test]
    fn node_status_columns() {
        let (kind, node, detail) = event_columns(&DriverEvent::NodeStatus {
            node: 12,
            status: NodeStatus::Dead,
        });
        assert_eq!(kind, "node-status");
        assert_eq!(node, "12");
        assert_eq!(detail, NodeStatus::Dead.to_string());
    }
}
