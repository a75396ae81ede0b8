use serde::Serialize;
use zwave_cc::{CommandClass, StaticContext, UnknownCc};
use zwave_frame::{decode_frame, Frame};
use zwave_message::{Message, MessageContext};

use crate::cmd::{parse_hex, DecodeArgs, Origin};
use crate::exit::{frame_error, message_error, CliError, CliResult, SUCCESS};
use crate::output::{hex_bytes, print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct DecodedFrame {
    offset: usize,
    frame: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Message>,
}

#[derive(Serialize)]
struct FramesOutput {
    schema_id: &'static str,
    frames: Vec<DecodedFrame>,
}

#[derive(Serialize)]
struct CcOutput {
    schema_id: &'static str,
    node: u8,
    command_class: CommandClass,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.bytes.join(" "))?;
    let ctx = StaticContext::new(args.own_node_id);

    if args.cc {
        let unknown = match args.origin {
            Origin::Controller => UnknownCc::Reject,
            Origin::Host => UnknownCc::KeepRaw,
        };
        let cc = CommandClass::parse_with(&bytes, args.node, &ctx, unknown)
            .map_err(|err| message_error("decode failed", err.into()))?;
        print_cc(
            &CcOutput {
                schema_id: "https://schemas.3leaps.dev/zwaveprims/cli/v1/command-class.schema.json",
                node: args.node,
                command_class: cc,
            },
            format,
        );
        return Ok(SUCCESS);
    }

    let message_ctx = match args.origin {
        Origin::Controller => MessageContext::controller(&ctx),
        Origin::Host => MessageContext::host(&ctx),
    };
    let frames = decode_all(&bytes, &message_ctx)?;
    print_frames(
        &FramesOutput {
            schema_id: "https://schemas.3leaps.dev/zwaveprims/cli/v1/decoded-frames.schema.json",
            frames,
        },
        format,
    );
    Ok(SUCCESS)
}

/// Decode back-to-back frames until the bytes run out.
fn decode_all(bytes: &[u8], ctx: &MessageContext<'_>) -> CliResult<Vec<DecodedFrame>> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (frame, used) = decode_frame(&bytes[offset..])
            .map_err(|err| frame_error(&format!("frame at offset {offset}"), err))?;
        let decoded = match frame {
            Frame::Ack => control(offset, "ack"),
            Frame::Nak => control(offset, "nak"),
            Frame::Can => control(offset, "can"),
            Frame::Data(data) => {
                let message = Message::from_frame(&data, ctx).map_err(|err| {
                    message_error(&format!("message at offset {offset}"), err)
                })?;
                DecodedFrame {
                    offset,
                    frame: "data",
                    message_type: Some(data.message_type.to_string()),
                    function_id: Some(data.function_id),
                    payload: Some(hex_bytes(&data.payload)),
                    message: Some(message),
                }
            }
        };
        frames.push(decoded);
        offset += used;
    }
    if frames.is_empty() {
        return Err(CliError::usage("no bytes given"));
    }
    Ok(frames)
}

fn control(offset: usize, frame: &'static str) -> DecodedFrame {
    DecodedFrame {
        offset,
        frame,
        message_type: None,
        function_id: None,
        payload: None,
        message: None,
    }
}

fn print_frames(out: &FramesOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            for frame in &out.frames {
                let mut rows = vec![("frame", frame.frame.to_string())];
                if let (Some(message_type), Some(function_id)) =
                    (&frame.message_type, frame.function_id)
                {
                    rows.push(("type", message_type.clone()));
                    rows.push(("function", format!("0x{function_id:02x}")));
                }
                if let Some(payload) = &frame.payload {
                    rows.push(("payload", payload.clone()));
                }
                if let Some(message) = &frame.message {
                    rows.push(("message", message.to_string()));
                }
                print_fields(&format!("OFFSET {}", frame.offset), &rows);
            }
        }
        OutputFormat::Pretty => {
            for frame in &out.frames {
                match &frame.message {
                    Some(message) => println!("@{:<4} {message}", frame.offset),
                    None => println!("@{:<4} {}", frame.offset, frame.frame.to_uppercase()),
                }
            }
        }
    }
}

fn print_cc(out: &CcOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_fields(
            "COMMAND CLASS",
            &[
                ("node", out.node.to_string()),
                ("cc", format!("0x{:02x}", out.command_class.cc_id())),
                ("command", out.command_class.to_string()),
            ],
        ),
        OutputFormat::Pretty => println!("node {} {}", out.node, out.command_class),
    }
}
