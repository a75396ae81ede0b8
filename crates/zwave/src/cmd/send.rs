use serde::Serialize;
use zwave_cc::{CommandClass, StaticContext, UnknownCc};
use zwave_driver::TransactionOutcome;
use zwave_message::{Message, SendDataRequest};

use crate::cmd::{parse_hex, with_driver, SendArgs, DEFAULT_LIMIT};
use crate::exit::{driver_error, message_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct SendOutput<'a> {
    schema_id: &'static str,
    node: u8,
    command_class: &'a CommandClass,
    #[serde(flatten)]
    outcome: &'a TransactionOutcome,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let cc = build_command(&args)?;
    let request: Message = SendDataRequest::new(cc.clone())
        .with_max_send_attempts(args.attempts)
        .into();

    let limit = args.port.limit(Some(DEFAULT_LIMIT))?;
    let outcome = with_driver(&args.port, None, limit, |driver| async move {
        driver
            .send(request)
            .await
            .map_err(|err| driver_error("send failed", err))
    })?;

    print_outcome(
        &SendOutput {
            schema_id: "https://schemas.3leaps.dev/zwaveprims/cli/v1/send-result.schema.json",
            node: args.node,
            command_class: &cc,
            outcome: &outcome,
        },
        format,
    );
    Ok(SUCCESS)
}

/// Typed where the command class is known, raw bytes otherwise.
fn build_command(args: &SendArgs) -> CliResult<CommandClass> {
    let bytes = parse_hex(&args.cc)?;
    let ctx = StaticContext::new(1);
    CommandClass::parse_with(&bytes, args.node, &ctx, UnknownCc::KeepRaw)
        .map_err(|err| message_error("invalid command class", err.into()))
}

fn print_outcome(out: &SendOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut rows = vec![
                ("node", out.node.to_string()),
                ("sent", out.command_class.to_string()),
            ];
            if let Some(status) = out.outcome.callback.as_ref().and_then(Message::transmit_status) {
                rows.push(("transmit", status.to_string()));
            }
            if let Some(report) = &out.outcome.node_update {
                rows.push(("report", report.to_string()));
            }
            print_fields("SEND", &rows);
        }
        OutputFormat::Pretty => {
            println!("sent {} to node {}", out.command_class, out.node);
            if let Some(report) = &out.outcome.node_update {
                println!("  report: {report}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use zwave_cc::cc::basic::BasicCommand;
    use zwave_cc::{Command, Destination};

    use super::*;
    use crate::cmd::PortArgs;

    fn args(cc: &str) -> SendArgs {
        SendArgs {
            port: PortArgs {
                port: "tcp://127.0.0.1:1".into(),
                baud_rate: 115_200,
                timeout: None,
            },
            node: 6,
            cc: cc.into(),
            attempts: 3,
        }
    }

    #[test]
    fn known_command_is_typed() {
        let cc = build_command(&args("20 01 ff")).unwrap();
        assert_eq!(cc.node, Destination::Singlecast(6));
        assert_eq!(
            cc.command,
            Command::Basic(BasicCommand::Set { target_value: 0xFF })
        );
    }

    #[test]
    fn unknown_command_stays_raw() {
        let cc = build_command(&args("5e 01")).unwrap();
        assert!(matches!(cc.command, Command::Raw(_)));
    }

    #[test]
    fn malformed_hex_is_usage() {
        assert_eq!(
            build_command(&args("2")).unwrap_err().code,
            crate::exit::USAGE
        );
    }
}
