use serde::Serialize;
use zwave_driver::ControllerInfo;

use crate::cmd::{with_driver, InfoArgs, DEFAULT_LIMIT};
use crate::exit::{driver_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput<'a> {
    schema_id: &'static str,
    port: &'a str,
    #[serde(flatten)]
    info: &'a ControllerInfo,
    is_secondary: bool,
    is_slave_api: bool,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let limit = args.port.limit(Some(DEFAULT_LIMIT))?;
    let info = with_driver(&args.port, None, limit, |driver| async move {
        driver
            .controller_info()
            .await
            .map_err(|err| driver_error("controller query failed", err))
    })?;

    let out = InfoOutput {
        schema_id: "https://schemas.3leaps.dev/zwaveprims/cli/v1/controller-info.schema.json",
        port: &args.port.port,
        info: &info,
        is_secondary: info.init_data.is_secondary(),
        is_slave_api: info.init_data.is_slave_api(),
    };
    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let info = out.info;
            let nodes = info
                .init_data
                .node_ids
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            print_fields(
                "CONTROLLER",
                &[
                    ("port", out.port.to_string()),
                    ("library", info.version.version.clone()),
                    ("library type", info.version.library_type.to_string()),
                    ("home id", format!("{:08x}", info.id.home_id)),
                    ("node id", info.id.own_node_id.to_string()),
                    ("api version", info.init_data.api_version.to_string()),
                    ("role", role(out).to_string()),
                    ("nodes", nodes),
                ],
            );
        }
        OutputFormat::Pretty => {
            let info = out.info;
            println!("Controller on {}:", out.port);
            println!("  Library:  {}", info.version.version);
            println!("  Home ID:  {:08x}", info.id.home_id);
            println!("  Node ID:  {}", info.id.own_node_id);
            println!("  Role:     {}", role(out));
            println!("  Nodes:    {}", info.init_data.node_ids.len());
        }
    }
}

fn role(out: &InfoOutput<'_>) -> &'static str {
    match (out.is_slave_api, out.is_secondary) {
        (true, _) => "end device",
        (false, false) => "primary controller",
        (false, true) => "secondary controller",
    }
}
