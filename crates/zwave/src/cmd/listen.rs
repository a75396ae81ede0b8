use std::sync::Arc;

use tokio::sync::{broadcast, Notify};
use tracing::{debug, warn};
use zwave_driver::DriverEvent;

use crate::cmd::{with_driver, ListenArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let stop = Arc::new(Notify::new());
    install_ctrlc_handler(Arc::clone(&stop))?;

    let limit = args.port.limit(None)?;
    with_driver(&args.port, args.devices.as_ref(), limit, |driver| async move {
        let mut events = driver.subscribe();
        let mut printed = 0usize;
        loop {
            let event = tokio::select! {
                () = stop.notified() => {
                    debug!("interrupted");
                    return Ok(SUCCESS);
                }
                event = events.recv() => event,
            };
            let event = match event {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "output too slow, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(SUCCESS),
            };
            if !wanted(&event, &args.nodes, args.status) {
                continue;
            }

            print_event(&event, format);
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
    })
}

/// Values and application commands always; status changes on request.
fn wanted(event: &DriverEvent, nodes: &Option<Vec<u8>>, status: bool) -> bool {
    let node = match event {
        DriverEvent::Value(value) => Some(value.id().node_id),
        DriverEvent::Message(message) => message.node_id(),
        DriverEvent::NodeStatus { node, .. } if status => Some(*node),
        DriverEvent::ControllerStatus(_) | DriverEvent::Fault { .. } => return status,
        DriverEvent::NodeStatus { .. } => return false,
    };
    match (nodes, node) {
        (None, _) => true,
        (Some(nodes), Some(node)) => nodes.contains(&node),
        (Some(_), None) => false,
    }
}

fn install_ctrlc_handler(stop: Arc<Notify>) -> CliResult<()> {
    ctrlc::set_handler(move || stop.notify_one()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use zwave_driver::{ControllerStatus, NodeStatus};
    use zwave_frame::ErrorCode;

    use super::*;

    #[test]
    fn status_events_need_the_flag() {
        let event = DriverEvent::NodeStatus {
            node: 4,
            status: NodeStatus::Asleep,
        };
        assert!(!wanted(&event, &None, false));
        assert!(wanted(&event, &None, true));
        assert!(!wanted(&event, &Some(vec![5]), true));
        assert!(!wanted(
            &DriverEvent::ControllerStatus(ControllerStatus::Jammed),
            &None,
            false
        ));
        assert!(wanted(
            &DriverEvent::Fault {
                code: ErrorCode::PacketFormatInvalidPayload,
                message: "bad".into(),
            },
            &Some(vec![1]),
            true
        ));
    }
}
