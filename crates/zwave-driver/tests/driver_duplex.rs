//! The async driver against a scripted controller on an in-memory link.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;
use zwave_cc::cc::basic::BasicCommand;
use zwave_cc::{CommandClass, StaticContext, ValueEntry};
use zwave_driver::{Driver, DriverConfig, DriverError, DriverEvent, NodeStatus, Stage};
use zwave_frame::{Frame, ReadEvent, SerialCodec};
use zwave_message::{
    ApplicationCommandRequest, ControllerVersion, Message, MessageContext, MessageKind,
};

struct Controller {
    framed: Framed<DuplexStream, SerialCodec>,
    ctx: StaticContext,
}

impl Controller {
    fn new(io: DuplexStream) -> Self {
        Self {
            framed: Framed::new(io, SerialCodec::new()),
            ctx: StaticContext::new(1),
        }
    }

    async fn next_frame(&mut self) -> Frame {
        loop {
            match self.framed.next().await {
                Some(Ok(ReadEvent::Frame(frame))) => return frame,
                Some(Ok(other)) => panic!("driver wrote garbage: {other:?}"),
                Some(Err(err)) => panic!("link error: {err}"),
                None => panic!("driver closed the link"),
            }
        }
    }

    /// Read the next host message and acknowledge it.
    async fn next_message(&mut self) -> Message {
        let frame = self.next_frame().await;
        let Frame::Data(data) = frame else {
            panic!("expected a data frame, got {frame}");
        };
        let message = Message::from_frame(&data, &MessageContext::host(&self.ctx)).unwrap();
        self.framed.send(Frame::Ack).await.unwrap();
        message
    }

    /// Write a message and wait for the driver's ACK.
    async fn reply(&mut self, message: Message) {
        let frame = message.to_frame(&self.ctx).unwrap();
        self.framed.send(frame).await.unwrap();
        assert_eq!(self.next_frame().await, Frame::Ack);
    }
}

fn start(config: DriverConfig) -> (Driver, Controller) {
    let (ours, theirs) = tokio::io::duplex(1024);
    let driver = Driver::builder().config(config).spawn(ours);
    (driver, Controller::new(theirs))
}

#[tokio::test]
async fn controller_query_roundtrip() {
    let (driver, mut controller) = start(DriverConfig::default());
    assert_eq!(controller.next_frame().await, Frame::Nak);

    let send = tokio::spawn({
        let driver = driver.clone();
        async move { driver.send(Message::GetControllerVersion).await }
    });

    let request = controller.next_message().await;
    assert_eq!(request.kind(), MessageKind::GetControllerVersion);
    let version = ControllerVersion {
        version: "Z-Wave 7.18".into(),
        library_type: 1,
    };
    controller
        .reply(Message::GetControllerVersionResponse(version.clone()))
        .await;

    let outcome = send.await.unwrap().unwrap();
    assert_eq!(
        outcome.response,
        Some(Message::GetControllerVersionResponse(version))
    );
    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn unsolicited_report_updates_values() {
    let (driver, mut controller) = start(DriverConfig::default());
    let mut events = driver.subscribe();
    assert_eq!(controller.next_frame().await, Frame::Nak);

    let report = CommandClass::new(
        9u8,
        BasicCommand::Report {
            current_value: 37,
            target_value: None,
            duration: None,
        },
    );
    controller
        .reply(Message::ApplicationCommand(ApplicationCommandRequest::new(
            report,
        )))
        .await;

    let mut saw_alive = false;
    let mut saw_value = false;
    loop {
        match events.recv().await.unwrap() {
            DriverEvent::NodeStatus { node: 9, status } => {
                saw_alive = status == NodeStatus::Alive;
            }
            DriverEvent::Value(event) => {
                saw_value |= event.id().property == "currentValue";
            }
            DriverEvent::Message(message) => {
                assert_eq!(message.kind(), MessageKind::ApplicationCommand);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(saw_alive);
    assert!(saw_value);

    let id = ValueEntry::new("currentValue", 0).id(9, 0, 0x20);
    assert_eq!(driver.value(&id), Some(json!(37)));
    assert_eq!(driver.node_values(9).len(), 1);
    driver.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_response_times_out() {
    let (driver, mut controller) = start(DriverConfig::default());
    assert_eq!(controller.next_frame().await, Frame::Nak);

    let send = tokio::spawn({
        let driver = driver.clone();
        async move { driver.send(Message::GetControllerId).await }
    });
    assert_eq!(
        controller.next_message().await.kind(),
        MessageKind::GetControllerId
    );

    let result = send.await.unwrap();
    assert!(matches!(
        result,
        Err(DriverError::MessageTimeout(Stage::Response))
    ));
    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_fails_pending_sends() {
    let (driver, mut controller) = start(DriverConfig {
        ack_timeout: Duration::from_secs(60),
        ..DriverConfig::default()
    });
    assert_eq!(controller.next_frame().await, Frame::Nak);

    let pending = driver
        .submit(Message::GetSerialApiInitData, None)
        .await
        .unwrap();
    assert!(matches!(controller.next_frame().await, Frame::Data(_)));

    driver.shutdown().await.unwrap();
    assert!(matches!(pending.wait().await, Err(DriverError::Shutdown)));
    assert!(matches!(
        driver.send(Message::GetControllerId).await,
        Err(DriverError::Shutdown)
    ));
}
