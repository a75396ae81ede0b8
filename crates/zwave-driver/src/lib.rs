//! Z-Wave transaction manager and async driver.
//!
//! The half-duplex radio allows exactly one exchange with the controller at
//! a time. [`TransactionEngine`] enforces that: callers queue messages by
//! priority, and the engine walks each through its ACK, response, callback
//! and node report, retrying, aborting and parking as the protocol demands.
//! The engine is synchronous and clock-free so it can be tested frame by
//! frame.
//!
//! [`Driver`] runs the engine inside one tokio task over a
//! [`SerialCodec`](zwave_frame::SerialCodec)-framed link, resolves
//! [`Driver::send`] futures, keeps a value cache and broadcasts
//! [`DriverEvent`]s.
//!
//! ```no_run
//! # async fn demo() -> zwave_driver::Result<()> {
//! use zwave_driver::Driver;
//! use zwave_message::Message;
//!
//! let driver = Driver::builder().open("/dev/ttyUSB0").await?;
//! let outcome = driver.send(Message::GetControllerVersion).await?;
//! println!("{:?}", outcome.response);
//! driver.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod callback_id;
pub mod config;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod link;
pub mod node;
pub mod queue;
pub mod transaction;
pub mod values;

pub use callback_id::CallbackIdAllocator;
pub use config::DriverConfig;
pub use context::DriverContext;
pub use driver::{ControllerInfo, Driver, DriverBuilder, DriverEvent, PendingTransaction};
pub use engine::{ControllerStatus, EngineAction, TransactionEngine};
pub use error::{DriverError, Result, Stage};
pub use link::{bridge, connect, BoxedLink, LinkIo};
pub use node::{NodeRegistry, NodeState, NodeStatus, ScheduledPoll};
pub use queue::TransactionQueue;
pub use transaction::{Transaction, TransactionId, TransactionOutcome, TransactionState};
pub use values::{MemoryValueStore, ValueDb, ValueEvent, ValueStore};
