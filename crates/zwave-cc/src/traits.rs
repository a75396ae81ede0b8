//! Small capability traits shared by CC families.
//!
//! A family that needs two capabilities implements two traits; there is no
//! common base type beyond [`CommandClass`](crate::CommandClass).

use crate::command_class::CommandClass;
use crate::error::Result;
use crate::values::ValueEntry;

/// Mutable view of what an encapsulating CC wraps.
#[derive(Debug)]
pub enum Encapsulated<'a, C> {
    None,
    One(&'a mut C),
    Many(&'a mut Vec<C>),
}

/// A CC that can wrap other CCs.
pub trait Encapsulating {
    /// Wrapped CCs, outermost first. Empty for non-encapsulating commands.
    fn encapsulated(&self) -> Vec<&CommandClass>;

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, CommandClass>;

    /// Bytes this layer adds beyond the two-byte CC header.
    fn extra_overhead(&self) -> usize;
}

/// A report that may be split across several messages.
pub trait PartialReport: Sized {
    fn expect_more_messages(&self) -> bool {
        false
    }

    /// Fold earlier parts, oldest first, into this final part.
    fn merge_partial(&mut self, prior: Vec<Self>) -> Result<()>;
}

/// A command that can be split into a partial-report sequence.
pub trait Fragmentable: Sized {
    /// Split so that every fragment's payload fits in `max_payload` bytes
    /// after the CC header.
    fn fragment(&self, max_payload: usize) -> Result<Vec<Self>>;
}

/// A report whose fields become node values.
pub trait ValueReport {
    fn values(&self) -> Vec<ValueEntry>;
}
