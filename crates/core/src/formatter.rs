//! Formatter capability contract
//!
//! The host engine does not know about registries, framers or profiles; it
//! holds one [`Formatter`] per persistence usage and calls
//! `serialize`/`deserialize` on it. The codec crate's profile layer
//! implements this trait for each usage.

use std::io::{Read, Write};

use crate::error::Result;
use crate::value::Value;

/// Persistence usages the host engine configures a formatter for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatterUsage {
    /// Full-model snapshot: one graph, sole content of its stream.
    Snapshot,
    /// Append-only command journal: many entries share one stream.
    Journal,
    /// Ephemeral result cloning for isolation across a trust boundary.
    Results,
}

/// Serialize/deserialize capability the host engine calls.
///
/// # Thread Safety
///
/// Formatters must be `Send + Sync`: the host may clone results from
/// multiple worker threads through one formatter instance. All per-call
/// state (reference tables, buffers) is created inside each call.
pub trait Formatter: Send + Sync {
    /// Write one value to the stream as a single frame.
    fn serialize(&self, stream: &mut dyn Write, value: &Value) -> Result<()>;

    /// Read one value back from the stream.
    fn deserialize(&self, stream: &mut dyn Read) -> Result<Value>;
}
