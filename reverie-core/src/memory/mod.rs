//! Memory records and the per-agent memory stream.

pub mod record;
pub mod stream;

pub use record::{MemoryKind, MemoryMetadata, MemoryRecord, PlanMetadata};
pub use stream::MemoryStream;
