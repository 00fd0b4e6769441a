//! Background service components.

mod resolved;

pub use resolved::{ResolvedServiceOptions, register_service as register_resolved};
