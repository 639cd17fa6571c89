//! Machine production engine: definitions, per-position scheduling, and
//! crash-safe persistence.

mod definition;
mod display;
mod machine;
mod manager;
mod persist;
mod registry;

pub use definition::*;
pub use display::*;
pub use machine::*;
pub use manager::*;
pub use persist::*;
pub use registry::*;
