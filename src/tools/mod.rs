//! Tool catalog exposed to the planner.

mod registry;

pub use registry::{default_registry, SchemaError, ToolKind, ToolRegistry, ToolSpec};
