//! Agent module orchestrating the think-act-observe loop.

mod task_agent;

pub use task_agent::{TaskAgent, TaskOutcome, TaskRequest};
