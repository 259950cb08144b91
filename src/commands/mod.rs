//! CLI command implementations

mod evaluate;
mod search;
mod tools;

pub use evaluate::{run_evaluate, EvaluateOptions};
pub use search::{run_generate, run_search, QueryOptions};
pub use tools::show_tools;
