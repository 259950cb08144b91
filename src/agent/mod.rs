//! Agentic search loop
//!
//! A [`SearchAgent`] repeatedly asks a [`DecisionPolicy`] for the next
//! `(strategy, query)` pair, runs it through the strategy registry, merges
//! the result into a run-scoped candidate pool and finally reranks the pool.

mod history;
mod llm_policy;
mod orchestrator;
mod policy;

pub use history::{HistoryEntry, RunHistory};
pub use llm_policy::LlmPolicy;
pub use orchestrator::{RunState, SearchAgent, SearchOutcome, StopReason};
pub use policy::{Decision, DecisionContext, DecisionPolicy, HeuristicPolicy};
