//! Message production
//!
//! Builds the history of a conversation, asks the completion engine for the
//! next assistant turn and writes the translated answer into its placeholder.

mod completion;
mod history;
mod pipeline;
mod queue;

pub use completion::CompletionClient;
pub use pipeline::Pipeline;
pub use queue::{ProductionJob, ProductionQueue, QueueError, QueueStats};

#[cfg(test)]
pub use queue::JobOutcome;
