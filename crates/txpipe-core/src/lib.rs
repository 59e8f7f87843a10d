//! Core pipeline module for txpipe.
//!
//! This module wires the stages of a transaction's life together: building
//! a validated unsigned transaction, signing it, broadcasting it to a node,
//! and polling the node until the transaction is mined. The [`Pipeline`]
//! runs these stages in order and reports failures tagged with the stage
//! that produced them.

pub mod builder;
pub mod monitoring;
pub mod pipeline;
pub mod retry;

pub use builder::{BuildError, TransactionBuilder, TransactionParams};
pub use monitoring::{ConfirmationError, ConfirmationPoller};
pub use pipeline::{Deployment, Execution, Pipeline, PipelineError, PipelineSettings};
pub use retry::RetryPolicy;
