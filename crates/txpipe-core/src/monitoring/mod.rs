//! Waiting for submitted transactions to be mined.
//!
//! This module provides the confirmation poller, which repeatedly asks the
//! node for a transaction's receipt within a time budget, retrying transport
//! failures and honoring cancellation.

pub mod confirmation;

pub use confirmation::{ConfirmationError, ConfirmationPoller};
