//! Receipt polling for a single submitted transaction.
//!
//! A poll is `Pending` until exactly one of the following happens: the node
//! returns a receipt (`Mined`), the time budget runs out (`TimedOut`), the
//! node fails in a way retrying will not fix (`Errored`), or the caller
//! cancels (`Cancelled`). A reverted receipt is still `Mined`; judging the
//! execution outcome is left to the caller.

use crate::retry::RetryPolicy;
use alloy::primitives::TxHash;
use backoff::backoff::Backoff;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use txpipe_delivery::{NodeClient, NodeError};
use txpipe_types::{truncate_id, Receipt};

/// Errors that end a confirmation poll without a receipt.
#[derive(Debug, Error)]
pub enum ConfirmationError {
	/// The budget ran out. The transaction may still be mined later.
	#[error("No receipt for {hash} after {}ms, outcome unknown", .waited.as_millis())]
	Timeout { hash: TxHash, waited: Duration },
	#[error("Cancelled while waiting for {hash}")]
	Cancelled { hash: TxHash },
	#[error("Node error while waiting for {hash}: {source}")]
	Node {
		hash: TxHash,
		#[source]
		source: NodeError,
	},
}

/// Terminal states of a poll.
enum PollOutcome {
	Mined(Receipt),
	TimedOut,
	Errored(NodeError),
	Cancelled,
}

/// Polls a node for receipts.
pub struct ConfirmationPoller {
	node: Arc<dyn NodeClient>,
	retry: RetryPolicy,
}

impl ConfirmationPoller {
	pub fn new(node: Arc<dyn NodeClient>, retry: RetryPolicy) -> Self {
		Self { node, retry }
	}

	/// Waits until `hash` is mined, querying every `poll_interval` for at
	/// most `max_wait`.
	///
	/// The budget is checked before every query, so a zero `max_wait` returns
	/// [`ConfirmationError::Timeout`] without contacting the node. Neither a
	/// sleep nor an unanswered query extends past the budget.
	#[instrument(skip_all, fields(tx_hash = %truncate_id(&hash.to_string())))]
	pub async fn wait_for_receipt(
		&self,
		hash: TxHash,
		poll_interval: Duration,
		max_wait: Duration,
		cancel: &CancellationToken,
	) -> Result<Receipt, ConfirmationError> {
		let started = Instant::now();
		let mut backoff = self.retry.backoff();
		let mut transport_failures = 0u32;
		let mut polls = 0u32;

		let outcome = loop {
			if cancel.is_cancelled() {
				break PollOutcome::Cancelled;
			}
			let elapsed = started.elapsed();
			if elapsed >= max_wait {
				break PollOutcome::TimedOut;
			}
			let remaining = max_wait - elapsed;

			polls += 1;
			let response = tokio::select! {
				biased;
				_ = cancel.cancelled() => break PollOutcome::Cancelled,
				response = self.node.get_receipt(hash) => response,
				_ = tokio::time::sleep(remaining) => break PollOutcome::TimedOut,
			};

			let delay = match response {
				Ok(Some(receipt)) => break PollOutcome::Mined(receipt),
				Ok(None) => {
					transport_failures = 0;
					backoff.reset();
					tracing::debug!(
						polls,
						elapsed_ms = elapsed.as_millis() as u64,
						"Transaction not yet mined"
					);
					poll_interval
				}
				Err(e) if e.is_retryable() && transport_failures < self.retry.max_retries => {
					transport_failures += 1;
					let delay = self.retry.next_delay(&mut backoff);
					tracing::debug!(
						attempt = transport_failures,
						delay_ms = delay.as_millis() as u64,
						error = %e,
						"Receipt query failed, retrying"
					);
					delay
				}
				Err(e) => break PollOutcome::Errored(e),
			};

			tokio::select! {
				biased;
				_ = cancel.cancelled() => break PollOutcome::Cancelled,
				_ = tokio::time::sleep(delay.min(remaining)) => {}
			}
		};

		match outcome {
			PollOutcome::Mined(receipt) => {
				tracing::info!(
					block = receipt.block_number,
					success = receipt.success,
					polls,
					"Transaction mined"
				);
				Ok(receipt)
			}
			PollOutcome::TimedOut => Err(ConfirmationError::Timeout {
				hash,
				waited: started.elapsed(),
			}),
			PollOutcome::Errored(source) => Err(ConfirmationError::Node { hash, source }),
			PollOutcome::Cancelled => Err(ConfirmationError::Cancelled { hash }),
		}
	}
}
