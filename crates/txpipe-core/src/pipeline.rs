//! Build, sign, submit and confirm, in that order.
//!
//! Each run handles exactly one transaction. A failure is reported with the
//! stage that produced it and nothing is rolled back: once a transaction has
//! been broadcast it may still be mined even if this run gives up on it, and
//! [`Pipeline::confirm`] can pick the hash up again later.

use crate::builder::{BuildError, TransactionBuilder, TransactionParams};
use crate::monitoring::{ConfirmationError, ConfirmationPoller};
use crate::retry::RetryPolicy;
use alloy::primitives::{Address, TxHash};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use txpipe_account::{SigningError, TransactionSigner};
use txpipe_config::{Config, ConfirmationConfig};
use txpipe_delivery::{NodeClient, NodeError};
use txpipe_types::{truncate_id, PrivateKey, Receipt, SignedTransaction, SubmissionResult};

/// Errors that can occur while running a transaction through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
	#[error(transparent)]
	Build(#[from] BuildError),
	#[error(transparent)]
	Sign(#[from] SigningError),
	#[error(transparent)]
	Submit(#[from] NodeError),
	#[error(transparent)]
	Confirm(#[from] ConfirmationError),
	/// The transaction was mined but its execution failed.
	#[error("Transaction {} reverted in block {}", .0.transaction_hash, .0.block_number)]
	Reverted(Receipt),
	/// A creation transaction succeeded but the receipt names no contract.
	#[error("Transaction {} succeeded without creating a contract", .0.transaction_hash)]
	MissingContractAddress(Receipt),
}

impl PipelineError {
	/// Name of the stage that failed.
	pub fn stage(&self) -> &'static str {
		match self {
			PipelineError::Build(_) => "build",
			PipelineError::Sign(_) => "sign",
			PipelineError::Submit(_) => "submit",
			PipelineError::Confirm(_) => "confirm",
			PipelineError::Reverted(_) | PipelineError::MissingContractAddress(_) => "execution",
		}
	}

	/// True when the outcome of a broadcast transaction is unknown because
	/// the confirmation budget ran out.
	pub fn is_timeout(&self) -> bool {
		matches!(self, PipelineError::Confirm(ConfirmationError::Timeout { .. }))
	}
}

/// Timing and retry settings of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
	pub poll_interval: Duration,
	pub max_wait: Duration,
	/// Retry policy for broadcasting. Retries resend the identical bytes.
	pub submit_retry: RetryPolicy,
}

impl PipelineSettings {
	pub fn from_config(config: &Config) -> Self {
		Self {
			poll_interval: config.confirmation.poll_interval(),
			max_wait: config.confirmation.max_wait(),
			submit_retry: RetryPolicy::from(&config.retry),
		}
	}
}

impl Default for PipelineSettings {
	fn default() -> Self {
		let confirmation = ConfirmationConfig::default();
		Self {
			poll_interval: confirmation.poll_interval(),
			max_wait: confirmation.max_wait(),
			submit_retry: RetryPolicy::default(),
		}
	}
}

/// A successfully deployed contract.
#[derive(Debug, Clone)]
pub struct Deployment {
	pub contract_address: Address,
	pub transaction: SignedTransaction,
	pub submission: SubmissionResult,
	pub receipt: Receipt,
}

/// A successfully executed transaction.
#[derive(Debug, Clone)]
pub struct Execution {
	pub transaction: SignedTransaction,
	pub submission: SubmissionResult,
	pub receipt: Receipt,
}

/// Runs transactions through build, sign, submit and confirm.
///
/// A pipeline keeps no per-transaction state and can be shared between
/// concurrent runs. Nonce ordering across runs is up to the caller.
pub struct Pipeline {
	builder: TransactionBuilder,
	node: Arc<dyn NodeClient>,
	poller: ConfirmationPoller,
	settings: PipelineSettings,
}

impl Pipeline {
	pub fn new(
		builder: TransactionBuilder,
		node: Arc<dyn NodeClient>,
		poller: ConfirmationPoller,
		settings: PipelineSettings,
	) -> Self {
		Self {
			builder,
			node,
			poller,
			settings,
		}
	}

	/// Creates a pipeline from configuration around `node`.
	pub fn from_config(config: &Config, node: Arc<dyn NodeClient>) -> Self {
		let settings = PipelineSettings::from_config(config);
		let poller = ConfirmationPoller::new(node.clone(), settings.submit_retry);
		Self::new(
			TransactionBuilder::from_config(&config.transaction),
			node,
			poller,
			settings,
		)
	}

	/// Deploys a contract and returns its address once mined.
	#[instrument(skip_all, fields(nonce = %params.nonce, chain_id = %params.chain_id))]
	pub async fn deploy(
		&self,
		params: TransactionParams,
		key: PrivateKey,
		cancel: &CancellationToken,
	) -> Result<Deployment, PipelineError> {
		if !params.is_creation() {
			return Err(BuildError::InvalidParameter {
				field: "to",
				reason: "a deployment must not have a recipient".to_string(),
			}
			.into());
		}

		let Execution {
			transaction,
			submission,
			receipt,
		} = self.execute(params, key, cancel).await?;

		match receipt.contract_address {
			Some(contract_address) => {
				tracing::info!(contract = %contract_address, "Contract deployed");
				Ok(Deployment {
					contract_address,
					transaction,
					submission,
					receipt,
				})
			}
			None => Err(PipelineError::MissingContractAddress(receipt)),
		}
	}

	/// Sends a transaction and waits until it is mined successfully.
	#[instrument(skip_all, fields(nonce = %params.nonce, chain_id = %params.chain_id))]
	pub async fn execute(
		&self,
		params: TransactionParams,
		key: PrivateKey,
		cancel: &CancellationToken,
	) -> Result<Execution, PipelineError> {
		let (transaction, submission) = self.broadcast(params, key, cancel).await?;
		let receipt = self.confirm(submission.transaction_hash, cancel).await?;

		if receipt.is_reverted() {
			return Err(PipelineError::Reverted(receipt));
		}

		Ok(Execution {
			transaction,
			submission,
			receipt,
		})
	}

	/// Builds, signs and submits a transaction without waiting for it.
	pub async fn broadcast(
		&self,
		params: TransactionParams,
		key: PrivateKey,
		cancel: &CancellationToken,
	) -> Result<(SignedTransaction, SubmissionResult), PipelineError> {
		let unsigned = self.builder.build(params)?;
		let signed = TransactionSigner::sign(unsigned, &key)?;
		drop(key);

		let submission = self.submit(&signed, cancel).await?;
		Ok((signed, submission))
	}

	/// Waits for an already submitted transaction to be mined.
	///
	/// Returns the receipt whether or not execution succeeded.
	pub async fn confirm(
		&self,
		hash: TxHash,
		cancel: &CancellationToken,
	) -> Result<Receipt, PipelineError> {
		let receipt = self
			.poller
			.wait_for_receipt(
				hash,
				self.settings.poll_interval,
				self.settings.max_wait,
				cancel,
			)
			.await?;
		Ok(receipt)
	}

	/// Broadcasts `signed`, resending the same bytes after transport errors.
	///
	/// Resending is safe because the node identifies the transaction by the
	/// hash of those bytes. An earlier attempt may have reached the node even
	/// though its answer was lost, so a rejection of a resend is not final:
	/// the transaction is then tracked by its own hash and confirmation
	/// decides the outcome.
	async fn submit(
		&self,
		signed: &SignedTransaction,
		cancel: &CancellationToken,
	) -> Result<SubmissionResult, PipelineError> {
		let policy = self.settings.submit_retry;
		let mut backoff = policy.backoff();
		let mut attempts = 0u32;

		loop {
			attempts += 1;
			match self.node.submit(signed.raw()).await {
				Ok(transaction_hash) => {
					if transaction_hash != signed.hash() {
						tracing::warn!(
							expected = %signed.hash(),
							reported = %transaction_hash,
							"Node reported an unexpected transaction hash"
						);
					}
					return Ok(SubmissionResult {
						transaction_hash,
						submitted_at: Utc::now(),
						attempts,
					});
				}
				Err(e) if e.is_retryable() && attempts <= policy.max_retries => {
					let delay = policy.next_delay(&mut backoff);
					tracing::warn!(
						tx_hash = %truncate_id(&signed.hash().to_string()),
						attempt = attempts,
						delay_ms = delay.as_millis() as u64,
						error = %e,
						"Submission failed, resending"
					);
					tokio::select! {
						biased;
						_ = cancel.cancelled() => return Err(e.into()),
						_ = tokio::time::sleep(delay) => {}
					}
				}
				Err(NodeError::Rejected(reason)) if attempts > 1 => {
					tracing::warn!(
						tx_hash = %truncate_id(&signed.hash().to_string()),
						attempt = attempts,
						reason = %reason,
						"Resend rejected, an earlier attempt may have been accepted"
					);
					return Ok(SubmissionResult {
						transaction_hash: signed.hash(),
						submitted_at: Utc::now(),
						attempts,
					});
				}
				Err(e) => return Err(e.into()),
			}
		}
	}
}
