//! Node client backed by an alloy HTTP provider.
//!
//! Raw transactions are broadcast as-is; the provider never signs or fills
//! anything. Every request is bounded by the configured timeout.

use crate::{NodeClient, NodeError};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::transports::{RpcError, TransportError, TransportResult};
use async_trait::async_trait;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use txpipe_types::{truncate_id, Receipt};

/// Alloy-based node client for a single JSON-RPC endpoint.
///
/// The underlying HTTP client pools connections, so one instance can be
/// shared by any number of concurrent pipelines.
#[derive(Clone)]
pub struct AlloyNodeClient {
	provider: Arc<dyn Provider + Send + Sync>,
	request_timeout: Duration,
}

impl AlloyNodeClient {
	/// Creates a client for the HTTP endpoint at `endpoint_url`.
	pub fn new(endpoint_url: &str, request_timeout: Duration) -> Result<Self, NodeError> {
		let url: url::Url = endpoint_url.parse().map_err(|e| {
			NodeError::Transport(format!("Invalid endpoint URL '{}': {}", endpoint_url, e))
		})?;
		let provider = ProviderBuilder::new().connect_http(url);

		Ok(Self::from_provider(Arc::new(provider), request_timeout))
	}

	/// Wraps an already constructed provider.
	pub fn from_provider(
		provider: Arc<dyn Provider + Send + Sync>,
		request_timeout: Duration,
	) -> Self {
		Self {
			provider,
			request_timeout,
		}
	}

	/// Runs one request under the per-request timeout and classifies its error.
	async fn request<F, T>(&self, method: &'static str, call: F) -> Result<T, NodeError>
	where
		F: IntoFuture<Output = TransportResult<T>>,
	{
		match tokio::time::timeout(self.request_timeout, call).await {
			Ok(result) => result.map_err(|e| classify_error(method, e)),
			Err(_) => Err(NodeError::Transport(format!(
				"{} timed out after {}ms",
				method,
				self.request_timeout.as_millis()
			))),
		}
	}
}

/// A JSON-RPC error object is the node's answer; anything else means the
/// request did not get a usable answer.
fn classify_error(method: &str, error: TransportError) -> NodeError {
	match error {
		RpcError::ErrorResp(payload) => {
			NodeError::Rejected(format!("{} (code {})", payload.message, payload.code))
		}
		other => NodeError::Transport(format!("{} failed: {}", method, other)),
	}
}

/// Receipts without a block number are still pending and count as not mined.
fn to_receipt(receipt: &TransactionReceipt) -> Option<Receipt> {
	Some(Receipt {
		transaction_hash: receipt.transaction_hash,
		block_number: receipt.block_number?,
		success: receipt.status(),
		contract_address: receipt.contract_address,
		gas_used: receipt.gas_used,
	})
}

#[async_trait]
impl NodeClient for AlloyNodeClient {
	async fn submit(&self, raw: &Bytes) -> Result<TxHash, NodeError> {
		let pending = self
			.request(
				"eth_sendRawTransaction",
				self.provider.send_raw_transaction(raw),
			)
			.await?;
		let tx_hash = *pending.tx_hash();

		tracing::info!(
			tx_hash = %truncate_id(&tx_hash.to_string()),
			size = raw.len(),
			"Submitted transaction"
		);
		Ok(tx_hash)
	}

	async fn get_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, NodeError> {
		let receipt = self
			.request(
				"eth_getTransactionReceipt",
				self.provider.get_transaction_receipt(hash),
			)
			.await?;

		Ok(receipt.as_ref().and_then(to_receipt))
	}

	async fn transaction_count(&self, address: Address) -> Result<u64, NodeError> {
		self.request(
			"eth_getTransactionCount",
			self.provider.get_transaction_count(address).pending(),
		)
		.await
	}

	async fn chain_id(&self) -> Result<u64, NodeError> {
		self.request("eth_chainId", self.provider.get_chain_id()).await
	}
}
