//! Command execution for the txpipe binary.

use crate::{Cli, Command, TxOptions};
use alloy::primitives::{Address, TxHash, U256};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use txpipe_account::{create_key_provider, AccountError, SigningError, TransactionSigner};
use txpipe_config::{Config, ConfigError};
use txpipe_core::{Pipeline, PipelineError, TransactionParams};
use txpipe_delivery::{AlloyNodeClient, NodeClient, NodeError};
use txpipe_types::{decode_hex, PrivateKey, SecretString};

/// Errors reported by the command line tool.
#[derive(Debug, Error)]
pub enum CommandError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Account(#[from] AccountError),
	#[error(transparent)]
	Signing(#[from] SigningError),
	#[error(transparent)]
	Node(#[from] NodeError),
	#[error(transparent)]
	Pipeline(#[from] PipelineError),
	#[error("{0}")]
	Input(String),
	#[error("Failed to encode output: {0}")]
	Output(#[from] serde_json::Error),
}

impl CommandError {
	/// Stage named in the error line.
	pub fn stage(&self) -> &'static str {
		match self {
			CommandError::Config(_) => "config",
			CommandError::Account(_) => "key",
			CommandError::Signing(_) => "sign",
			CommandError::Node(_) => "node",
			CommandError::Pipeline(e) => e.stage(),
			CommandError::Input(_) => "input",
			CommandError::Output(_) => "output",
		}
	}

	/// Process exit code. A confirmation timeout gets its own code because
	/// the transaction may still be mined.
	pub fn exit_code(&self) -> u8 {
		match self {
			CommandError::Pipeline(e) if e.is_timeout() => 2,
			_ => 1,
		}
	}
}

/// Runs the parsed command to completion.
pub async fn run(cli: Cli, cancel: &CancellationToken) -> Result<(), CommandError> {
	let config = Config::from_file(&cli.config).await?;
	tracing::info!(
		endpoint = %config.node.endpoint_url,
		chain_id = config.node.chain_id,
		"Loaded configuration"
	);
	let secret = SecretString::from(cli.secret.unwrap_or_default());

	match cli.command {
		Command::Deploy { bytecode, args, tx } => {
			let mut payload = read_bytecode(&bytecode).await?;
			if let Some(args) = args {
				payload.extend(parse_hex("constructor arguments", &args)?);
			}
			let params = TransactionParams::creation(payload, config.node.chain_id);
			send_transaction(&config, &secret, params, &tx, cancel).await
		}
		Command::Send { to, data, tx } => {
			let to = Address::from_str(to.trim())
				.map_err(|e| CommandError::Input(format!("Invalid recipient '{}': {}", to, e)))?;
			let data = match data {
				Some(data) => parse_hex("data", &data)?,
				None => Vec::new(),
			};
			let params = TransactionParams::call(to, data, config.node.chain_id);
			send_transaction(&config, &secret, params, &tx, cancel).await
		}
		Command::Receipt { hash } => {
			let hash = TxHash::from_str(hash.trim())
				.map_err(|e| CommandError::Input(format!("Invalid hash '{}': {}", hash, e)))?;
			let pipeline = Pipeline::from_config(&config, connect(&config)?);

			let receipt = pipeline.confirm(hash, cancel).await?;
			println!("{}", serde_json::to_string_pretty(&receipt)?);
			if receipt.is_reverted() {
				return Err(PipelineError::Reverted(receipt).into());
			}
			Ok(())
		}
		Command::Address { account } => {
			let key = recover_key(&config, &account, &secret).await?;
			println!("{}", TransactionSigner::address_of(&key)?);
			Ok(())
		}
	}
}

/// Signs and submits one transaction, waiting for it unless `--no-wait`.
async fn send_transaction(
	config: &Config,
	secret: &SecretString,
	mut params: TransactionParams,
	opts: &TxOptions,
	cancel: &CancellationToken,
) -> Result<(), CommandError> {
	let node = connect(config)?;
	check_chain_id(node.as_ref(), config.node.chain_id).await;

	let key = recover_key(config, &opts.account, secret).await?;
	params.nonce = match &opts.nonce {
		Some(nonce) => parse_u256("nonce", nonce)?,
		None => {
			let sender = TransactionSigner::address_of(&key)?;
			let nonce = node.transaction_count(sender).await?;
			tracing::info!(sender = %sender, nonce, "Using pending nonce from node");
			U256::from(nonce)
		}
	};
	if let Some(gas_price) = &opts.gas_price {
		params.gas_price = Some(parse_u256("gas price", gas_price)?);
	}
	if let Some(gas_limit) = &opts.gas_limit {
		params.gas_limit = Some(parse_u256("gas limit", gas_limit)?);
	}
	if let Some(value) = &opts.value {
		params.value = parse_u256("value", value)?;
	}

	let pipeline = Pipeline::from_config(config, node);
	if opts.no_wait {
		let (_, submission) = pipeline.broadcast(params, key, cancel).await?;
		println!("{}", submission.transaction_hash);
	} else if params.is_creation() {
		let deployment = pipeline.deploy(params, key, cancel).await?;
		println!("{}", deployment.contract_address);
	} else {
		let execution = pipeline.execute(params, key, cancel).await?;
		println!(
			"{} mined in block {} (gas used {})",
			execution.submission.transaction_hash,
			execution.receipt.block_number,
			execution.receipt.gas_used
		);
	}
	Ok(())
}

fn connect(config: &Config) -> Result<Arc<dyn NodeClient>, CommandError> {
	let client = AlloyNodeClient::new(&config.node.endpoint_url, config.node.request_timeout())?;
	Ok(Arc::new(client))
}

/// Warns when the node serves a different chain than configured. Signing
/// still uses the configured chain id.
async fn check_chain_id(node: &dyn NodeClient, configured: u64) {
	match node.chain_id().await {
		Ok(actual) if actual != configured => {
			tracing::warn!(configured, node = actual, "Node reports a different chain id")
		}
		Ok(_) => {}
		Err(e) => tracing::debug!(error = %e, "Could not query the node's chain id"),
	}
}

async fn recover_key(
	config: &Config,
	account: &str,
	secret: &SecretString,
) -> Result<PrivateKey, CommandError> {
	let provider = create_key_provider(&config.account.primary, config.account.primary_config()?)?;
	Ok(provider.recover_private_key(account, secret).await?)
}

/// Reads init code given inline or as `@<path>`.
async fn read_bytecode(arg: &str) -> Result<Vec<u8>, CommandError> {
	match arg.strip_prefix('@') {
		Some(path) => {
			let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
				CommandError::Input(format!("Failed to read bytecode from {}: {}", path, e))
			})?;
			parse_hex("bytecode", &contents)
		}
		None => parse_hex("bytecode", arg),
	}
}

fn parse_hex(what: &str, input: &str) -> Result<Vec<u8>, CommandError> {
	decode_hex(input).map_err(|e| CommandError::Input(format!("Invalid {} hex: {}", what, e)))
}

/// Parses a decimal or `0x` hex integer of up to 256 bits. Narrower limits
/// are enforced when the transaction is built.
fn parse_u256(what: &str, input: &str) -> Result<U256, CommandError> {
	U256::from_str(input.trim())
		.map_err(|e| CommandError::Input(format!("Invalid {} '{}': {}", what, input, e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;
	use std::io::Write;
	use std::time::Duration;
	use tempfile::NamedTempFile;
	use txpipe_core::ConfirmationError;

	fn write_config(contents: &str) -> NamedTempFile {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(contents.as_bytes()).unwrap();
		file
	}

	fn local_config() -> NamedTempFile {
		write_config(
			r#"
[node]
endpoint_url = "http://127.0.0.1:1"
chain_id = 4

[account]
primary = "local"

[account.implementations.local]
keys = { deployer = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80" }
"#,
		)
	}

	fn cli(args: &[&str]) -> Cli {
		Cli::try_parse_from(std::iter::once("txpipe").chain(args.iter().copied())).unwrap()
	}

	#[tokio::test]
	async fn test_read_bytecode_inline_and_from_file() {
		assert_eq!(read_bytecode("0x6080").await.unwrap(), vec![0x60, 0x80]);

		let file = write_config("0x60806040\n");
		let arg = format!("@{}", file.path().display());
		assert_eq!(read_bytecode(&arg).await.unwrap(), vec![0x60, 0x80, 0x60, 0x40]);

		assert!(matches!(
			read_bytecode("@/no/such/file").await,
			Err(CommandError::Input(_))
		));
		assert!(matches!(read_bytecode("0xzz").await, Err(CommandError::Input(_))));
	}

	#[test]
	fn test_parse_u256_accepts_decimal_and_hex() {
		assert_eq!(parse_u256("nonce", "4").unwrap(), U256::from(4));
		assert_eq!(parse_u256("gas price", "0x4a817c800").unwrap(), U256::from(20_000_000_000u64));
		assert!(parse_u256("nonce", "-1").is_err());
	}

	#[test]
	fn test_exit_codes() {
		let timeout = CommandError::from(PipelineError::from(ConfirmationError::Timeout {
			hash: TxHash::ZERO,
			waited: Duration::from_secs(30),
		}));
		assert_eq!(timeout.exit_code(), 2);
		assert_eq!(timeout.stage(), "confirm");

		let rejected = CommandError::from(PipelineError::from(NodeError::Rejected(
			"nonce too low".into(),
		)));
		assert_eq!(rejected.exit_code(), 1);
		assert_eq!(rejected.stage(), "submit");

		assert_eq!(CommandError::Input("bad".into()).exit_code(), 1);
	}

	#[tokio::test]
	async fn test_address_command() {
		let config = local_config();
		let path = config.path().display().to_string();

		let result = run(cli(&["--config", &path, "address"]), &CancellationToken::new()).await;
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn test_unknown_account_is_key_stage() {
		let config = local_config();
		let path = config.path().display().to_string();

		let err = run(
			cli(&["--config", &path, "address", "--account", "nobody"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();
		assert_eq!(err.stage(), "key");
	}

	#[tokio::test]
	async fn test_missing_config_is_config_stage() {
		let err = run(
			cli(&["--config", "/no/such/config.toml", "address"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();
		assert_eq!(err.stage(), "config");
	}

	#[tokio::test]
	async fn test_invalid_hash_is_input_error() {
		let config = local_config();
		let path = config.path().display().to_string();

		let err = run(
			cli(&["--config", &path, "receipt", "0x1234"]),
			&CancellationToken::new(),
		)
		.await
		.unwrap_err();
		assert!(matches!(err, CommandError::Input(_)));
	}
}
