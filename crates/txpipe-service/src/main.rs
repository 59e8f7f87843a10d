//! Main entry point for the txpipe command line tool.
//!
//! This binary deploys contracts and sends transactions through the txpipe
//! pipeline: it loads configuration, recovers the sender's key from the
//! configured key provider, and drives build, sign, submit and confirm for
//! a single transaction per invocation.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

mod commands;

/// Command-line arguments for txpipe.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	/// Path to configuration file
	#[arg(short, long, global = true, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, global = true, default_value = "info")]
	log_level: String,

	/// Secret unlocking the account key, if the key provider needs one
	#[arg(long, global = true, env = "TXPIPE_KEY_SECRET", hide_env_values = true)]
	secret: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Deploy a contract and print its address
	Deploy {
		/// Init code as hex, or @<path> to read hex from a file
		#[arg(long)]
		bytecode: String,

		/// ABI-encoded constructor arguments as hex, appended to the init code
		#[arg(long)]
		args: Option<String>,

		#[command(flatten)]
		tx: TxOptions,
	},
	/// Send a transaction to an address and wait for it to be mined
	Send {
		/// Recipient address
		#[arg(long)]
		to: String,

		/// Call data as hex
		#[arg(long)]
		data: Option<String>,

		#[command(flatten)]
		tx: TxOptions,
	},
	/// Wait for the receipt of an already submitted transaction
	Receipt {
		/// Transaction hash
		hash: String,
	},
	/// Print the address of an account
	Address {
		#[arg(long, default_value = "deployer")]
		account: String,
	},
}

/// Options shared by the commands that sign a transaction.
#[derive(Args, Debug)]
struct TxOptions {
	/// Account whose key signs the transaction
	#[arg(long, default_value = "deployer")]
	account: String,

	/// Nonce; looked up from the node's pending count when omitted
	#[arg(long)]
	nonce: Option<String>,

	/// Gas price in wei; defaults to the configured value
	#[arg(long)]
	gas_price: Option<String>,

	/// Gas limit; defaults to the configured value
	#[arg(long)]
	gas_limit: Option<String>,

	/// Value to transfer in wei
	#[arg(long)]
	value: Option<String>,

	/// Print the transaction hash right after submission instead of waiting
	#[arg(long)]
	no_wait: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let cancel = CancellationToken::new();
	let on_interrupt = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Interrupted, cancelling");
			on_interrupt.cancel();
		}
	});

	match commands::run(cli, &cancel).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("error [{}]: {}", e.stage(), e);
			ExitCode::from(e.exit_code())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_deploy() {
		let cli = Cli::try_parse_from([
			"txpipe",
			"deploy",
			"--bytecode",
			"@contract.hex",
			"--args",
			"0x2710",
			"--nonce",
			"4",
			"--no-wait",
		])
		.unwrap();

		assert_eq!(cli.config, PathBuf::from("config.toml"));
		match cli.command {
			Command::Deploy { bytecode, args, tx } => {
				assert_eq!(bytecode, "@contract.hex");
				assert_eq!(args.as_deref(), Some("0x2710"));
				assert_eq!(tx.nonce.as_deref(), Some("4"));
				assert_eq!(tx.account, "deployer");
				assert!(tx.no_wait);
			}
			other => panic!("unexpected command {:?}", other),
		}
	}

	#[test]
	fn test_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"txpipe",
			"receipt",
			"0xd1451b5eec7dfcc35d6241cccec672dede03b2721e3c3cd9f3df63bb47eb5cfd",
			"--config",
			"other.toml",
			"--log-level",
			"debug",
		])
		.unwrap();

		assert_eq!(cli.config, PathBuf::from("other.toml"));
		assert_eq!(cli.log_level, "debug");
		assert!(matches!(cli.command, Command::Receipt { .. }));
	}

	#[test]
	fn test_send_requires_recipient() {
		assert!(Cli::try_parse_from(["txpipe", "send", "--data", "0x"]).is_err());
	}
}
