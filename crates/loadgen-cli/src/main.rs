//! Main entry point for the load generator.
//!
//! This binary drives a complete run against a node: it prepares and signs
//! the transaction sequence, dispatches it at the configured rate, awaits
//! minting through block polling, and writes the report files.

use clap::Parser;
use loadgen_config::{Config, ALLOWED_INTERVAL_MS, TARGET_INTERVAL_MS};
use loadgen_core::{dispatcher, reconciler, stats, MintingOptions, RunContext, SendingOptions};
use loadgen_report::ReportWriter;
use loadgen_rpc::HttpRpc;
use loadgen_signer::{load_signer, prepare_signed_transactions};
use loadgen_types::now_millis;
use std::path::PathBuf;

/// Command-line arguments for the load generator.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "loadgen.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.to_string()));
	fmt().with_env_filter(env_filter).with_target(true).init();

	let config = Config::from_file(&args.config)?;
	config.validate()?;
	tracing::info!(path = %args.config.display(), "configuration loaded");

	let sending_rpc = HttpRpc::new(&config.node.sending_url);
	let reading_rpc = HttpRpc::new(config.node.reading_url());
	let signer = load_signer(&config.account.private_key)?;
	let sender_address = signer.address().to_string();
	tracing::info!(
		sending_url = sending_rpc.url(),
		reading_url = reading_rpc.url(),
		from = %sender_address,
		kind = %config.transaction.kind,
		rate = config.sending.rate,
		duration_secs = config.sending.duration_secs,
		total = config.sending.total_tx_count(),
		"run parameters"
	);

	let chain_id = reading_rpc.chain_id().await?;
	let nonce = reading_rpc.transaction_count(&sender_address).await?;
	tracing::info!(chain_id, nonce, "account state fetched");

	let total = config.sending.total_tx_count();
	tracing::info!(count = total, "preparing signed transactions");
	let txs =
		prepare_signed_transactions(&reading_rpc, &config, &signer, chain_id, nonce, total).await?;
	tracing::info!(count = txs.len(), "transactions signed");

	let startup_block = reading_rpc.block_number().await?;
	tracing::info!(block = startup_block, "current chain head");

	if let Some(start_millis) = config.sending.start_millis.as_deref() {
		let wait_ms = millis_until_alignment(start_millis, now_millis());
		if wait_ms > 0 {
			tracing::info!(wait_ms, "waiting for the aligned start instant");
			tokio::time::sleep(std::time::Duration::from_millis(wait_ms)).await;
		}
	}

	let mut ctx = RunContext::new(
		SendingOptions {
			rate: config.sending.rate,
			duration_secs: config.sending.duration_secs,
			target_interval_ms: TARGET_INTERVAL_MS,
			allowed_interval_ms: ALLOWED_INTERVAL_MS,
			max_batch_size: config.sending.max_batch_size,
			batch_pause_ms: config.sending.batch_pause_ms,
		},
		MintingOptions {
			timeout_secs: config.minting.timeout_secs,
			error_limit: config.minting.error_limit,
			block_batch_size: config.minting.block_batch_size,
		},
		txs,
	);

	dispatcher::run(&sending_rpc, &mut ctx).await?;
	tracing::info!(
		first_sending_block = ctx.first_sending_block,
		sent = ctx.sent_count,
		"sending finished"
	);

	ctx.build_results();

	if config.minting.enabled {
		tracing::info!("awaiting transaction minting through block polling");
		let unresolved = reconciler::run(&reading_rpc, &mut ctx).await?;
		if unresolved.is_empty() {
			tracing::info!("all transactions minted");
		} else {
			tracing::warn!(
				remaining = unresolved.len(),
				"minting incomplete, some transactions stay unresolved"
			);
		}
	}

	let run_stats = stats::run_statistics(&ctx);

	let writer = ReportWriter::new(&config.report.directory, config.report.suffix.as_str());
	let txs_path = writer
		.write_transactions(&config.report.transactions_file, &ctx)
		.await?;
	let stats_path = writer
		.write_statistics(&config.report.statistics_file, &run_stats)
		.await?;
	let blocks_path = if config.minting.enabled {
		let blocks = stats::block_results(&ctx);
		writer.write_blocks(&config.report.blocks_file, &blocks).await?
	} else {
		None
	};

	tracing::info!(
		sent = run_stats.sent_tx_count,
		minted = run_stats.minted_tx_count,
		actual_rate = run_stats.actual_average_rate,
		transactions_report = %loadgen_report::display_path(&txs_path),
		statistics_report = %loadgen_report::display_path(&stats_path),
		blocks_report = %loadgen_report::display_path(&blocks_path),
		"run finished"
	);
	Ok(())
}

/// Milliseconds to wait so that the wall clock's trailing digits match the
/// configured start pattern. A pattern of `"0000"` aligns to a whole ten
/// second boundary, `"500"` to the next half second.
fn millis_until_alignment(pattern: &str, now_ms: u64) -> u64 {
	let modulus = 10u64.pow(pattern.len() as u32);
	let target: u64 = pattern.parse().unwrap_or(0);
	let mut wait = target as i64 - (now_ms % modulus) as i64;
	if wait < 0 {
		wait += modulus as i64;
	}
	wait as u64
}
