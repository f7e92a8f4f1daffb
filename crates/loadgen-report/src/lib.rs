//! Report persistence for finished runs.
//!
//! Writes tab-separated `.csv` files into the configured directory: one row
//! per sent transaction, one row per fetched block, and a flattened
//! statistics table. File names carry the configured suffix and a wall
//! clock timestamp so successive runs never overwrite each other.

use chrono::Local;
use loadgen_core::RunContext;
use loadgen_types::{BlockResult, RunStatistics, Statistics};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors raised while persisting reports.
#[derive(Debug, Error)]
pub enum ReportError {
	/// Filesystem failure creating the directory or writing a file.
	#[error("report i/o error: {0}")]
	Io(#[from] std::io::Error),
}

/// Writer bound to one output directory and file name suffix.
#[derive(Debug, Clone)]
pub struct ReportWriter {
	directory: PathBuf,
	suffix: String,
}

impl ReportWriter {
	pub fn new(directory: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
		Self {
			directory: directory.into(),
			suffix: suffix.into(),
		}
	}

	/// Writes the per-transaction report. An empty base name disables the
	/// report and returns `None`, as do the other writers.
	pub async fn write_transactions(
		&self,
		name: &str,
		ctx: &RunContext,
	) -> Result<Option<PathBuf>, ReportError> {
		if name.is_empty() {
			return Ok(None);
		}
		let mut content = tsv_row(&[
			"index",
			"hash",
			"sending block number",
			"sending timestamp",
			"minting delay in blocks",
			"minting delay in ms",
			"from",
			"to",
			"nonce",
			"type",
			"gas price or max fee",
			"gas limit",
			"value",
			"data",
		]);
		for index in 0..ctx.sent_count {
			let tx = &ctx.txs[index];
			match ctx.results.get(&tx.hash) {
				Some(result) => {
					let delay_blocks = result
						.mining_block_number
						.map(|mining| (mining - result.sending_block_number).to_string())
						.unwrap_or_else(|| "???".to_string());
					let delay_ms = result
						.minted_at_ms
						.map(|minted| {
							minted.saturating_sub(result.sent_confirmed_at_ms).to_string()
						})
						.unwrap_or_else(|| "???".to_string());
					content.push_str(&tsv_row(&[
						&index.to_string(),
						&tx.hash,
						&result.sending_block_number.to_string(),
						&result.sent_confirmed_at_ms.to_string(),
						&delay_blocks,
						&delay_ms,
						&tx.from,
						&tx.to,
						&tx.nonce.to_string(),
						&tx.tx_type.to_string(),
						&tx.fee_per_gas().to_string(),
						&tx.gas_limit.to_string(),
						&tx.value.to_string(),
						&tx.data,
					]));
				}
				// A sent transaction without a result record still gets a
				// line, so the index column stays gap free.
				None => content.push_str(&tsv_row(&[&index.to_string()])),
			}
		}
		self.persist(name, content).await.map(Some)
	}

	/// Writes the per-block report, one row per fetched block in ascending
	/// block number order.
	pub async fn write_blocks(
		&self,
		name: &str,
		blocks: &[BlockResult],
	) -> Result<Option<PathBuf>, ReportError> {
		if name.is_empty() {
			return Ok(None);
		}
		let mut content = tsv_row(&[
			"relative index",
			"number",
			"timestamp in ms",
			"count of all txs",
			"count of target txs",
			"gas limit",
			"gas used",
			"size",
			"hash",
			"miner",
		]);
		for (index, block) in blocks.iter().enumerate() {
			content.push_str(&tsv_row(&[
				&index.to_string(),
				&block.number.to_string(),
				&block.timestamp_ms.to_string(),
				&block.total_tx_count.to_string(),
				&block.tracked_tx_count.to_string(),
				&block.gas_limit.to_string(),
				&block.gas_used.to_string(),
				&block.size.to_string(),
				&block.hash,
				&block.miner,
			]));
		}
		self.persist(name, content).await.map(Some)
	}

	/// Writes the flattened statistics table: one row per scalar, one row
	/// per `Statistics` quadruple, then the relative-block histogram.
	pub async fn write_statistics(
		&self,
		name: &str,
		stats: &RunStatistics,
	) -> Result<Option<PathBuf>, ReportError> {
		if name.is_empty() {
			return Ok(None);
		}
		let mut content = tsv_row(&[
			"quantity",
			"main or average value",
			"min value",
			"max value",
			"std value",
		]);
		let scalar_rows: [(&str, String); 7] = [
			(
				"First sending block number",
				stats.first_sending_block_number.to_string(),
			),
			("Expected rate, tx/s", stats.expected_rate.to_string()),
			(
				"Actual average rate, tx/s",
				stats.actual_average_rate.to_string(),
			),
			(
				"Sending duration, s",
				stats.sending_duration_secs.to_string(),
			),
			(
				"Pause before next batch, ms",
				stats.batch_pause_ms.to_string(),
			),
			("Sent tx count", stats.sent_tx_count.to_string()),
			("Minted tx count", stats.minted_tx_count.to_string()),
		];
		for (label, value) in scalar_rows {
			content.push_str(&tsv_row(&[label, &value]));
		}
		content.push_str(&statistics_row("RPC batch size", &stats.rpc_batch_size));
		content.push_str(&statistics_row(
			"Sent tx count by blocks",
			&stats.sent_tx_count_per_block,
		));
		content.push_str(&statistics_row(
			"Submission delay in blocks",
			&stats.submission_delay_in_blocks,
		));
		content.push_str(&statistics_row(
			"Minting delay in blocks",
			&stats.minting_delay_in_blocks,
		));
		content.push_str(&statistics_row(
			"Minting delay in milliseconds",
			&stats.minting_delay_in_ms,
		));
		for (relative, count) in stats.minted_tx_count_per_relative_block.iter().enumerate() {
			content.push_str(&tsv_row(&[
				&format!("Minted tx count in relative block {}", relative),
				&count.to_string(),
			]));
		}
		self.persist(name, content).await.map(Some)
	}

	/// Creates the directory if needed and writes the content under a
	/// timestamped, collision-free file name.
	async fn persist(&self, name: &str, content: String) -> Result<PathBuf, ReportError> {
		fs::create_dir_all(&self.directory).await?;
		let path = self.unique_path(name).await?;
		fs::write(&path, content).await?;
		tracing::info!(path = %path.display(), "report written");
		Ok(path)
	}

	async fn unique_path(&self, name: &str) -> Result<PathBuf, ReportError> {
		loop {
			let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S_%3f");
			let file_name = format!("{}_{}_{}.csv", name, self.suffix, stamp);
			let path = self.directory.join(file_name);
			if !fs::try_exists(&path).await? {
				return Ok(path);
			}
			// Same-millisecond collision with an earlier report.
			tokio::time::sleep(std::time::Duration::from_millis(1)).await;
		}
	}
}

fn tsv_row(fields: &[&str]) -> String {
	let mut row = fields.join("\t");
	row.push('\n');
	row
}

fn statistics_row(label: &str, stats: &Statistics) -> String {
	tsv_row(&[
		label,
		&stats.mean.to_string(),
		&stats.min.to_string(),
		&stats.max.to_string(),
		&stats.std_dev.to_string(),
	])
}

/// Returns the file system path as printed in the final summary log.
pub fn display_path(path: &Option<PathBuf>) -> String {
	path.as_deref()
		.map(Path::display)
		.map(|d| d.to_string())
		.unwrap_or_else(|| "<disabled>".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;
	use loadgen_core::{MintingOptions, RunContext, SendingOptions};
	use loadgen_types::{SignedTransaction, TransactionBatch};

	fn sample_context() -> RunContext {
		let txs = vec![
			sample_tx(0),
			sample_tx(1),
		];
		let sending = SendingOptions {
			rate: 2,
			duration_secs: 1,
			target_interval_ms: 1000,
			allowed_interval_ms: 850,
			max_batch_size: 1000,
			batch_pause_ms: 0,
		};
		let minting = MintingOptions {
			timeout_secs: 60,
			error_limit: 10,
			block_batch_size: 10,
		};
		let mut ctx = RunContext::new(sending, minting, txs);
		ctx.first_sending_block = 100;
		ctx.sent_count = 2;
		ctx.batches.push(TransactionBatch {
			beg_index: 0,
			end_index: 2,
			before_block_number: 100,
			after_block_number: 100,
			before_timestamp_ms: 1_000,
			after_timestamp_ms: 1_100,
		});
		ctx.build_results();
		ctx
	}

	fn sample_tx(index: usize) -> SignedTransaction {
		SignedTransaction {
			raw: format!("0xraw{}", index),
			hash: format!("0x{:064x}", index + 1),
			from: "0xsender".to_string(),
			to: "0xrecipient".to_string(),
			nonce: index as u64,
			tx_type: 0,
			gas_limit: 21_000,
			gas_price: Some(7),
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
			value: U256::from(5u64),
			data: "0x".to_string(),
		}
	}

	#[tokio::test]
	async fn test_transactions_report_rows() {
		let dir = tempfile::tempdir().unwrap();
		let writer = ReportWriter::new(dir.path(), "net-test");
		let mut ctx = sample_context();
		{
			let hash = ctx.txs[0].hash.clone();
			let result = ctx.results.get_mut(&hash).unwrap();
			result.mining_block_number = Some(102);
			result.minted_at_ms = Some(3_100);
		}

		let path = writer
			.write_transactions("out_txs", &ctx)
			.await
			.unwrap()
			.unwrap();
		let content = std::fs::read_to_string(&path).unwrap();
		let lines: Vec<&str> = content.lines().collect();

		assert_eq!(lines.len(), 3);
		assert!(lines[0].starts_with("index\thash\t"));
		let minted: Vec<&str> = lines[1].split('\t').collect();
		assert_eq!(minted[0], "0");
		assert_eq!(minted[2], "100");
		assert_eq!(minted[4], "2");
		assert_eq!(minted[5], "2000");
		assert_eq!(minted[10], "7");
		let unresolved: Vec<&str> = lines[2].split('\t').collect();
		assert_eq!(unresolved[4], "???");
		assert_eq!(unresolved[5], "???");
	}

	#[tokio::test]
	async fn test_empty_name_disables_the_report() {
		let dir = tempfile::tempdir().unwrap();
		let writer = ReportWriter::new(dir.path(), "net-test");
		let ctx = sample_context();
		assert!(writer.write_transactions("", &ctx).await.unwrap().is_none());
		assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
	}

	#[tokio::test]
	async fn test_blocks_report_rows() {
		let dir = tempfile::tempdir().unwrap();
		let writer = ReportWriter::new(dir.path(), "net-test");
		let blocks = vec![BlockResult {
			number: 100,
			timestamp_ms: 100_000,
			gas_limit: U256::from(30_000_000u64),
			gas_used: U256::from(42_000u64),
			size: 640,
			hash: "0xb100".to_string(),
			miner: "0xminer".to_string(),
			total_tx_count: 3,
			tracked_tx_count: 2,
		}];

		let path = writer.write_blocks("out_blocks", &blocks).await.unwrap().unwrap();
		let content = std::fs::read_to_string(&path).unwrap();
		let lines: Vec<&str> = content.lines().collect();

		assert_eq!(lines.len(), 2);
		let row: Vec<&str> = lines[1].split('\t').collect();
		assert_eq!(row, vec![
			"0", "100", "100000", "3", "2", "30000000", "42000", "640", "0xb100", "0xminer",
		]);
	}

	#[tokio::test]
	async fn test_statistics_report_includes_histogram() {
		let dir = tempfile::tempdir().unwrap();
		let writer = ReportWriter::new(dir.path(), "net-test");
		let stats = RunStatistics {
			first_sending_block_number: 100,
			expected_rate: 2,
			actual_average_rate: 2.0,
			sending_duration_secs: 1,
			batch_pause_ms: 0,
			sent_tx_count: 2,
			minted_tx_count: 2,
			rpc_batch_size: Statistics::from_values([2.0]),
			sent_tx_count_per_block: Statistics::from_values([2.0]),
			submission_delay_in_blocks: Statistics::from_values([0.0]),
			minting_delay_in_ms: Statistics::from_values([2000.0, 2100.0]),
			minting_delay_in_blocks: Statistics::from_values([2.0, 2.0]),
			minted_tx_count_per_relative_block: vec![0, 0, 2],
		};

		let path = writer
			.write_statistics("out_tx_stat", &stats)
			.await
			.unwrap()
			.unwrap();
		let content = std::fs::read_to_string(&path).unwrap();

		assert!(content.contains("Sent tx count\t2\n"));
		assert!(content.contains("Minting delay in milliseconds\t2050\t2000\t2100\t"));
		assert!(content.contains("Minted tx count in relative block 2\t2\n"));
		assert!(content.ends_with('\n'));
	}

	#[tokio::test]
	async fn test_report_file_name_carries_suffix() {
		let dir = tempfile::tempdir().unwrap();
		let writer = ReportWriter::new(dir.path(), "net-local");
		let blocks: Vec<BlockResult> = Vec::new();
		let path = writer.write_blocks("out_blocks", &blocks).await.unwrap().unwrap();
		let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
		assert!(file_name.starts_with("out_blocks_net-local_"));
		assert!(file_name.ends_with(".csv"));
	}
}
