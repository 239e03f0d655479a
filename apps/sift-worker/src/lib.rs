use std::{path::PathBuf, sync::Arc};

use clap::Parser;

use sift_providers::HttpSource;
use sift_service::{SiftService, SourceConnector};
use sift_storage::{DurableStore, FileStore};

#[derive(Debug, Parser)]
#[command(
	version = sift_cli::VERSION,
	rename_all = "kebab",
	styles = sift_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Rebuild the index from the full listing even when a snapshot was loaded.
	#[arg(long)]
	pub force_rebuild: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = sift_config::load(&args.config)?;

	sift_cli::init_tracing(&config.service.log_level);

	let store: Arc<dyn DurableStore> = Arc::new(FileStore::open(&config.storage.dir).await?);
	let source: Arc<dyn SourceConnector> = Arc::new(HttpSource::new(config.source.clone())?);
	let service = SiftService::new(&config, store, source.clone());
	let stats = service.initialize().await;

	tracing::info!(
		documents = stats.document_count,
		terms = stats.term_count,
		dir = %config.storage.dir.display(),
		"Index ready."
	);

	match source.authenticate().await {
		Ok(true) => tracing::info!("Source authenticated."),
		Ok(false) => tracing::warn!("Source rejected the access token; syncs will fail until it is fixed."),
		Err(err) => tracing::warn!(error = %err, "Source authentication check failed."),
	}

	if rebuild_needed(&args, &config, stats.document_count) {
		match service.full_rebuild(true).await {
			Ok(report) => tracing::info!(
				records = report.records_indexed,
				errors = report.errors.len(),
				"Initial rebuild completed."
			),
			Err(err) => tracing::error!(error = %err, "Initial rebuild failed."),
		}
	}

	service.start_background();

	tracing::info!(interval_ms = config.sync.interval_ms, "Sift worker running.");

	tokio::signal::ctrl_c().await?;

	tracing::info!("Shutdown requested.");

	service.shutdown().await?;

	Ok(())
}

pub fn rebuild_needed(args: &Args, config: &sift_config::Config, document_count: usize) -> bool {
	args.force_rebuild || config.rebuild.rebuild_on_start || document_count == 0
}
