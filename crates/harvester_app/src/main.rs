mod cli;
mod config;
mod logging;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use harvester_engine::{
    write_csv, HarvestEngine, HarvestReport, LogProgressSink, OaiPmhExtractor, ProgressSink,
    ReqwestFetcher, SearchResultsExtractor, Source,
};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};
use crate::config::HarvestConfig;
use crate::progress::BarProgressSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.run.log_level.as_deref() {
        Some(name) => engine_logging::parse_level(name)
            .ok_or_else(|| anyhow!("unknown log level `{name}`"))?,
        None => LevelFilter::Info,
    };
    logging::initialize(cli.run.log_to, level);

    let mut config = match cli.run.config.as_deref() {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    cli.apply(&mut config);

    let stop = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(stop.clone()));

    let progress: Arc<dyn ProgressSink> = if cli.run.no_progress {
        Arc::new(LogProgressSink)
    } else {
        Arc::new(BarProgressSink::new())
    };

    let (report, output) = match &cli.command {
        Command::Pages(_) => harvest_pages(&config, progress, stop).await?,
        Command::Oai(_) => harvest_oai(&config, progress, stop).await?,
    };

    println!("{}", report.summary);
    for failure in &report.failures {
        engine_warn!("{}", failure);
    }

    let export = write_csv(&output, &report.records, &report.summary, &config.csv_options())
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} record(s) with {} column(s) to {}",
        export.rows,
        export.columns.len(),
        export.output_path.display()
    );
    if let Some(manifest) = export.manifest_path {
        engine_info!("Manifest written to {}", manifest.display());
    }
    Ok(())
}

async fn harvest_pages(
    config: &HarvestConfig,
    progress: Arc<dyn ProgressSink>,
    stop: CancellationToken,
) -> anyhow::Result<(HarvestReport, PathBuf)> {
    let source = Source::SearchPages {
        base_url: config.pages.base_url.clone(),
    };
    engine_info!("Harvesting search pages from {}", config.pages.base_url);
    let fetcher = Arc::new(ReqwestFetcher::new(source, config.fetch_settings())?);
    let extractor = Arc::new(SearchResultsExtractor::new()?);

    let engine = HarvestEngine::new(fetcher, extractor.clone())
        .with_retry(config.retry_policy())
        .with_settings(config.pages_engine_settings())
        .with_progress(progress)
        .with_stop_token(stop);
    let report = engine.harvest_pages(extractor.as_ref()).await?;
    Ok((report, config.pages.output.clone()))
}

async fn harvest_oai(
    config: &HarvestConfig,
    progress: Arc<dyn ProgressSink>,
    stop: CancellationToken,
) -> anyhow::Result<(HarvestReport, PathBuf)> {
    let oai = &config.oai;
    let source = Source::OaiPmh {
        endpoint: oai.endpoint.clone(),
        metadata_prefix: oai.metadata_prefix.clone(),
        set: oai.set.clone(),
    };
    engine_info!(
        "Harvesting {} records from {}{}",
        oai.metadata_prefix,
        oai.endpoint,
        oai.set
            .as_deref()
            .map(|set| format!(" (set {set})"))
            .unwrap_or_default()
    );
    let fetcher = Arc::new(ReqwestFetcher::new(source, config.fetch_settings())?);

    let engine = HarvestEngine::new(fetcher, Arc::new(OaiPmhExtractor))
        .with_retry(config.retry_policy())
        .with_settings(config.oai_engine_settings())
        .with_progress(progress)
        .with_stop_token(stop);
    let report = engine.harvest_chain().await?;
    Ok((report, oai.output.clone()))
}

async fn cancel_on_interrupt(stop: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        engine_warn!("Interrupt received; finishing in-flight units");
        eprintln!("Stopping: waiting for in-flight requests, press Ctrl-C again to abort");
        stop.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    }
}
