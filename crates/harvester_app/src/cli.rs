use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::HarvestConfig;
use crate::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "harvester")]
#[command(about = "Harvest publication metadata from paginated search listings or OAI-PMH")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk every page of a search-result listing.
    Pages(PagesArgs),
    /// Follow an OAI-PMH ListRecords resumption-token chain.
    Oai(OaiArgs),
}

#[derive(Debug, Args)]
pub struct PagesArgs {
    /// Listing URL; `page=<N>` is added per request.
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct OaiArgs {
    /// OAI-PMH base endpoint.
    #[arg(long)]
    pub endpoint: Option<String>,
    #[arg(long)]
    pub metadata_prefix: Option<String>,
    /// Restrict the harvest to one set.
    #[arg(long)]
    pub set: Option<String>,
}

/// Flags shared by both modes; each one overrides the config file.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// RON config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Logging level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,
    #[arg(long, global = true, value_enum, default_value_t = LogDestination::File)]
    pub log_to: LogDestination,
    /// Maximum units in flight.
    #[arg(short = 'j', long, global = true)]
    pub concurrency: Option<usize>,
    #[arg(long, global = true)]
    pub request_timeout_secs: Option<u64>,
    #[arg(long, global = true)]
    pub connect_timeout_secs: Option<u64>,
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,
    #[arg(long, global = true)]
    pub backoff_cap_secs: Option<u64>,
    #[arg(long, global = true)]
    pub dispatch_pause_ms: Option<u64>,
    /// Output CSV path.
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,
    /// Separator for repeated values within one cell.
    #[arg(long, global = true)]
    pub separator: Option<String>,
    /// Skip the `<stem>.manifest.json` summary file.
    #[arg(long, global = true)]
    pub no_manifest: bool,
    #[arg(long, global = true)]
    pub user_agent: Option<String>,
    /// Raw Cookie header sent with every request.
    #[arg(long, global = true)]
    pub cookie: Option<String>,
    /// Log progress lines instead of drawing a progress bar.
    #[arg(long, global = true)]
    pub no_progress: bool,
}

impl Cli {
    /// Lays the command-line values over `config`.
    pub fn apply(&self, config: &mut HarvestConfig) {
        let run = &self.run;
        match &self.command {
            Command::Pages(args) => {
                set(&mut config.pages.base_url, args.base_url.clone());
                set(&mut config.pages.output, run.output.clone());
                set(&mut config.pages.concurrency, run.concurrency);
                set(&mut config.pages.dispatch_pause_ms, run.dispatch_pause_ms);
            }
            Command::Oai(args) => {
                set(&mut config.oai.endpoint, args.endpoint.clone());
                set(&mut config.oai.metadata_prefix, args.metadata_prefix.clone());
                if args.set.is_some() {
                    config.oai.set = args.set.clone();
                }
                set(&mut config.oai.output, run.output.clone());
                set(&mut config.oai.concurrency, run.concurrency);
                set(&mut config.oai.dispatch_pause_ms, run.dispatch_pause_ms);
            }
        }

        set(&mut config.http.request_timeout_secs, run.request_timeout_secs);
        set(&mut config.http.connect_timeout_secs, run.connect_timeout_secs);
        set(&mut config.http.user_agent, run.user_agent.clone());
        if run.cookie.is_some() {
            config.http.cookie = run.cookie.clone();
        }
        set(&mut config.max_attempts, run.max_attempts);
        set(&mut config.backoff_cap_secs, run.backoff_cap_secs);
        set(&mut config.value_separator, run.separator.clone());
        if run.no_manifest {
            config.write_manifest = false;
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
