//! Run configuration: built-in defaults, optionally replaced field by field from a RON file.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::engine_info;
use harvester_core::DEFAULT_LATENCY_WINDOW;
use harvester_engine::{CsvOptions, EngineSettings, FetchSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SEARCH_URL: &str = "https://scholarlypublications.universiteitleiden.nl/search?type=edismax&cp=collection%3Aitem_81052";
pub const DEFAULT_OAI_ENDPOINT: &str = "https://scholarlypublications.universiteitleiden.nl/oai2";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    pub base_url: String,
    pub output: PathBuf,
    pub concurrency: usize,
    pub dispatch_pause_ms: u64,
}

impl Default for PagesConfig {
    fn default() -> Self {
        let engine = EngineSettings::for_pages();
        Self {
            base_url: DEFAULT_SEARCH_URL.to_string(),
            output: PathBuf::from("publications.csv"),
            concurrency: engine.concurrency,
            dispatch_pause_ms: duration_millis(engine.dispatch_pause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OaiConfig {
    pub endpoint: String,
    pub metadata_prefix: String,
    pub set: Option<String>,
    pub output: PathBuf,
    pub concurrency: usize,
    pub dispatch_pause_ms: u64,
}

impl Default for OaiConfig {
    fn default() -> Self {
        let engine = EngineSettings::for_chain();
        Self {
            endpoint: DEFAULT_OAI_ENDPOINT.to_string(),
            metadata_prefix: "oai_dc".to_string(),
            set: None,
            output: PathBuf::from("oai_records.csv"),
            concurrency: engine.concurrency,
            dispatch_pause_ms: duration_millis(engine.dispatch_pause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
    pub user_agent: String,
    pub cookie: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            connect_timeout_secs: fetch.connect_timeout.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            max_bytes: fetch.max_bytes,
            user_agent: fetch.user_agent,
            cookie: fetch.cookie,
            headers: fetch.headers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub pages: PagesConfig,
    pub oai: OaiConfig,
    pub http: HttpConfig,
    pub max_attempts: u32,
    pub backoff_cap_secs: u64,
    pub latency_window: usize,
    pub value_separator: String,
    pub write_manifest: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let csv = CsvOptions::default();
        Self {
            pages: PagesConfig::default(),
            oai: OaiConfig::default(),
            http: HttpConfig::default(),
            max_attempts: retry.max_attempts,
            backoff_cap_secs: retry.backoff_cap.as_secs(),
            latency_window: DEFAULT_LATENCY_WINDOW,
            value_separator: csv.value_separator,
            write_manifest: csv.write_manifest,
        }
    }
}

impl HarvestConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        engine_info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            max_bytes: self.http.max_bytes,
            user_agent: self.http.user_agent.clone(),
            headers: self.http.headers.clone(),
            cookie: self.http.cookie.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_cap_secs))
    }

    pub fn pages_engine_settings(&self) -> EngineSettings {
        self.engine_settings(self.pages.concurrency, self.pages.dispatch_pause_ms)
    }

    pub fn oai_engine_settings(&self) -> EngineSettings {
        self.engine_settings(self.oai.concurrency, self.oai.dispatch_pause_ms)
    }

    fn engine_settings(&self, concurrency: usize, dispatch_pause_ms: u64) -> EngineSettings {
        EngineSettings {
            concurrency: concurrency.max(1),
            dispatch_pause: Duration::from_millis(dispatch_pause_ms),
            latency_window: self.latency_window,
        }
    }

    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            value_separator: self.value_separator.clone(),
            write_manifest: self.write_manifest,
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
