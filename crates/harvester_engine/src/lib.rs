//! Harvester engine: fetching, retries, extraction and the concurrent harvest loop.
mod decode;
mod engine;
mod export;
mod extract;
mod fetch;
mod oai_pmh;
mod persist;
mod progress;
mod retry;
mod scope;
mod search_page;
mod types;

pub use decode::{decode_payload, DecodeError, DecodedText};
pub use engine::{EngineSettings, HarvestEngine, HarvestError, HarvestReport};
pub use export::{collect_columns, render_csv, write_csv, CsvOptions, ExportError, ExportSummary};
pub use extract::{Extraction, Extractor};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, Source};
pub use oai_pmh::OaiPmhExtractor;
pub use persist::{ensure_output_dir, OutputTarget, PersistError};
pub use progress::{ChannelProgressSink, LogProgressSink, NullProgressSink, ProgressSink};
pub use retry::{Fetched, GivingUp, RetryPolicy, Sleeper, TokioSleeper};
pub use scope::{discover_scope, PageScope, ScopeProbe};
pub use search_page::{SearchResultsExtractor, SelectorError};
pub use types::{EngineEvent, FailureKind, FetchError, Payload};
