pub mod config;
pub mod dataset;
pub mod date_util;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod tools;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

pub use config::Settings;
pub use dataset::{DatasetHandle, LoadReport, TripDataset, TripRecord, TripStatus};
pub use error::{Error, Result};
pub use llm::{AgentResolver, ParserResolver, QueryResolver};
pub use metrics::{BucketSeries, BucketUnit, Encoding, Granularity, SummaryMetrics};
pub use query::{parse_expression, DateRange, Period, PeriodType};
pub use storage::Database;
pub use tools::{
    AggregationResult, RejectReason, Resolution, Resolved, Suggestion, ToolDetail, ToolKind,
    ToolRequest,
};

/// What the pipeline produced for one question.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// The question was not about trips.
    Guidance { message: String },
    Answered(Box<AggregationResult>),
    Rejected { reason: RejectReason, guidance: String },
}

/// End-to-end question answering over a trip dataset.
///
/// `Send + Sync`: one pipeline can be shared behind an `Arc` by concurrent
/// request handlers, and `reload` is visible to all of them.
pub struct TripAnalytics {
    data: DatasetHandle,
    resolver: Option<Box<dyn QueryResolver>>,
    timeout: Duration,
    known_tools: HashSet<String>,
}

impl TripAnalytics {
    /// Deterministic-only pipeline: questions are resolved by the date parser.
    pub fn new(dataset: TripDataset) -> Self {
        Self {
            data: DatasetHandle::new(dataset),
            resolver: None,
            timeout: Duration::from_secs(config::DEFAULT_RESOLVER_TIMEOUT_SECS),
            known_tools: tools::known_tool_names(),
        }
    }

    /// Consult `resolver` first, bounded by `timeout`.
    pub fn with_resolver(mut self, resolver: Box<dyn QueryResolver>, timeout: Duration) -> Self {
        self.resolver = Some(resolver);
        self.timeout = timeout;
        self
    }

    /// The dataset as of now. Later reloads do not affect the returned value.
    pub fn dataset(&self) -> Arc<TripDataset> {
        self.data.snapshot()
    }

    /// Swap in a new dataset. Queries already running keep the old one.
    pub fn reload(&self, dataset: TripDataset) -> Arc<TripDataset> {
        log::info!("Reloading dataset ({} trips)", dataset.len());
        self.data.replace(dataset)
    }

    pub fn reload_from_csv(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let (dataset, report) = dataset::load_csv(path)?;
        self.reload(dataset);
        Ok(report)
    }

    /// Resolve a question to a tool and range without running it.
    pub async fn resolve(&self, text: &str, today: NaiveDate) -> Resolution {
        let suggestion = match &self.resolver {
            Some(resolver) => {
                llm::resolve_with_timeout(
                    resolver.as_ref(),
                    text,
                    &tools::descriptors(),
                    today,
                    self.timeout,
                )
                .await
            }
            None => None,
        };
        tools::validate(suggestion.as_ref(), &self.known_tools, text, today)
    }

    /// Run a validated request against the current dataset.
    pub fn run(&self, resolved: &Resolved) -> Result<AggregationResult> {
        tools::dispatch(&self.data.snapshot(), resolved)
    }

    /// Answer a natural-language question about the trip log.
    pub async fn answer(&self, text: &str, today: NaiveDate) -> Result<QueryOutcome> {
        if !tools::is_trip_query(text) {
            log::debug!("Not a trip question: {text:?}");
            return Ok(QueryOutcome::Guidance {
                message: tools::GUIDANCE.to_string(),
            });
        }

        match self.resolve(text, today).await {
            Resolution::Resolved(resolved) => {
                let result = self.run(&resolved)?;
                Ok(QueryOutcome::Answered(Box::new(result)))
            }
            Resolution::Rejected(reason) => {
                log::info!("Rejected {text:?}: {reason}");
                Ok(QueryOutcome::Rejected {
                    guidance: reason.guidance().to_string(),
                    reason,
                })
            }
        }
    }
}
