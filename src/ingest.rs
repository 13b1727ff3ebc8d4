//! Snapshot ingestion pipeline.
//!
//! Plans which periods to load, then for each one in order: fetch the raw document,
//! normalize it, and upsert the records. A failing period is recorded and the run
//! moves on.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::fetch::{FetchError, SnapshotSource};
use crate::models::{
    format_period, last_full_period, parse_period, period_range, PeriodError, DEFAULT_START_PERIOD,
};
use crate::normalize::normalize_document;
use crate::storage::{SnapshotStore, StorageError};

/// Errors for a single period.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Period(#[from] PeriodError),
}

/// Which periods to ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodPlan {
    Single(String),
    Range {
        from: String,
        to: String,
    },
    /// Every period from `start` to `end` not already stored, or all of them with `force`
    Auto {
        start: Option<String>,
        end: Option<String>,
        force: bool,
    },
}

/// Resolve a plan into an ordered list of periods.
pub fn plan_periods(
    plan: &PeriodPlan,
    existing: &[String],
    today: NaiveDate,
) -> Result<Vec<String>, PeriodError> {
    match plan {
        PeriodPlan::Single(period) => Ok(vec![format_period(parse_period(period)?)]),
        PeriodPlan::Range { from, to } => period_range(from, to),
        PeriodPlan::Auto { start, end, force } => {
            let start = start.as_deref().unwrap_or(DEFAULT_START_PERIOD);
            let end = end.clone().unwrap_or_else(|| last_full_period(today));
            let all = period_range(start, &end)?;
            if *force {
                return Ok(all);
            }
            Ok(all.into_iter().filter(|p| !existing.contains(p)).collect())
        }
    }
}

/// What happened to one period.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Loaded { rows: usize, slug: String },
    Downloaded { path: PathBuf },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodOutcome {
    pub period: String,
    pub outcome: Outcome,
}

impl fmt::Display for PeriodOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Loaded { rows, slug } => {
                write!(f, "[{}] rows={} OK ({})", self.period, rows, slug)
            }
            Outcome::Downloaded { path } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                write!(f, "Downloaded {} -> {}", self.period, name)
            }
            Outcome::Skipped { reason } => write!(f, "[{}] {}, skip", self.period, reason),
            Outcome::Failed { reason } => write!(f, "[{}] ERROR: {}", self.period, reason),
        }
    }
}

/// Ordered per-period outcomes of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub outcomes: Vec<PeriodOutcome>,
    /// Where the read copy was published, if it was
    pub read_copy: Option<PathBuf>,
}

impl IngestReport {
    pub fn ok(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Loaded { .. } | Outcome::Downloaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Skipped { .. }))
            .count()
    }
}

/// Runs ingestion against one source and one store.
pub struct Ingestor {
    source: Arc<dyn SnapshotSource>,
    store: SnapshotStore,
    download_only: bool,
    read_copy: Option<PathBuf>,
}

impl Ingestor {
    pub fn new(source: Arc<dyn SnapshotSource>, store: SnapshotStore) -> Self {
        Self {
            source,
            store,
            download_only: false,
            read_copy: None,
        }
    }

    /// Only fetch documents; leave the store untouched.
    pub fn download_only(mut self, download_only: bool) -> Self {
        self.download_only = download_only;
        self
    }

    /// Publish the store to `dst` once a planned run finishes.
    pub fn read_copy(mut self, dst: Option<PathBuf>) -> Self {
        self.read_copy = dst;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Plan against the stored periods, ingest, then publish the read copy.
    ///
    /// The read copy is published even when the plan is empty or only raw
    /// documents were fetched, as long as a table exists.
    pub async fn run_plan(
        &self,
        plan: &PeriodPlan,
        today: NaiveDate,
    ) -> Result<IngestReport, IngestError> {
        let existing = self.store.list_periods()?;
        let periods = plan_periods(plan, &existing, today)?;

        let mut report = if periods.is_empty() {
            info!("All planned periods are already stored");
            IngestReport::default()
        } else {
            self.run(&periods).await?
        };
        report.read_copy = self.publish_read_copy()?;
        Ok(report)
    }

    fn publish_read_copy(&self) -> Result<Option<PathBuf>, StorageError> {
        let Some(dst) = &self.read_copy else {
            return Ok(None);
        };
        if !self.store.exists() {
            warn!("No table at {:?}, read copy not published", self.store.path());
            return Ok(None);
        }
        self.store.publish_read_copy(dst)?;
        Ok(Some(dst.clone()))
    }

    /// Ingest periods in order.
    ///
    /// Schema preparation failing aborts the run; anything going wrong within a
    /// period only fails that period.
    pub async fn run(&self, periods: &[String]) -> Result<IngestReport, StorageError> {
        if !self.download_only {
            self.store.ensure_schema()?;
        }

        info!(
            "Ingesting {} period(s) from {} source",
            periods.len(),
            self.source.name()
        );

        let mut report = IngestReport::default();
        for period in periods {
            let outcome = match self.ingest_period(period).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Period {} failed: {}", period, e);
                    Outcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.outcomes.push(PeriodOutcome {
                period: period.clone(),
                outcome,
            });
        }

        info!(
            "Ingestion finished: ok={} fail={} skipped={}",
            report.ok(),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    /// Fetch, normalize and upsert one period.
    pub async fn ingest_period(&self, period: &str) -> Result<Outcome, IngestError> {
        let snapshot = self.source.fetch_period(period).await?;

        if self.download_only {
            return Ok(Outcome::Downloaded {
                path: snapshot.path,
            });
        }

        let document = snapshot.json()?;
        let records = normalize_document(&document, period);
        if records.is_empty() {
            warn!("Period {} produced no records", period);
            return Ok(Outcome::Skipped {
                reason: "empty document".to_string(),
            });
        }

        let rows = self.store.upsert(records)?;
        Ok(Outcome::Loaded {
            rows,
            slug: snapshot.slug,
        })
    }
}
