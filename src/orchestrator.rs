//! Batch orchestration
//!
//! Runs classification for every group on one bounded pool, waits for all of
//! it, then runs extraction for the groups that qualify on a second pool, and
//! finally aggregates. Each task owns its group key, so the outcome maps are
//! filled by a single fan-in loop without locking.

use crate::aggregate::aggregate;
use crate::config::{CatalogConfig, Config};
use crate::grouping::{SupportedExtensions, group_case};
use crate::llm_providers::DocumentModel;
use crate::prompts::Instructions;
use crate::retry::RetryingClient;
use crate::stages::{ClassificationStage, ExtractionStage};
use crate::types::{
    Case, ClassificationOutcome, DocumentGroup, ExtractionOutcome, GroupKey, ProcessingStatus,
    ResultRow,
};
use crate::{log_debug, log_error, log_info, log_warn};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

/// The two worker-pool phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Classification,
    Extraction,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => f.write_str("Classification"),
            Self::Extraction => f.write_str("Extraction"),
        }
    }
}

/// Receives progress notifications while a batch runs
pub trait Progress: Send + Sync {
    fn phase_started(&self, _phase: Phase, _total: usize) {}
    fn item_finished(&self, _phase: Phase) {}
    fn phase_finished(&self, _phase: Phase) {}
}

/// Progress sink that ignores everything
pub struct NoProgress;

impl Progress for NoProgress {}

/// Rows of a finished run plus bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub rows: Vec<ResultRow>,
}

/// Row counts per status family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub extracted: usize,
    pub partial: usize,
    pub skipped: usize,
    pub classification_failed: usize,
    pub extraction_failed: usize,
}

impl BatchReport {
    pub fn group_count(&self) -> usize {
        self.rows.len()
    }

    /// Groups that ended in a classification or extraction failure
    pub fn failed_groups(&self) -> usize {
        self.rows.iter().filter(|row| row.status.is_failure()).count()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for row in &self.rows {
            match row.status {
                ProcessingStatus::ExtractionSuccessful => counts.extracted += 1,
                ProcessingStatus::ExtractionPartial => counts.partial += 1,
                ProcessingStatus::ClassifiedUnknown
                | ProcessingStatus::NotConfigured(_)
                | ProcessingStatus::NoFieldsConfigured => counts.skipped += 1,
                ProcessingStatus::ClassificationFailed(_) => counts.classification_failed += 1,
                ProcessingStatus::ExtractionFailed(_) => counts.extraction_failed += 1,
            }
        }
        counts
    }
}

/// Drives a batch of document groups through both stages
pub struct Orchestrator {
    model_name: String,
    classifier: ClassificationStage,
    extractor: ExtractionStage,
    catalog: Arc<CatalogConfig>,
    labels: Arc<Vec<String>>,
    classification_workers: usize,
    extraction_workers: usize,
}

impl Orchestrator {
    /// Wire the stages around a shared model handle
    pub fn new(model: Arc<dyn DocumentModel>, config: &Config) -> Result<Self> {
        let instructions = Arc::new(Instructions::new(&config.instructions)?);
        let client = RetryingClient::new(model, config.retry_policy());

        Ok(Self {
            model_name: client.model_name().to_string(),
            classifier: ClassificationStage::new(client.clone(), Arc::clone(&instructions)),
            extractor: ExtractionStage::new(client, instructions),
            catalog: Arc::new(config.catalog.clone()),
            labels: Arc::new(config.catalog.labels()),
            classification_workers: config.performance.classification_workers.max(1),
            extraction_workers: config.performance.extraction_workers.max(1),
        })
    }

    /// Group every case and run the batch
    pub async fn run_cases(
        &self,
        cases: &[Case],
        supported: &SupportedExtensions,
        progress: &dyn Progress,
    ) -> BatchReport {
        let mut groups = Vec::new();
        for case in cases {
            let case_groups = match group_case(case, supported) {
                Ok(case_groups) => case_groups,
                Err(err) => {
                    log_warn!("Skipping case {}: {:#}", case.id, err);
                    continue;
                }
            };
            if case_groups.is_empty() {
                log_warn!("No processable documents found in case folder: {}", case.id);
            }
            groups.extend(case_groups);
        }
        self.run(groups, progress).await
    }

    /// Classify, extract and aggregate; always one row per group
    pub async fn run(&self, groups: Vec<DocumentGroup>, progress: &dyn Progress) -> BatchReport {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = Uuid::new_v4();
        log_info!(
            "Run {} started: {} document groups, model {}",
            run_id,
            groups.len(),
            self.model_name
        );

        let classifications = self.classify_all(&groups, progress).await;
        let extractions = self.extract_all(&groups, &classifications, progress).await;

        let rows = aggregate(&groups, &classifications, &extractions, &self.catalog);
        let elapsed = timer.elapsed();
        log_info!(
            "Run {} finished: {} rows in {:.1}s",
            run_id,
            rows.len(),
            elapsed.as_secs_f64()
        );

        BatchReport {
            run_id,
            model: self.model_name.clone(),
            started_at,
            elapsed,
            rows,
        }
    }

    async fn classify_all(
        &self,
        groups: &[DocumentGroup],
        progress: &dyn Progress,
    ) -> HashMap<GroupKey, ClassificationOutcome> {
        let jobs = groups
            .iter()
            .map(|group| {
                let stage = self.classifier.clone();
                let labels = Arc::clone(&self.labels);
                let group = group.clone();
                (group.key(), async move { stage.classify(&group, &labels).await })
            })
            .collect();

        run_pool(jobs, self.classification_workers, Phase::Classification, progress).await
    }

    async fn extract_all(
        &self,
        groups: &[DocumentGroup],
        classifications: &HashMap<GroupKey, ClassificationOutcome>,
        progress: &dyn Progress,
    ) -> HashMap<GroupKey, ExtractionOutcome> {
        let mut jobs = Vec::new();
        for group in groups {
            let key = group.key();
            let Some(doc_type) = classifications.get(&key).and_then(|c| c.known_type()) else {
                continue;
            };
            match self.catalog.fields_for(doc_type) {
                Some(specs) if !specs.is_empty() => {
                    let stage = self.extractor.clone();
                    let group = group.clone();
                    let doc_type = doc_type.to_string();
                    let specs = specs.to_vec();
                    jobs.push((key, async move {
                        stage.extract(&group, &doc_type, &specs).await
                    }));
                }
                _ => log_debug!("Skipping extraction for {}: no fields for '{}'", key, doc_type),
            }
        }

        run_pool(jobs, self.extraction_workers, Phase::Extraction, progress).await
    }
}

/// Run keyed jobs with at most `workers` in flight, collecting their outcomes.
///
/// A job that panics leaves no entry; the aggregator reports it as incomplete.
async fn run_pool<O, Fut>(
    jobs: Vec<(GroupKey, Fut)>,
    workers: usize,
    phase: Phase,
    progress: &dyn Progress,
) -> HashMap<GroupKey, O>
where
    O: Send + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    progress.phase_started(phase, jobs.len());
    log_info!("{} phase: {} groups, {} workers", phase, jobs.len(), workers);

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    for (key, job) in jobs {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (key, job.await)
        });
    }

    let mut outcomes = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, outcome)) => {
                outcomes.insert(key, outcome);
            }
            Err(err) => log_error!("{} task did not complete: {}", phase, err),
        }
        progress.item_finished(phase);
    }

    progress.phase_finished(phase);
    outcomes
}
