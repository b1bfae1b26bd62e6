//! Batch controller: stage gating, preflight checks and per-pair scheduling
//!
//! A run moves through a fixed sequence:
//!
//! 1. preflight: stage range, geocode precondition, pair-key resolution,
//!    stage-1 inputs of the master image
//! 2. stage 1 (topography) when the gate starts at 1, otherwise the stage-1
//!    products are located on disk
//! 3. stage 2 (interferograms), one independent unit of work per pair,
//!    sequential or on a worker pool
//!
//! Nothing is written before preflight succeeds. Once stage 2 starts, pair
//! failures and cancellation are recorded in the returned [`BatchReport`]
//! instead of aborting the run, so the report always covers every pair.

use super::interferogram::{InterferogramStage, PairProducts};
use super::landmask::LandmaskCache;
use super::layout::BatchLayout;
use super::publish::ResultPublisher;
use super::topography::{TopoProducts, TopographyStage};
use crate::io::{Configuration, PrmReader, StageGate};
use crate::tools::ProcessingTools;
use crate::types::{BatchError, BatchResult, PairKey, PairSpec, ResolvedPair};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation signal checked between processing steps
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> BatchResult<()> {
        if self.is_cancelled() {
            Err(BatchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// What happens to the rest of the batch when one pair fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailurePolicy {
    /// Cancel outstanding pairs after the first failure
    FailFast,
    /// Record the failure and continue with the remaining pairs
    KeepGoing,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Pairs processed concurrently; 1 processes in manifest order
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    /// Leave pairs that already have a published result untouched
    pub skip_published: bool,
    /// Last stage to run
    pub stop_after: StageGate,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            failure_policy: FailurePolicy::FailFast,
            skip_published: false,
            stop_after: StageGate::INTERFEROGRAM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopographyStatus {
    /// Stage 1 ran and produced new products
    Built,
    /// Products from an earlier stage-1 run were used
    Reused,
    /// `topo_phase = 0`
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Published(PairProducts),
    Skipped { reason: String },
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub reference: String,
    pub repeat: String,
    pub key: PairKey,
    pub outcome: PairOutcome,
}

/// Summary of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub proc_stage: StageGate,
    pub stop_after: StageGate,
    pub topography: TopographyStatus,
    pub landmask_builds: usize,
    pub pairs: Vec<PairReport>,
}

impl BatchReport {
    pub fn published(&self) -> usize {
        self.count(|outcome| matches!(outcome, PairOutcome::Published(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, PairOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, PairOutcome::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|outcome| matches!(outcome, PairOutcome::Cancelled))
    }

    /// True when no pair failed or was cancelled
    pub fn is_success(&self) -> bool {
        self.count(|outcome| {
            matches!(
                outcome,
                PairOutcome::Failed { .. } | PairOutcome::Cancelled
            )
        }) == 0
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> BatchResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BatchError::Processing(format!("Failed to serialize report: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn count<F: Fn(&PairOutcome) -> bool>(&self, predicate: F) -> usize {
        self.pairs
            .iter()
            .filter(|pair| predicate(&pair.outcome))
            .count()
    }
}

/// Resolve every pair's key and reject collisions
pub fn resolve_pairs(layout: &BatchLayout, pairs: &[PairSpec]) -> BatchResult<Vec<ResolvedPair>> {
    let mut epochs = HashMap::new();
    let mut seen: HashMap<PairKey, usize> = HashMap::new();
    let mut resolved = Vec::with_capacity(pairs.len());

    for spec in pairs {
        let mut epoch_of = |id: &str| -> BatchResult<_> {
            if let Some(epoch) = epochs.get(id) {
                return Ok(*epoch);
            }
            let epoch = PrmReader::read_epoch(layout.prm_path(id))?;
            epochs.insert(id.to_string(), epoch);
            Ok(epoch)
        };

        let reference = epoch_of(&spec.reference)?;
        let repeat = epoch_of(&spec.repeat)?;
        let key = PairKey::new(reference, repeat);

        if let Some(&first_line) = seen.get(&key) {
            return Err(BatchError::DuplicatePairKey {
                key,
                first_line,
                second_line: spec.line,
            });
        }
        seen.insert(key, spec.line);

        resolved.push(ResolvedPair {
            spec: spec.clone(),
            key,
        });
    }

    Ok(resolved)
}

/// Runs the configured stages over a pair list
pub struct BatchRunner<T: ProcessingTools> {
    config: Configuration,
    pairs: Vec<PairSpec>,
    layout: BatchLayout,
    tools: T,
    options: BatchOptions,
    cancel: CancellationFlag,
}

impl<T: ProcessingTools> BatchRunner<T> {
    pub fn new(config: Configuration, pairs: Vec<PairSpec>, layout: BatchLayout, tools: T) -> Self {
        Self {
            config,
            pairs,
            layout,
            tools,
            options: BatchOptions::default(),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    pub fn layout(&self) -> &BatchLayout {
        &self.layout
    }

    /// Handle for cancelling the run from another thread
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Run the configured stages
    ///
    /// Returns `Err` only for preflight failures, stage-1 failures and
    /// cancellation before stage 2. Pair outcomes, failed and cancelled ones
    /// included, are in the report; check [`BatchReport::is_success`].
    pub fn run(&self) -> BatchResult<BatchReport> {
        let started_at = Utc::now();
        let start = self.config.proc_stage;
        let stop = self.options.stop_after;

        if stop < start {
            return Err(BatchError::PreconditionViolation(format!(
                "stop stage {} comes before proc_stage {}",
                stop, start
            )));
        }

        let run_topography = start <= StageGate::TOPOGRAPHY;
        let run_interferograms = stop >= StageGate::INTERFEROGRAM;
        log::info!(
            "Batch root {} running stages {}..={}",
            self.layout.root().display(),
            start,
            stop
        );

        // Preflight: nothing is written until these pass
        if run_interferograms && self.config.geocode_requested() && !self.config.topo_phase {
            return Err(BatchError::PreconditionViolation(
                "threshold_geocode is set but topo_phase = 0; geocoding needs the \
                 radar-to-map transform from the topography stage"
                    .to_string(),
            ));
        }

        let resolved = if run_interferograms {
            resolve_pairs(&self.layout, &self.pairs)?
        } else {
            Vec::new()
        };

        let topography_stage = TopographyStage::new(&self.config, &self.layout, &self.tools);
        let master = if run_topography && self.config.topo_phase {
            let master = self.master_image()?;
            topography_stage.check_inputs(&master)?;
            Some(master)
        } else {
            None
        };

        let (topo, topography) = if !self.config.topo_phase {
            if run_topography {
                log::info!("Stage 1: topo_phase = 0, nothing to do");
            }
            (None, TopographyStatus::Disabled)
        } else if let Some(master) = &master {
            (topography_stage.run(master)?, TopographyStatus::Built)
        } else if run_interferograms {
            (
                Some(TopoProducts::locate(&self.layout, self.config.shift_topo)?),
                TopographyStatus::Reused,
            )
        } else {
            (None, TopographyStatus::Reused)
        };

        self.cancel.check()?;

        let landmask = LandmaskCache::new();
        let pairs = if run_interferograms {
            self.run_pairs(&resolved, topo.as_ref(), &landmask)?
        } else {
            log::info!("Stopping after stage {}", stop);
            Vec::new()
        };

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            proc_stage: start,
            stop_after: stop,
            topography,
            landmask_builds: landmask.builds(),
            pairs,
        };

        log::info!(
            "Batch finished: {} published, {} skipped, {} failed, {} cancelled",
            report.published(),
            report.skipped(),
            report.failed(),
            report.cancelled()
        );
        Ok(report)
    }

    fn master_image(&self) -> BatchResult<String> {
        if let Some(master) = &self.config.master_image {
            return Ok(master.clone());
        }

        let first = self
            .pairs
            .first()
            .ok_or_else(|| BatchError::MissingKey("master_image".to_string()))?;
        log::warn!(
            "master_image not set, using reference of the first pair: {}",
            first.reference
        );
        Ok(first.reference.clone())
    }

    fn run_pairs(
        &self,
        pairs: &[ResolvedPair],
        topo: Option<&TopoProducts>,
        landmask: &LandmaskCache,
    ) -> BatchResult<Vec<PairReport>> {
        log::info!("Stage 2: {} pair(s), {} worker(s)", pairs.len(), self.options.workers);

        let publisher = ResultPublisher::new(self.layout.results_dir());
        let stage = InterferogramStage::new(
            &self.config,
            &self.layout,
            &self.tools,
            topo,
            landmask,
            &publisher,
            &self.cancel,
        );

        let process = |pair: &ResolvedPair| self.process_pair(&stage, &publisher, pair);

        let reports: Vec<PairReport> = if self.options.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.workers)
                .build()
                .map_err(|e| BatchError::Processing(format!("Failed to start workers: {}", e)))?;
            pool.install(|| pairs.par_iter().map(process).collect())
        } else {
            pairs.iter().map(process).collect()
        };

        if self.cancel.is_cancelled() {
            log::warn!("Batch cancelled; unfinished pairs were not published");
        }

        Ok(reports)
    }

    fn process_pair(
        &self,
        stage: &InterferogramStage<'_>,
        publisher: &ResultPublisher,
        pair: &ResolvedPair,
    ) -> PairReport {
        let report = |outcome| PairReport {
            reference: pair.spec.reference.clone(),
            repeat: pair.spec.repeat.clone(),
            key: pair.key,
            outcome,
        };

        if self.cancel.is_cancelled() {
            return report(PairOutcome::Cancelled);
        }

        if self.options.skip_published && publisher.is_published(&pair.key) {
            log::info!("Pair {} already published, skipping", pair.key);
            return report(PairOutcome::Skipped {
                reason: "already published".to_string(),
            });
        }

        match stage.process_pair(pair) {
            Ok(products) => report(PairOutcome::Published(products)),
            Err(BatchError::Cancelled) => {
                log::warn!("Pair {} cancelled before publication", pair.key);
                report(PairOutcome::Cancelled)
            }
            Err(e) => {
                log::error!("Pair {} ({}) failed: {}", pair.key, pair.spec, e);
                if self.options.failure_policy == FailurePolicy::FailFast {
                    log::warn!("Fail-fast: cancelling remaining pairs");
                    self.cancel.cancel();
                }
                report(PairOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prm(layout: &BatchLayout, id: &str, clock: &str) {
        fs::create_dir_all(layout.raw_dir()).unwrap();
        fs::write(
            layout.prm_path(id),
            format!("SC_clock_start = {}\n", clock),
        )
        .unwrap();
    }

    fn spec(reference: &str, repeat: &str, line: usize) -> PairSpec {
        PairSpec {
            reference: reference.to_string(),
            repeat: repeat.to_string(),
            line,
        }
    }

    #[test]
    fn test_resolve_pairs_keys() {
        let root = TempDir::new().unwrap();
        let layout = BatchLayout::new(root.path()).unwrap();
        write_prm(&layout, "A", "2015146.59");
        write_prm(&layout, "B", "2015158.59");

        let resolved = resolve_pairs(&layout, &[spec("A", "B", 1)]).unwrap();
        assert_eq!(resolved[0].key.dir_name(), "2015146_2015158");
    }

    #[test]
    fn test_resolve_pairs_rejects_collisions() {
        let root = TempDir::new().unwrap();
        let layout = BatchLayout::new(root.path()).unwrap();
        write_prm(&layout, "A", "2015146.1");
        write_prm(&layout, "A2", "2015146.9");
        write_prm(&layout, "B", "2015158.5");

        let err = resolve_pairs(&layout, &[spec("A", "B", 1), spec("A2", "B", 2)]).unwrap_err();
        assert!(matches!(
            err,
            BatchError::DuplicatePairKey {
                first_line: 1,
                second_line: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_cancellation_flag() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(flag.check().is_ok());
        handle.cancel();
        assert!(matches!(flag.check(), Err(BatchError::Cancelled)));
    }
}
