use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{CandidateStructure, ProteinId, StructureId};
use crate::download::DownloadCoordinator;
use crate::error::SelectorError;
use crate::pdbe::CandidateResolver;
use crate::rcsb::{MetadataFetcher, StructureSource};
use crate::select;

/// Shared stop flag. Once cancelled, tasks that have not started yet are
/// recorded as [`Outcome::Cancelled`]; running ones finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Selected { structure_id: StructureId },
    NoCandidates,
    NoUsableMetadata { candidates: usize },
    DownloadFailed { structure_id: StructureId },
    TaskFailed { message: String },
    Cancelled,
}

impl Outcome {
    pub fn structure_id(&self) -> Option<&StructureId> {
        match self {
            Outcome::Selected { structure_id } => Some(structure_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub protein_id: ProteinId,
    pub selected_structure_id: Option<StructureId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub selected: usize,
    pub no_candidates: usize,
    pub no_usable_metadata: usize,
    pub download_failed: usize,
    pub task_failed: usize,
    pub cancelled: usize,
}

/// One entry per distinct input protein, resolved or not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionMapping {
    entries: BTreeMap<ProteinId, Outcome>,
}

impl ResolutionMapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, protein: &ProteinId) -> bool {
        self.entries.contains_key(protein)
    }

    /// `None` when the protein was not part of the run, `Some(None)` when
    /// it was but nothing usable came out.
    pub fn selected(&self, protein: &ProteinId) -> Option<Option<&StructureId>> {
        self.entries.get(protein).map(Outcome::structure_id)
    }

    pub fn outcome(&self, protein: &ProteinId) -> Option<&Outcome> {
        self.entries.get(protein)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProteinId, Option<&StructureId>)> {
        self.entries
            .iter()
            .map(|(protein, outcome)| (protein, outcome.structure_id()))
    }

    pub fn results(&self) -> Vec<ResolutionResult> {
        self.iter()
            .map(|(protein, structure)| ResolutionResult {
                protein_id: protein.clone(),
                selected_structure_id: structure.cloned(),
            })
            .collect()
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for outcome in self.entries.values() {
            match outcome {
                Outcome::Selected { .. } => counts.selected += 1,
                Outcome::NoCandidates => counts.no_candidates += 1,
                Outcome::NoUsableMetadata { .. } => counts.no_usable_metadata += 1,
                Outcome::DownloadFailed { .. } => counts.download_failed += 1,
                Outcome::TaskFailed { .. } => counts.task_failed += 1,
                Outcome::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

/// Resolves, scores and downloads one structure per protein on a worker
/// pool owned by this instance.
pub struct ResolutionPipeline<R, M, S>
where
    R: CandidateResolver,
    M: MetadataFetcher,
    S: StructureSource,
{
    resolver: R,
    metadata: M,
    downloads: DownloadCoordinator<S>,
    pool: ThreadPool,
}

impl<R, M, S> ResolutionPipeline<R, M, S>
where
    R: CandidateResolver,
    M: MetadataFetcher,
    S: StructureSource,
{
    pub fn new(
        resolver: R,
        metadata: M,
        downloads: DownloadCoordinator<S>,
        workers: usize,
    ) -> Result<Self, SelectorError> {
        if workers == 0 {
            return Err(SelectorError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("kira-ss-worker-{index}"))
            .build()
            .map_err(|err| SelectorError::WorkerPool(err.to_string()))?;
        Ok(Self {
            resolver,
            metadata,
            downloads,
            pool,
        })
    }

    pub fn downloads(&self) -> &DownloadCoordinator<S> {
        &self.downloads
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Blocks until every task has finished. Duplicate inputs collapse into
    /// a single task.
    pub fn run<I>(&self, proteins: I, cancel: &CancellationToken) -> ResolutionMapping
    where
        I: IntoIterator<Item = ProteinId>,
    {
        let unique: Vec<ProteinId> = proteins
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!(proteins = unique.len(), workers = self.workers(), "starting resolution run");

        let outcomes: Vec<(ProteinId, Outcome)> = self.pool.install(|| {
            unique
                .into_par_iter()
                .map(|protein| {
                    let outcome = self.run_task(&protein, cancel);
                    (protein, outcome)
                })
                .collect()
        });

        let mapping = ResolutionMapping {
            entries: outcomes.into_iter().collect(),
        };
        let counts = mapping.counts();
        info!(
            selected = counts.selected,
            no_candidates = counts.no_candidates,
            no_usable_metadata = counts.no_usable_metadata,
            download_failed = counts.download_failed,
            task_failed = counts.task_failed,
            cancelled = counts.cancelled,
            "resolution run finished"
        );
        mapping
    }

    fn run_task(&self, protein: &ProteinId, cancel: &CancellationToken) -> Outcome {
        if cancel.is_cancelled() {
            debug!(protein = %protein, "skipped after cancellation");
            return Outcome::Cancelled;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(protein))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(protein = %protein, error = %message, "task failed");
                Outcome::TaskFailed { message }
            }
        }
    }

    fn process(&self, protein: &ProteinId) -> Outcome {
        let candidates = self.resolver.resolve(protein);
        let structure_id = match self.choose(protein, candidates) {
            Ok(structure_id) => structure_id,
            Err(outcome) => return outcome,
        };

        if self.downloads.ensure_downloaded(&structure_id) {
            info!(protein = %protein, structure = %structure_id, "selected");
            Outcome::Selected { structure_id }
        } else {
            warn!(
                protein = %protein,
                structure = %structure_id,
                "structure selected but download failed"
            );
            Outcome::DownloadFailed { structure_id }
        }
    }

    /// Metadata is only fetched when there is something to compare.
    fn choose(
        &self,
        protein: &ProteinId,
        candidates: Vec<CandidateStructure>,
    ) -> Result<StructureId, Outcome> {
        let total = candidates.len();
        if total == 0 {
            info!(protein = %protein, "no candidate structures");
            return Err(Outcome::NoCandidates);
        }

        let scored: Vec<_> = if total == 1 {
            candidates.into_iter().map(|candidate| (candidate, None)).collect()
        } else {
            candidates
                .into_iter()
                .map(|candidate| {
                    let metadata = self.metadata.fetch(&candidate.structure_id);
                    (candidate, metadata)
                })
                .collect()
        };

        select::select(&scored).ok_or_else(|| {
            warn!(protein = %protein, candidates = total, "no candidate had usable metadata");
            Outcome::NoUsableMetadata { candidates: total }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
