#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;

use kira_structure_selector::domain::{
    CandidateStructure, ExperimentalMethod, ProteinId, StructureFormat, StructureId,
    StructureMetadata,
};
use kira_structure_selector::error::SelectorError;
use kira_structure_selector::pdbe::CandidateResolver;
use kira_structure_selector::rcsb::{MetadataFetcher, StructureSource};
use kira_structure_selector::store::Store;

pub fn protein(id: &str) -> ProteinId {
    id.parse().unwrap()
}

pub fn structure(id: &str) -> StructureId {
    id.parse().unwrap()
}

pub fn meta(method: ExperimentalMethod, citations: u64, coverage: f64) -> StructureMetadata {
    StructureMetadata {
        method,
        citation_count: citations,
        polymer_coverage: coverage,
    }
}

pub fn temp_store(temp: &tempfile::TempDir) -> Store {
    let root = Utf8PathBuf::from_path_buf(temp.path().join("pdb_files")).unwrap();
    Store::new(root, StructureFormat::Pdb)
}

/// Canned candidate lists. Proteins listed in `panics` blow up inside the
/// resolver to simulate an unexpected task failure.
#[derive(Default)]
pub struct MockResolver {
    pub candidates: HashMap<String, Vec<&'static str>>,
    pub panics: Vec<String>,
    pub calls: AtomicUsize,
}

impl MockResolver {
    pub fn with(mut self, protein: &str, structures: &[&'static str]) -> Self {
        self.candidates
            .insert(protein.to_string(), structures.to_vec());
        self
    }

    pub fn panicking(mut self, protein: &str) -> Self {
        self.panics.push(protein.to_string());
        self
    }
}

impl CandidateResolver for MockResolver {
    fn resolve(&self, protein: &ProteinId) -> Vec<CandidateStructure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics.iter().any(|id| id == protein.as_str()) {
            panic!("resolver exploded for {protein}");
        }
        self.candidates
            .get(protein.as_str())
            .map(|ids| {
                ids.iter()
                    .enumerate()
                    .map(|(rank, id)| CandidateStructure {
                        structure_id: id.parse().unwrap(),
                        source_rank: rank,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct MockMetadata {
    pub entries: HashMap<String, StructureMetadata>,
    pub calls: Mutex<Vec<String>>,
}

impl MockMetadata {
    pub fn with(mut self, id: &str, metadata: StructureMetadata) -> Self {
        self.entries.insert(id.to_string(), metadata);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MetadataFetcher for MockMetadata {
    fn fetch(&self, id: &StructureId) -> Option<StructureMetadata> {
        self.calls.lock().unwrap().push(id.to_string());
        self.entries.get(id.as_str()).cloned()
    }
}

/// Serves `HEADER <id>` for every id except those in `failing`. The delay
/// widens the window in which concurrent callers could race.
#[derive(Default)]
pub struct MockSource {
    pub failing: Vec<String>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == id)
            .count()
    }
}

impl StructureSource for MockSource {
    fn fetch_structure(
        &self,
        id: &StructureId,
        _format: StructureFormat,
    ) -> Result<Vec<u8>, SelectorError> {
        self.calls.lock().unwrap().push(id.to_string());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.failing.iter().any(|failing| failing == id.as_str()) {
            return Err(SelectorError::RcsbStatus {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(format!("HEADER {id}\n").into_bytes())
    }
}
