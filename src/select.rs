//! Candidate scoring. Pure functions, no I/O.

use crate::domain::{CandidateStructure, ExperimentalMethod, StructureId, StructureMetadata};

const METHOD_WEIGHT: f64 = 1000.0;
const CITATION_WEIGHT: f64 = 10.0;

pub fn method_rank(method: &ExperimentalMethod) -> u32 {
    match method {
        ExperimentalMethod::Xray => 4,
        ExperimentalMethod::Em => 3,
        ExperimentalMethod::Nmr => 1,
        ExperimentalMethod::Unknown | ExperimentalMethod::Other(_) => 0,
    }
}

pub fn score(metadata: &StructureMetadata) -> f64 {
    f64::from(method_rank(&metadata.method)) * METHOD_WEIGHT
        + metadata.citation_count as f64 * CITATION_WEIGHT
        + metadata.polymer_coverage
}

/// Picks the representative structure.
///
/// A single candidate is returned as-is, whatever its metadata. Otherwise
/// candidates without metadata are skipped and the highest score wins; on
/// equal scores the earlier candidate is kept.
pub fn select(candidates: &[(CandidateStructure, Option<StructureMetadata>)]) -> Option<StructureId> {
    if let [(only, _)] = candidates {
        return Some(only.structure_id.clone());
    }

    let mut best: Option<(&CandidateStructure, f64)> = None;
    for (candidate, metadata) in candidates {
        let Some(metadata) = metadata else {
            continue;
        };
        let value = score(metadata);
        let replaces = best.is_none_or(|(_, best_value)| value > best_value);
        if replaces {
            best = Some((candidate, value));
        }
    }
    best.map(|(candidate, _)| candidate.structure_id.clone())
}
