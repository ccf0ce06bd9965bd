use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ResolvedConfig;
use crate::domain::{CandidateStructure, ProteinId, StructureId};
use crate::error::SelectorError;
use crate::http;

/// Maps a protein to the structures that cover it.
///
/// Never fails: an unreachable service or an unknown protein both yield an
/// empty list.
pub trait CandidateResolver: Send + Sync {
    fn resolve(&self, protein: &ProteinId) -> Vec<CandidateStructure>;
}

impl<T: CandidateResolver + ?Sized> CandidateResolver for Arc<T> {
    fn resolve(&self, protein: &ProteinId) -> Vec<CandidateStructure> {
        (**self).resolve(protein)
    }
}

/// PDBe SIFTS `best_structures` client.
#[derive(Clone)]
pub struct PdbeHttpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: usize,
}

impl PdbeHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, SelectorError> {
        let client = http::build_client(config.timeouts.resolve).map_err(http::client_build_error)?;
        Ok(Self {
            client,
            base_url: config.endpoints.pdbe.clone(),
            timeout: config.timeouts.resolve,
            max_retries: config.max_retries,
        })
    }

    pub fn best_structures_url(&self, protein: &ProteinId) -> String {
        format!("{}/mappings/best_structures/{}", self.base_url, protein.as_str())
    }

    fn try_resolve(&self, protein: &ProteinId) -> Result<Vec<CandidateStructure>, SelectorError> {
        let url = self.best_structures_url(protein);
        let response =
            http::send_with_retries(self.max_retries, || self.client.get(&url).timeout(self.timeout))
                .map_err(|err| SelectorError::PdbeHttp(err.to_string()))?;
        let response = http::check_status(response)
            .map_err(|(status, message)| SelectorError::PdbeStatus { status, message })?;
        let payload: Value = response
            .json()
            .map_err(|err| SelectorError::MalformedPayload(err.to_string()))?;
        Ok(extract_candidates(protein, &payload))
    }
}

impl CandidateResolver for PdbeHttpClient {
    fn resolve(&self, protein: &ProteinId) -> Vec<CandidateStructure> {
        match self.try_resolve(protein) {
            Ok(candidates) => {
                debug!(protein = %protein, candidates = candidates.len(), "resolved candidates");
                candidates
            }
            // PDBe answers 404 for accessions without any mapped structure.
            Err(SelectorError::PdbeStatus { status: 404, .. }) => {
                debug!(protein = %protein, "no structures mapped");
                Vec::new()
            }
            Err(err) => {
                warn!(protein = %protein, error = %err, "candidate resolution failed");
                Vec::new()
            }
        }
    }
}

/// Reads `{"<protein>": [{"pdb_id": ...}, ...]}` keeping response order;
/// `source_rank` is the position in that array. Unparseable and repeated ids
/// are skipped.
pub fn extract_candidates(protein: &ProteinId, payload: &Value) -> Vec<CandidateStructure> {
    let Some(entries) = payload.get(protein.as_str()).and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (rank, entry) in entries.iter().enumerate() {
        let Some(raw) = entry.get("pdb_id").and_then(Value::as_str) else {
            continue;
        };
        let structure_id = match raw.parse::<StructureId>() {
            Ok(id) => id,
            Err(err) => {
                warn!(protein = %protein, error = %err, "skipping candidate");
                continue;
            }
        };
        if seen.insert(structure_id.clone()) {
            candidates.push(CandidateStructure {
                structure_id,
                source_rank: rank,
            });
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_key_means_no_candidates() {
        let protein: ProteinId = "P69905".parse().unwrap();
        let payload = json!({"Q00000": [{"pdb_id": "1a3n"}]});
        assert!(extract_candidates(&protein, &payload).is_empty());
        assert!(extract_candidates(&protein, &json!([])).is_empty());
    }

    #[test]
    fn url_layout() {
        let config = ResolvedConfig::default();
        let client = PdbeHttpClient::new(&config).unwrap();
        let protein: ProteinId = "P69905".parse().unwrap();
        assert_eq!(
            client.best_structures_url(&protein),
            "https://www.ebi.ac.uk/pdbe/api/mappings/best_structures/P69905"
        );
    }
}
