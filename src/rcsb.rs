use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ResolvedConfig;
use crate::domain::{ExperimentalMethod, StructureFormat, StructureId, StructureMetadata};
use crate::error::SelectorError;
use crate::http;

/// Quality attributes for one entry. `None` means "leave this candidate
/// out of scoring", never a fatal condition.
pub trait MetadataFetcher: Send + Sync {
    fn fetch(&self, id: &StructureId) -> Option<StructureMetadata>;
}

/// Raw structure file bytes.
pub trait StructureSource: Send + Sync {
    fn fetch_structure(
        &self,
        id: &StructureId,
        format: StructureFormat,
    ) -> Result<Vec<u8>, SelectorError>;
}

impl<T: MetadataFetcher + ?Sized> MetadataFetcher for Arc<T> {
    fn fetch(&self, id: &StructureId) -> Option<StructureMetadata> {
        (**self).fetch(id)
    }
}

impl<T: StructureSource + ?Sized> StructureSource for Arc<T> {
    fn fetch_structure(
        &self,
        id: &StructureId,
        format: StructureFormat,
    ) -> Result<Vec<u8>, SelectorError> {
        (**self).fetch_structure(id, format)
    }
}

#[derive(Clone)]
pub struct RcsbHttpClient {
    client: Client,
    data_base: String,
    files_base: String,
    metadata_timeout: Duration,
    download_timeout: Duration,
    max_retries: usize,
}

impl RcsbHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, SelectorError> {
        let ceiling = config.timeouts.metadata.max(config.timeouts.download);
        let client = http::build_client(ceiling).map_err(http::client_build_error)?;
        Ok(Self {
            client,
            data_base: config.endpoints.rcsb_data.clone(),
            files_base: config.endpoints.rcsb_files.clone(),
            metadata_timeout: config.timeouts.metadata,
            download_timeout: config.timeouts.download,
            max_retries: config.max_retries,
        })
    }

    pub fn structure_url(&self, id: &StructureId, format: StructureFormat) -> String {
        format!("{}/download/{}", self.files_base, id.file_name(format))
    }

    pub fn metadata_url(&self, id: &StructureId) -> String {
        format!("{}/rest/v1/core/entry/{}", self.data_base, id.as_str())
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::blocking::Response, SelectorError> {
        let response =
            http::send_with_retries(self.max_retries, || self.client.get(url).timeout(timeout))
                .map_err(|err| SelectorError::RcsbHttp(err.to_string()))?;
        http::check_status(response)
            .map_err(|(status, message)| SelectorError::RcsbStatus { status, message })
    }

    fn try_fetch_metadata(&self, id: &StructureId) -> Result<StructureMetadata, SelectorError> {
        let url = self.metadata_url(id);
        let response = self.get(&url, self.metadata_timeout)?;
        let raw_json: Value = response
            .json()
            .map_err(|err| SelectorError::MalformedPayload(err.to_string()))?;
        extract_metadata(&raw_json)
            .ok_or_else(|| SelectorError::MalformedPayload(format!("{url}: not a JSON object")))
    }
}

impl MetadataFetcher for RcsbHttpClient {
    fn fetch(&self, id: &StructureId) -> Option<StructureMetadata> {
        match self.try_fetch_metadata(id) {
            Ok(metadata) => {
                debug!(structure = %id, method = %metadata.method, "fetched metadata");
                Some(metadata)
            }
            Err(err) => {
                warn!(structure = %id, error = %err, "metadata unavailable, candidate excluded");
                None
            }
        }
    }
}

impl StructureSource for RcsbHttpClient {
    fn fetch_structure(
        &self,
        id: &StructureId,
        format: StructureFormat,
    ) -> Result<Vec<u8>, SelectorError> {
        let url = self.structure_url(id, format);
        let response = self.get(&url, self.download_timeout)?;
        let bytes = response
            .bytes()
            .map_err(|err| SelectorError::RcsbHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Pulls scoring attributes out of an RCSB core entry document.
///
/// Missing fields fall back to `UNKNOWN`/0/0; only a payload that is not an
/// object at all yields `None`.
pub fn extract_metadata(raw_json: &Value) -> Option<StructureMetadata> {
    raw_json.as_object()?;

    let method = raw_json
        .get("exptl")
        .and_then(|value| value.as_array())
        .and_then(|array| array.first())
        .and_then(|value| value.get("method"))
        .and_then(|value| value.as_str())
        .map(ExperimentalMethod::from_rcsb)
        .unwrap_or(ExperimentalMethod::Unknown);
    let citation_count = raw_json
        .get("rcsb_accession_info")
        .and_then(|value| value.get("rcsb_citation_count"))
        .and_then(|value| value.as_u64())
        .unwrap_or(0);
    let polymer_coverage = raw_json
        .get("rcsb_entry_info")
        .and_then(|value| value.get("polymer_coverage"))
        .and_then(|value| value.as_f64())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    Some(StructureMetadata {
        method,
        citation_count,
        polymer_coverage,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_for_missing_fields() {
        let meta = extract_metadata(&json!({"struct": {"title": "x"}})).unwrap();
        assert_eq!(meta.method, ExperimentalMethod::Unknown);
        assert_eq!(meta.citation_count, 0);
        assert_eq!(meta.polymer_coverage, 0.0);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(extract_metadata(&json!([1, 2, 3])).is_none());
        assert!(extract_metadata(&json!("oops")).is_none());
    }

    #[test]
    fn coverage_is_clamped() {
        let meta = extract_metadata(&json!({"rcsb_entry_info": {"polymer_coverage": 1.7}})).unwrap();
        assert_eq!(meta.polymer_coverage, 1.0);
    }

    #[test]
    fn url_layout() {
        let client = RcsbHttpClient::new(&ResolvedConfig::default()).unwrap();
        let id: StructureId = "1A3N".parse().unwrap();
        assert_eq!(
            client.structure_url(&id, StructureFormat::Pdb),
            "https://files.rcsb.org/download/1a3n.pdb"
        );
        assert_eq!(
            client.metadata_url(&id),
            "https://data.rcsb.org/rest/v1/core/entry/1a3n"
        );
    }
}
