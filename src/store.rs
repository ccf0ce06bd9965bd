use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tempfile::Builder;

use crate::domain::{StructureFormat, StructureId};
use crate::error::SelectorError;

/// Flat directory of `<id>.<ext>` structure files.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
    format: StructureFormat,
}

impl Store {
    pub fn new(root: Utf8PathBuf, format: StructureFormat) -> Self {
        Self { root, format }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn format(&self) -> StructureFormat {
        self.format
    }

    pub fn structure_path(&self, id: &StructureId) -> Utf8PathBuf {
        self.root.join(id.file_name(self.format))
    }

    pub fn ensure_root(&self) -> Result<(), SelectorError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| SelectorError::Filesystem(format!("create {}: {err}", self.root)))
    }

    /// Ids of structure files already present. Names are matched
    /// case-insensitively; anything else in the directory is ignored.
    pub fn existing_structures(&self) -> Result<Vec<StructureId>, SelectorError> {
        if !self.root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let pattern = Regex::new(&format!(
            r"(?i)^([0-9][a-z0-9]{{3}})\.{}$",
            regex::escape(self.format.extension())
        ))
        .map_err(|err| SelectorError::Filesystem(err.to_string()))?;

        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SelectorError::Filesystem(err.to_string()))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(caps) = pattern.captures(name) {
                ids.push(caps[1].parse::<StructureId>()?);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Writes through a temp file in the same directory so a crash never
    /// leaves a truncated file under the final name.
    pub fn write_structure(&self, id: &StructureId, content: &[u8]) -> Result<Utf8PathBuf, SelectorError> {
        let path = self.structure_path(id);
        let mut temp = Builder::new()
            .prefix(".kira-ss")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
        Ok(path)
    }
}
