use std::fs;
use std::io::Write;
use std::path::Path;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tempfile::Builder;
use tracing::warn;

use crate::domain::ProteinId;
use crate::error::SelectorError;
use crate::pipeline::ResolutionMapping;

pub const DEFAULT_INPUT_COLUMN: &str = "Entry";
pub const DEFAULT_OUTPUT_COLUMN: &str = "Selected_PDB";

/// `.csv` is comma separated; everything else is read as TSV, which is what
/// UniProt exports.
pub fn delimiter_for(path: &Utf8Path) -> u8 {
    match path.extension().map(str::to_ascii_lowercase).as_deref() {
        Some("csv") => b',',
        _ => b'\t',
    }
}

/// One id per line. Blank lines and `#` comments are skipped; lines that
/// are not a single identifier are skipped with a warning, as table rows are.
pub fn read_id_list(path: &Utf8Path) -> Result<Vec<ProteinId>, SelectorError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| input_error(path, err))?;
    let mut ids = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<ProteinId>() {
            Ok(id) => ids.push(id),
            Err(err) => warn!(line = number + 1, error = %err, "skipping input line"),
        }
    }
    Ok(ids)
}

/// Delimited table with a header row, kept in memory so it can be written
/// back with an extra column.
#[derive(Debug, Clone)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    delimiter: u8,
}

impl Table {
    pub fn read(path: &Utf8Path, delimiter: u8) -> Result<Self, SelectorError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path.as_std_path())
            .map_err(|err| input_error(path, err))?;
        let headers = reader
            .headers()
            .map_err(|err| input_error(path, err))?
            .clone();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| input_error(path, err))?;
        Ok(Self {
            headers,
            rows,
            delimiter,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, column: &str) -> Result<usize, SelectorError> {
        self.headers
            .iter()
            .position(|name| name.trim() == column)
            .ok_or_else(|| SelectorError::MissingColumn(column.to_string()))
    }

    /// Ids from `column` in row order. Rows with an empty cell are skipped;
    /// repeated ids are kept, the pipeline collapses them.
    pub fn protein_ids(&self, column: &str) -> Result<Vec<ProteinId>, SelectorError> {
        let index = self.column_index(column)?;
        let mut ids = Vec::with_capacity(self.rows.len());
        for (line, row) in self.rows.iter().enumerate() {
            match row.get(index).map(str::parse::<ProteinId>) {
                Some(Ok(id)) => ids.push(id),
                _ => warn!(row = line + 1, column, "row has no valid protein identifier, skipped"),
            }
        }
        Ok(ids)
    }

    /// Copy of the table with `output_column` filled from the mapping,
    /// replacing an existing column of that name.
    pub fn annotate(
        &self,
        input_column: &str,
        output_column: &str,
        mapping: &ResolutionMapping,
        absent_marker: &str,
    ) -> Result<Table, SelectorError> {
        let input = self.column_index(input_column)?;
        let existing = self.headers.iter().position(|name| name == output_column);

        let mut headers = self.headers.clone();
        if existing.is_none() {
            headers.push_field(output_column);
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let value = row
                    .get(input)
                    .and_then(|cell| cell.parse::<ProteinId>().ok())
                    .and_then(|id| mapping.selected(&id).flatten().map(|s| s.to_string()))
                    .unwrap_or_else(|| absent_marker.to_string());
                let mut fields: Vec<String> = row.iter().map(str::to_string).collect();
                match existing {
                    Some(index) => {
                        if fields.len() <= index {
                            fields.resize(index + 1, String::new());
                        }
                        fields[index] = value;
                    }
                    None => {
                        if fields.len() < headers.len() - 1 {
                            fields.resize(headers.len() - 1, String::new());
                        }
                        fields.push(value);
                    }
                }
                StringRecord::from(fields)
            })
            .collect();

        Ok(Table {
            headers,
            rows,
            delimiter: self.delimiter,
        })
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), SelectorError> {
        let mut buffer = Vec::new();
        {
            let mut writer = WriterBuilder::new()
                .delimiter(self.delimiter)
                .flexible(true)
                .from_writer(&mut buffer);
            writer
                .write_record(&self.headers)
                .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
            for row in &self.rows {
                writer
                    .write_record(row)
                    .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
            }
            writer
                .flush()
                .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
        }
        write_atomic(path, &buffer)
    }
}

/// Two-column TSV, sorted by protein id, absent selections written as
/// `absent_marker`.
pub fn write_mapping(
    path: &Utf8Path,
    mapping: &ResolutionMapping,
    absent_marker: &str,
) -> Result<(), SelectorError> {
    let mut buffer = Vec::new();
    {
        let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(&mut buffer);
        writer
            .write_record(["protein_id", "structure_id"])
            .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
        for (protein, structure) in mapping.iter() {
            let structure = structure.map(|id| id.as_str()).unwrap_or(absent_marker);
            writer
                .write_record([protein.as_str(), structure])
                .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    }
    write_atomic(path, &buffer)
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SelectorError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.as_std_path(),
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".kira-ss-table")
        .tempfile_in(parent)
        .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| SelectorError::Filesystem(err.to_string()))?;
    Ok(())
}

fn input_error(path: &Utf8Path, err: impl std::fmt::Display) -> SelectorError {
    SelectorError::InputRead {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    }
}
