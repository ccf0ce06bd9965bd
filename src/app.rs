use camino::Utf8PathBuf;
use chrono::Utc;

use crate::config::ResolvedConfig;
use crate::domain::{CandidateStructure, StructureId};
use crate::download::DownloadCoordinator;
use crate::error::SelectorError;
use crate::output::{RunReport, ScoreEntry, ScoreResult};
use crate::pdbe::{CandidateResolver, PdbeHttpClient};
use crate::pipeline::{CancellationToken, ResolutionPipeline};
use crate::rcsb::{MetadataFetcher, RcsbHttpClient, StructureSource};
use crate::select;
use crate::store::Store;
use crate::table::{self, DEFAULT_INPUT_COLUMN, DEFAULT_OUTPUT_COLUMN, Table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    List(Utf8PathBuf),
    Table { path: Utf8PathBuf, column: String },
}

impl InputSource {
    /// `.csv`/`.tsv` files, or any file when a column is named, are tables.
    pub fn detect(path: Utf8PathBuf, column: Option<String>) -> Self {
        let is_table = matches!(
            path.extension().map(str::to_ascii_lowercase).as_deref(),
            Some("csv" | "tsv")
        );
        match column {
            Some(column) => InputSource::Table { path, column },
            None if is_table => InputSource::Table {
                path,
                column: DEFAULT_INPUT_COLUMN.to_string(),
            },
            None => InputSource::List(path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub input: InputSource,
    pub mapping: Option<Utf8PathBuf>,
    pub annotate: Option<Utf8PathBuf>,
}

pub struct App<R, M, S>
where
    R: CandidateResolver,
    M: MetadataFetcher,
    S: StructureSource,
{
    pipeline: ResolutionPipeline<R, M, S>,
    absent_marker: String,
}

pub type HttpApp = App<PdbeHttpClient, RcsbHttpClient, RcsbHttpClient>;

impl HttpApp {
    /// Builds clients, worker pool and the seeded registry. Fails before any
    /// protein is dispatched when the destination is unusable.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, SelectorError> {
        let pdbe = PdbeHttpClient::new(config)?;
        let rcsb = RcsbHttpClient::new(config)?;
        let store = Store::new(config.destination.clone(), config.format);
        let downloads = DownloadCoordinator::new(rcsb.clone(), store)?;
        let pipeline = ResolutionPipeline::new(pdbe, rcsb, downloads, config.workers)?;
        Ok(App::new(pipeline, config.absent_marker.clone()))
    }
}

impl<R, M, S> App<R, M, S>
where
    R: CandidateResolver,
    M: MetadataFetcher,
    S: StructureSource,
{
    pub fn new(pipeline: ResolutionPipeline<R, M, S>, absent_marker: String) -> Self {
        Self {
            pipeline,
            absent_marker,
        }
    }

    pub fn pipeline(&self) -> &ResolutionPipeline<R, M, S> {
        &self.pipeline
    }

    pub fn resolve(
        &self,
        request: &ResolveRequest,
        cancel: &CancellationToken,
    ) -> Result<RunReport, SelectorError> {
        let started_at = Utc::now();

        let (proteins, source_table) = match &request.input {
            InputSource::List(path) => {
                if request.annotate.is_some() {
                    return Err(SelectorError::InvalidConfig(
                        "--annotate needs a table input with a header row".to_string(),
                    ));
                }
                (table::read_id_list(path)?, None)
            }
            InputSource::Table { path, column } => {
                let input = Table::read(path, table::delimiter_for(path))?;
                let proteins = input.protein_ids(column)?;
                (proteins, Some((input, column.as_str())))
            }
        };

        let mapping = self.pipeline.run(proteins, cancel);
        let downloads = self.pipeline.downloads();
        let mut report = RunReport::new(
            started_at,
            downloads.store().root().to_string(),
            &mapping,
            downloads.stats(),
        );

        if let Some(path) = &request.mapping {
            table::write_mapping(path, &mapping, &self.absent_marker)?;
            report.mapping_path = Some(path.to_string());
        }
        if let (Some(path), Some((input, column))) = (&request.annotate, source_table) {
            input
                .annotate(column, DEFAULT_OUTPUT_COLUMN, &mapping, &self.absent_marker)?
                .write(path)?;
            report.annotated_path = Some(path.to_string());
        }

        Ok(report)
    }
}

/// Scores the given entries the same way a resolution run would, without
/// downloading anything.
pub fn score_structures<M: MetadataFetcher>(metadata: &M, ids: &[StructureId]) -> ScoreResult {
    let fetched: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(rank, id)| {
            let candidate = CandidateStructure {
                structure_id: id.clone(),
                source_rank: rank,
            };
            (candidate, metadata.fetch(id))
        })
        .collect();

    // `select` accepts a lone candidate unconditionally; here it still needs
    // metadata to count as selected.
    let selected = match fetched.as_slice() {
        [(candidate, Some(_))] => Some(candidate.structure_id.clone()),
        [_] => None,
        all => select::select(all),
    };

    let candidates = fetched
        .iter()
        .map(|(candidate, metadata)| ScoreEntry {
            structure_id: candidate.structure_id.to_string(),
            method: metadata.as_ref().map(|meta| meta.method.to_string()),
            citation_count: metadata.as_ref().map(|meta| meta.citation_count),
            polymer_coverage: metadata.as_ref().map(|meta| meta.polymer_coverage),
            score: metadata.as_ref().map(select::score),
        })
        .collect();

    ScoreResult {
        selected: selected.map(|id| id.to_string()),
        candidates,
    }
}
