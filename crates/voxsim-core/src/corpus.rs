//! Corpus handle: ingestion and retrieval over one root directory
//!
//! Ingest runs in three phases. Extraction is a parallel map over recordings,
//! statistics are a barrier over every successful vector, and normalization
//! is a second parallel map using the finished bounds.

use crate::audio::AudioFormat;
use crate::error::{Error, ExtractionError, Result};
use crate::extractor::{FeatureExtractor, SpectralExtractor};
use crate::normalize::normalize;
use crate::preprocess::Preprocessor;
use crate::settings::{StoreFormat, VoxsimConfig};
use crate::similarity::{CorpusEntry, QueryOutcome, SimilarityIndex};
use crate::stats::{compute_bounds, NormalizationBounds};
use crate::store::{
    identity_for, is_store_dir_name, publish, store_for, BuildInfo, StoredCorpus, BOUNDS_FILE,
    STORE_DIR,
};
use crate::summary::SummaryVector;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

#[cfg(test)]
mod tests;

/// Lock file guarding a root against concurrent ingests
pub const LOCK_FILE: &str = ".voxsim.lock";

/// Progress notifications emitted during ingest
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Discovered { total: usize },
    Extracted { identity: String },
    Failed { identity: String, reason: String },
    BoundsComputed { vectors: usize },
    Published { entries: usize },
}

/// A recording that could not be analyzed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestFailure {
    pub identity: String,
    pub reason: String,
}

/// Outcome of a corpus build
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Recordings indexed
    pub processed: usize,
    pub failed: Vec<IngestFailure>,
    /// Data-quality findings from the statistics pass
    pub diagnostics: Vec<String>,
    pub elapsed_seconds: f64,
}

impl IngestReport {
    pub fn status(&self) -> &'static str {
        match (self.processed, self.failed.len()) {
            (_, 0) => "success",
            (0, _) => "failed",
            _ => "partial",
        }
    }
}

/// Holds the build lock until dropped
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    /// Take the lock, replacing one left behind by a process that is gone
    fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        match Self::create(&path) {
            Err(Error::IngestInProgress(_)) if lock_is_stale(&path) => {
                log::warn!("Removing stale build lock {}", path.display());
                fs::remove_file(&path)?;
                Self::create(&path)
            }
            other => other,
        }
    }

    fn create(path: &Path) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(Error::IngestInProgress(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A lock is stale when it names a pid that is no longer running
fn lock_is_stale(path: &Path) -> bool {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
        .map_or(false, |pid| !process_alive(pid))
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release build lock {}: {}", self.path.display(), e);
        }
    }
}

/// A corpus of recordings rooted at one directory
pub struct Corpus {
    root: PathBuf,
    extractor: Box<dyn FeatureExtractor>,
    preprocessor: Preprocessor,
    extensions: Vec<String>,
    store_format: StoreFormat,
    compress: bool,
}

impl Corpus {
    /// Corpus with default analysis, JSON store and no preprocessing
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(root, &VoxsimConfig::default())
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &VoxsimConfig) -> Self {
        Self {
            root: root.into(),
            extractor: Box::new(SpectralExtractor::default()),
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            extensions: config
                .corpus
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            store_format: config.store.format,
            compress: config.store.compress,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn FeatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_store_format(mut self, format: StoreFormat) -> Self {
        self.store_format = format;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    pub fn bounds_path(&self) -> PathBuf {
        self.store_dir().join(BOUNDS_FILE)
    }

    /// Recordings under the root, as sorted root-relative paths
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("corpus root is not a directory: {}", self.root.display()),
            )));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir() && is_store_dir_name(&e.file_name().to_string_lossy()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Error accessing entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.has_recording_extension(entry.path()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                files.push(rel.to_path_buf());
            }
        }

        files.sort();
        log::debug!("Discovered {} recordings under {}", files.len(), self.root.display());
        Ok(files)
    }

    fn has_recording_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext) && AudioFormat::from_extension(&ext).is_some()
    }

    /// Summary vector of one recording
    pub fn extract_file(&self, path: &Path) -> std::result::Result<SummaryVector, ExtractionError> {
        crate::extract_summary(path, self.extractor.as_ref(), Some(&self.preprocessor))
    }

    /// Rebuild the whole corpus from the recordings under the root
    pub fn ingest(&self) -> Result<IngestReport> {
        self.ingest_with_progress(&|_| {})
    }

    /// Like [`Corpus::ingest`], reporting progress to `on_event`
    pub fn ingest_with_progress(
        &self,
        on_event: &(dyn Fn(IngestEvent) + Sync),
    ) -> Result<IngestReport> {
        let start = Instant::now();
        let _lock = BuildLock::acquire(&self.root)?;

        let recordings = self.discover()?;
        log::info!("Ingesting {} recordings from {}", recordings.len(), self.root.display());
        on_event(IngestEvent::Discovered {
            total: recordings.len(),
        });

        let results: Vec<(PathBuf, std::result::Result<SummaryVector, ExtractionError>)> =
            recordings
                .into_par_iter()
                .map(|rel| {
                    let path = self.root.join(&rel);
                    let identity = identity_for(&self.root, &rel);
                    let result = self.extract_file(&path);
                    match &result {
                        Ok(_) => {
                            log::debug!("Processed: {}", identity);
                            on_event(IngestEvent::Extracted { identity });
                        }
                        Err(e) => on_event(IngestEvent::Failed {
                            identity,
                            reason: e.to_string(),
                        }),
                    }
                    (rel, result)
                })
                .collect();

        // Raw files are keyed by stem, so they are written in discovery order
        // and the first recording claiming a stem keeps it
        let mut raw_written = HashSet::new();
        let mut summaries = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (rel, result) in results {
            match result {
                Ok(vector) => {
                    let raw = self.root.join(&rel).with_extension("json");
                    if raw_written.insert(raw.clone()) {
                        write_raw_features(&raw, &vector);
                    } else {
                        log::warn!(
                            "Recordings share the raw feature file {}; keeping the first, skipping {}",
                            raw.display(),
                            rel.display()
                        );
                    }
                    summaries.push((rel, vector));
                }
                Err(e) => {
                    let identity = identity_for(&self.root, &rel);
                    log::warn!("Error processing {}: {}", identity, e);
                    failed.push(IngestFailure {
                        identity,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut report = self.build_locked(summaries, on_event)?;
        report.failed = failed;
        report.elapsed_seconds = start.elapsed().as_secs_f64();

        log::info!(
            "Ingest finished: {} indexed, {} failed in {:.2}s",
            report.processed,
            report.failed.len(),
            report.elapsed_seconds
        );
        Ok(report)
    }

    /// Build the corpus from already-aggregated vectors keyed by root-relative path
    pub fn build_from_summaries(
        &self,
        summaries: Vec<(PathBuf, SummaryVector)>,
    ) -> Result<IngestReport> {
        let start = Instant::now();
        let _lock = BuildLock::acquire(&self.root)?;
        let mut report = self.build_locked(summaries, &|_| {})?;
        report.elapsed_seconds = start.elapsed().as_secs_f64();
        Ok(report)
    }

    fn build_locked(
        &self,
        summaries: Vec<(PathBuf, SummaryVector)>,
        on_event: &(dyn Fn(IngestEvent) + Sync),
    ) -> Result<IngestReport> {
        for (rel, _) in &summaries {
            let plain = rel.components().all(|c| matches!(c, Component::Normal(_)));
            if !plain || rel.as_os_str().is_empty() {
                return Err(Error::OutsideCorpus(rel.clone()));
            }
        }
        let (rels, vectors): (Vec<PathBuf>, Vec<SummaryVector>) = summaries.into_iter().unzip();

        // Barrier: no vector is normalized before the bounds are final
        let stats = compute_bounds(&vectors);
        on_event(IngestEvent::BoundsComputed {
            vectors: vectors.len(),
        });

        let entries = rels
            .par_iter()
            .zip(vectors.par_iter())
            .map(|(rel, vector)| -> Result<CorpusEntry> {
                let normalized = normalize(vector, &stats.bounds)?;
                Ok(CorpusEntry::new(identity_for(&self.root, rel), &normalized))
            })
            .collect::<Result<Vec<CorpusEntry>>>()?;

        let stored = StoredCorpus {
            bounds: stats.bounds,
            entries,
            info: Some(BuildInfo {
                analysis_params: self.extractor.describe(),
                preprocessed: self.preprocessor.config().enabled,
            }),
        };
        let store = store_for(self.store_format, &self.root, self.compress);
        publish(&self.root, store.as_ref(), &stored)?;
        on_event(IngestEvent::Published {
            entries: stored.entries.len(),
        });

        Ok(IngestReport {
            processed: stored.entries.len(),
            failed: Vec::new(),
            diagnostics: stats.diagnostics.iter().map(|d| d.to_string()).collect(),
            elapsed_seconds: 0.0,
        })
    }

    /// Persisted bounds of the last build
    pub fn load_bounds(&self) -> Result<NormalizationBounds> {
        NormalizationBounds::load(&self.bounds_path())
    }

    /// Load the persisted index, whichever layout it was written in
    pub fn load_index(&self) -> Result<(NormalizationBounds, SimilarityIndex)> {
        let store = store_for(StoreFormat::Auto, &self.root, self.compress);
        let stored = store.load(&self.store_dir())?;

        if let Some(info) = &stored.info {
            if info.preprocessed != self.preprocessor.config().enabled {
                log::warn!(
                    "Corpus was built with preprocessing {}, queries run with it {}",
                    on_off(info.preprocessed),
                    on_off(self.preprocessor.config().enabled)
                );
            }
        }
        Ok((stored.bounds, SimilarityIndex::from_entries(stored.entries)))
    }

    /// Rank the corpus against a recording
    pub fn query(&self, recording: &Path, top_n: usize) -> Result<QueryOutcome> {
        let vector = self.extract_file(recording).map_err(|source| Error::Extraction {
            identity: recording.display().to_string(),
            source,
        })?;
        self.query_vector(&vector, top_n)
    }

    /// Rank the corpus against an already-aggregated vector
    pub fn query_vector(&self, vector: &SummaryVector, top_n: usize) -> Result<QueryOutcome> {
        let (bounds, index) = self.load_index()?;
        let normalized = normalize(vector, &bounds)?;
        Ok(index.query(&normalized, top_n))
    }

    /// Canonical path of a recording, refusing anything outside the root
    pub fn resolve_recording(&self, candidate: &Path) -> Result<PathBuf> {
        let root = self.root.canonicalize()?;
        let path = candidate
            .canonicalize()
            .map_err(|_| Error::OutsideCorpus(candidate.to_path_buf()))?;
        if !path.starts_with(&root) || !path.is_file() {
            return Err(Error::OutsideCorpus(candidate.to_path_buf()));
        }
        Ok(path)
    }

    /// Raw bytes of a recording inside the root
    pub fn read_recording(&self, candidate: &Path) -> Result<Vec<u8>> {
        let path = self.resolve_recording(candidate)?;
        Ok(fs::read(path)?)
    }
}

/// Raw feature file next to the recording; failures only cost the file
fn write_raw_features(path: &Path, vector: &SummaryVector) {
    if let Err(e) = vector.to_feature_file().save(path) {
        log::warn!("Failed to write {}: {:#}", path.display(), e);
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
