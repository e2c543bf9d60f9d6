//! Persisted corpus stores
//!
//! A store lives in `<root>/normalized_features/`. It always holds the bounds
//! file `configs.json`; the normalized vectors are kept either as one JSON file
//! per recording mirroring the corpus tree or as a single `.vsi` snapshot.
//! Stores are built in a staging directory and swapped in whole.

use crate::error::{Error, Result};
use crate::settings::StoreFormat;
use crate::similarity::CorpusEntry;
use crate::stats::NormalizationBounds;
use crate::summary::{Field, NormalizedVector, SUMMARY_DIM};
use rayon::prelude::*;
use std::fs;
use std::path::{Component, Path, PathBuf};
use voxsim_store::{FeatureFile, IndexEntry, IndexMetadata, IndexReader, IndexWriter};
use walkdir::WalkDir;

pub const STORE_DIR: &str = "normalized_features";
pub const BOUNDS_FILE: &str = "configs.json";
pub const SNAPSHOT_FILE: &str = "corpus.vsi";

const STAGING_DIR: &str = ".normalized_features.staging";
const RETIRED_DIR: &str = ".normalized_features.old";

/// True for directory names that belong to a store rather than the corpus
pub fn is_store_dir_name(name: &str) -> bool {
    name == STORE_DIR || name == STAGING_DIR || name == RETIRED_DIR
}

/// How a stored corpus was analyzed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildInfo {
    pub analysis_params: serde_json::Value,
    pub preprocessed: bool,
}

/// Everything a store persists for one corpus build
#[derive(Debug, Clone, Default)]
pub struct StoredCorpus {
    pub bounds: NormalizationBounds,
    pub entries: Vec<CorpusEntry>,
    /// Only known for stores that record it
    pub info: Option<BuildInfo>,
}

/// Persistence for normalized corpus entries
pub trait CorpusStore: Send + Sync {
    /// Write a complete store into the empty directory `dir`
    fn write(&self, dir: &Path, corpus: &StoredCorpus) -> Result<()>;

    /// Load a store previously written to `dir`
    fn load(&self, dir: &Path) -> Result<StoredCorpus>;

    fn name(&self) -> &'static str;
}

/// Store implementation for a configured format
pub fn store_for(format: StoreFormat, root: &Path, compress: bool) -> Box<dyn CorpusStore> {
    match format {
        StoreFormat::Json => Box::new(JsonTreeStore::new(root)),
        StoreFormat::Snapshot => Box::new(SnapshotStore::new(compress)),
        StoreFormat::Auto => Box::new(AutoStore {
            json: JsonTreeStore::new(root),
            snapshot: SnapshotStore::new(compress),
        }),
    }
}

/// Identity prefix shared by every recording under `root`
fn identity_prefix(root: &Path) -> String {
    let mut prefix = root.to_string_lossy().replace('\\', "/");
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

/// Identity of the recording at `rel` under `root`, always with '/' separators
pub fn identity_for(root: &Path, rel: &Path) -> String {
    format!(
        "{}{}",
        identity_prefix(root),
        rel.to_string_lossy().replace('\\', "/")
    )
}

/// Recover the corpus-relative path from an identity
pub fn relative_path(root: &Path, identity: &str) -> Result<PathBuf> {
    let outside = || Error::OutsideCorpus(PathBuf::from(identity));
    let rel = identity
        .strip_prefix(&identity_prefix(root))
        .map(PathBuf::from)
        .ok_or_else(outside)?;
    let plain = rel.components().all(|c| matches!(c, Component::Normal(_)));
    if rel.as_os_str().is_empty() || !plain {
        return Err(outside());
    }
    Ok(rel)
}

/// Build a store in a staging directory and swap it in for the live one
pub fn publish(root: &Path, store: &dyn CorpusStore, corpus: &StoredCorpus) -> Result<()> {
    let live = root.join(STORE_DIR);
    let staging = root.join(STAGING_DIR);
    let retired = root.join(RETIRED_DIR);

    remove_dir_if_present(&staging)?;
    remove_dir_if_present(&retired)?;
    fs::create_dir_all(&staging)?;

    if let Err(e) = store.write(&staging, corpus) {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            log::warn!("Failed to remove {}: {}", staging.display(), cleanup);
        }
        return Err(e);
    }

    let had_live = live.exists();
    if had_live {
        fs::rename(&live, &retired)?;
    }
    if let Err(e) = fs::rename(&staging, &live) {
        if had_live {
            fs::rename(&retired, &live)?;
        }
        return Err(e.into());
    }
    remove_dir_if_present(&retired)?;

    log::info!(
        "Published {} store with {} entries to {}",
        store.name(),
        corpus.entries.len(),
        live.display()
    );
    Ok(())
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// One normalized JSON file per recording, mirroring the corpus tree
pub struct JsonTreeStore {
    root: PathBuf,
}

impl JsonTreeStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// `<dir>/<rel>.json`, keeping the recording's own extension
    fn entry_path(dir: &Path, rel: &Path) -> PathBuf {
        let mut name = rel.as_os_str().to_os_string();
        name.push(".json");
        dir.join(name)
    }

    fn load_entry(&self, dir: &Path, path: &Path) -> anyhow::Result<CorpusEntry> {
        let file = FeatureFile::load(path)?;
        let rel = path.strip_prefix(dir)?.with_extension("");

        // Fields missing from the file shorten the vector; the index reports
        // such entries instead of scoring them
        let vector: Vec<f64> = Field::ALL
            .iter()
            .filter_map(|field| file.get(field.name()))
            .flat_map(|value| value.elements().iter().copied())
            .collect();

        Ok(CorpusEntry::from_raw(identity_for(&self.root, &rel), vector))
    }
}

impl CorpusStore for JsonTreeStore {
    fn write(&self, dir: &Path, corpus: &StoredCorpus) -> Result<()> {
        corpus.bounds.save(&dir.join(BOUNDS_FILE))?;

        corpus.entries.par_iter().try_for_each(|entry| -> Result<()> {
            let rel = relative_path(&self.root, &entry.identity)?;
            let path = Self::entry_path(dir, &rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let vector = NormalizedVector::from_flat(&entry.vector)?;
            vector.to_feature_file().save(&path)?;
            Ok(())
        })
    }

    fn load(&self, dir: &Path) -> Result<StoredCorpus> {
        let bounds = NormalizationBounds::load(&dir.join(BOUNDS_FILE))?;

        let files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| !(entry.depth() == 1 && entry.file_name() == BOUNDS_FILE))
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();

        let mut entries: Vec<CorpusEntry> = files
            .par_iter()
            .filter_map(|path| match self.load_entry(dir, path) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Failed to load {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));

        Ok(StoredCorpus {
            bounds,
            entries,
            info: None,
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Single `.vsi` snapshot file next to the bounds file
pub struct SnapshotStore {
    compress: bool,
}

impl SnapshotStore {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }
}

impl CorpusStore for SnapshotStore {
    fn write(&self, dir: &Path, corpus: &StoredCorpus) -> Result<()> {
        corpus.bounds.save(&dir.join(BOUNDS_FILE))?;

        let info = corpus.info.clone().unwrap_or_default();
        let metadata =
            IndexMetadata::new(info.analysis_params, info.preprocessed, corpus.bounds.to_file());
        let entries: Vec<IndexEntry> = corpus
            .entries
            .iter()
            .map(|entry| IndexEntry {
                identity: entry.identity.clone(),
                vector: entry.vector.clone(),
            })
            .collect();

        let header = IndexWriter::new()
            .compressed(self.compress)
            .write(&dir.join(SNAPSHOT_FILE), SUMMARY_DIM, &metadata, &entries)?;
        log::debug!(
            "Wrote snapshot: {} entries, payload {} bytes (stored {})",
            header.num_entries,
            header.payload_size,
            header.stored_payload_size()
        );
        Ok(())
    }

    fn load(&self, dir: &Path) -> Result<StoredCorpus> {
        let bounds_path = dir.join(BOUNDS_FILE);
        if !bounds_path.is_file() {
            return Err(Error::BoundsNotFound(bounds_path));
        }

        let file = IndexReader::read(&dir.join(SNAPSHOT_FILE))?;
        if file.header.dimension as usize != SUMMARY_DIM {
            log::warn!(
                "Snapshot was built with dimension {}, expected {}",
                file.header.dimension,
                SUMMARY_DIM
            );
        }

        Ok(StoredCorpus {
            bounds: file.metadata.bounds.into(),
            entries: file
                .entries
                .into_iter()
                .map(|entry| CorpusEntry::from_raw(entry.identity, entry.vector))
                .collect(),
            info: Some(BuildInfo {
                analysis_params: file.metadata.analysis_params,
                preprocessed: file.metadata.preprocessed,
            }),
        })
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}

/// Writes both layouts; loads the snapshot when one is present
pub struct AutoStore {
    json: JsonTreeStore,
    snapshot: SnapshotStore,
}

impl CorpusStore for AutoStore {
    fn write(&self, dir: &Path, corpus: &StoredCorpus) -> Result<()> {
        self.json.write(dir, corpus)?;
        self.snapshot.write(dir, corpus)
    }

    fn load(&self, dir: &Path) -> Result<StoredCorpus> {
        if dir.join(SNAPSHOT_FILE).is_file() {
            self.snapshot.load(dir)
        } else {
            self.json.load(dir)
        }
    }

    fn name(&self) -> &'static str {
        "auto"
    }
}
