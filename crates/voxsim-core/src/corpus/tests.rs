//! Tests for corpus ingest and retrieval

use super::*;
use crate::extractor::FrameFeatures;
use crate::summary::{Field, SUMMARY_DIM};
use std::f32::consts::PI;
use std::sync::Mutex;
use tempfile::TempDir;
use voxsim_store::FeatureFile;

const RATE: u32 = 16000;

fn write_tone(path: &Path, freq: f32, amplitude: f32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..RATE {
        let t = i as f32 / RATE as f32;
        let s = amplitude * (2.0 * PI * freq * t).sin();
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Corpus of two close tones and one distant tone
fn tone_corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("a.wav"), 440.0, 0.5);
    write_tone(&dir.path().join("b.wav"), 445.0, 0.5);
    write_tone(&dir.path().join("far/c.wav"), 3000.0, 0.5);
    dir
}

fn flat(value: f64) -> SummaryVector {
    SummaryVector::from_flat(&[value; SUMMARY_DIM]).unwrap()
}

#[test]
fn test_query_before_ingest_reports_missing_bounds() {
    let dir = tone_corpus();
    let corpus = Corpus::new(dir.path());

    let err = corpus.query(&dir.path().join("a.wav"), 5).unwrap_err();
    assert!(matches!(err, Error::BoundsNotFound(_)));
    assert!(err.is_missing_bounds());
}

#[test]
fn test_discover_skips_store_and_foreign_files() {
    let dir = tone_corpus();
    write_tone(&dir.path().join("LOUD.WAV"), 220.0, 0.9);
    fs::write(dir.path().join("notes.txt"), "not audio").unwrap();
    fs::create_dir_all(dir.path().join(STORE_DIR)).unwrap();
    write_tone(&dir.path().join(STORE_DIR).join("stray.wav"), 220.0, 0.5);

    let found = Corpus::new(dir.path()).discover().unwrap();
    assert_eq!(
        found,
        vec![
            PathBuf::from("LOUD.WAV"),
            PathBuf::from("a.wav"),
            PathBuf::from("b.wav"),
            PathBuf::from("far/c.wav"),
        ]
    );
}

#[test]
fn test_ingest_then_query_ranks_recording_first() {
    let dir = tone_corpus();
    let corpus = Corpus::new(dir.path());

    let report = corpus.ingest().unwrap();
    assert_eq!(report.processed, 3);
    assert!(report.failed.is_empty());
    assert_eq!(report.status(), "success");

    assert!(corpus.bounds_path().is_file());
    assert!(corpus.store_dir().join("far/c.wav.json").is_file());
    assert!(!dir.path().join(LOCK_FILE).exists());

    let outcome = corpus.query(&dir.path().join("a.wav"), 3).unwrap();
    assert_eq!(outcome.hits.len(), 3);
    assert_eq!(outcome.hits[0].identity, identity_for(dir.path(), Path::new("a.wav")));
    assert!(outcome.hits[0].score > 0.999_999);

    let score = |rel: &str| {
        let id = identity_for(dir.path(), Path::new(rel));
        outcome.hits.iter().find(|h| h.identity == id).unwrap().score
    };
    assert!(score("b.wav") > score("far/c.wav"));
}

#[test]
fn test_ingest_writes_raw_feature_files() {
    let dir = tone_corpus();
    Corpus::new(dir.path()).ingest().unwrap();

    let raw = FeatureFile::load(&dir.path().join("far/c.json")).unwrap();
    let vector = SummaryVector::from_feature_file(&raw).unwrap();
    assert_eq!(vector.flatten().len(), SUMMARY_DIM);
}

#[test]
fn test_undecodable_file_is_reported_and_skipped() {
    let dir = tone_corpus();
    fs::write(dir.path().join("broken.wav"), b"definitely not RIFF").unwrap();

    let corpus = Corpus::new(dir.path());
    let report = corpus.ingest().unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(
        report.failed[0].identity,
        identity_for(dir.path(), Path::new("broken.wav"))
    );
    assert_eq!(report.status(), "partial");

    let (_, index) = corpus.load_index().unwrap();
    assert_eq!(index.len(), 3);
}

#[test]
fn test_reingest_replaces_previous_build() {
    let dir = tone_corpus();
    let corpus = Corpus::new(dir.path());
    corpus.ingest().unwrap();

    fs::remove_file(dir.path().join("b.wav")).unwrap();
    corpus.ingest().unwrap();

    let (_, index) = corpus.load_index().unwrap();
    let ids: Vec<&str> = index.entries().iter().map(|e| e.identity.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            identity_for(dir.path(), Path::new("a.wav")),
            identity_for(dir.path(), Path::new("far/c.wav")),
        ]
    );
    assert!(!corpus.store_dir().join("b.wav.json").exists());
}

#[test]
fn test_progress_events() {
    let dir = tone_corpus();
    let events = Mutex::new(Vec::new());
    Corpus::new(dir.path())
        .ingest_with_progress(&|event| events.lock().unwrap().push(event))
        .unwrap();

    let events = events.into_inner().unwrap();
    assert_eq!(events.first(), Some(&IngestEvent::Discovered { total: 3 }));
    assert_eq!(events.last(), Some(&IngestEvent::Published { entries: 3 }));
    let extracted = events
        .iter()
        .filter(|e| matches!(e, IngestEvent::Extracted { .. }))
        .count();
    assert_eq!(extracted, 3);
}

#[test]
fn test_concurrent_ingest_is_refused() {
    let dir = tone_corpus();
    fs::write(dir.path().join(LOCK_FILE), format!("{}\n", std::process::id())).unwrap();

    let err = Corpus::new(dir.path()).ingest().unwrap_err();
    assert!(matches!(err, Error::IngestInProgress(_)));
    assert!(err.to_string().contains(LOCK_FILE));
    // The lock belongs to the other build
    assert!(dir.path().join(LOCK_FILE).exists());
    assert!(!dir.path().join(STORE_DIR).exists());
}

#[test]
fn test_build_from_summaries_and_query_vector() {
    let dir = TempDir::new().unwrap();
    let corpus = Corpus::new(dir.path());

    let b_flat: Vec<f64> = (0..SUMMARY_DIM)
        .map(|i| if i % 2 == 1 { 1.01 } else { 1.0 })
        .collect();
    let summaries = vec![
        (PathBuf::from("A.wav"), flat(1.0)),
        (PathBuf::from("B.wav"), SummaryVector::from_flat(&b_flat).unwrap()),
        (PathBuf::from("C.wav"), flat(0.0)),
    ];
    let report = corpus.build_from_summaries(summaries).unwrap();
    assert_eq!(report.processed, 3);

    let outcome = corpus.query_vector(&flat(1.0), 3).unwrap();
    let id = |rel: &str| identity_for(dir.path(), Path::new(rel));
    assert_eq!(outcome.hits[0].identity, id("A.wav"));
    let score = |rel: &str| {
        outcome
            .hits
            .iter()
            .find(|h| h.identity == id(rel))
            .unwrap()
            .score
    };
    assert!(score("B.wav") > score("C.wav"));
}

#[test]
fn test_build_rejects_paths_escaping_root() {
    let dir = TempDir::new().unwrap();
    let corpus = Corpus::new(dir.path());
    let err = corpus
        .build_from_summaries(vec![(PathBuf::from("../elsewhere.wav"), flat(1.0))])
        .unwrap_err();
    assert!(matches!(err, Error::OutsideCorpus(_)));
    assert!(!dir.path().join(LOCK_FILE).exists());
}

#[test]
fn test_empty_corpus_is_published_with_zero_bounds() {
    let dir = TempDir::new().unwrap();
    let corpus = Corpus::new(dir.path());
    let report = corpus.ingest().unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.diagnostics.len(), Field::COUNT);

    let bounds = corpus.load_bounds().unwrap();
    let entry = bounds.get("mfcc_mean").unwrap();
    assert_eq!((entry.min, entry.max), (0.0, 0.0));
    assert!(corpus.query_vector(&flat(1.0), 5).unwrap().hits.is_empty());
}

#[test]
fn test_snapshot_store_is_loaded_by_default_corpus() {
    let dir = TempDir::new().unwrap();
    let writer = Corpus::new(dir.path()).with_store_format(StoreFormat::Snapshot);
    writer
        .build_from_summaries(vec![
            (PathBuf::from("x.wav"), flat(2.0)),
            (PathBuf::from("y.wav"), flat(4.0)),
        ])
        .unwrap();

    let reader = Corpus::new(dir.path());
    let (bounds, index) = reader.load_index().unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(bounds.get("spectral_flatness").unwrap().max, 4.0);
}

#[test]
fn test_resolve_recording_guards_root() {
    let dir = tone_corpus();
    let other = TempDir::new().unwrap();
    write_tone(&other.path().join("outside.wav"), 440.0, 0.5);
    let corpus = Corpus::new(dir.path());

    let inside = corpus.resolve_recording(&dir.path().join("far/c.wav")).unwrap();
    assert!(inside.ends_with("far/c.wav"));
    assert_eq!(
        corpus.read_recording(&dir.path().join("a.wav")).unwrap(),
        fs::read(dir.path().join("a.wav")).unwrap()
    );

    let escaped = dir.path().join("far/../../").join(
        other
            .path()
            .file_name()
            .map(PathBuf::from)
            .unwrap()
            .join("outside.wav"),
    );
    for candidate in [other.path().join("outside.wav"), escaped] {
        let err = corpus.resolve_recording(&candidate).unwrap_err();
        assert!(matches!(err, Error::OutsideCorpus(_)));
    }

    // Directories are not recordings
    assert!(matches!(
        corpus.resolve_recording(&dir.path().join("far")),
        Err(Error::OutsideCorpus(_))
    ));
}

#[cfg(target_os = "linux")]
#[test]
fn test_lock_of_exited_process_is_replaced() {
    let dir = tone_corpus();
    // Above the kernel's pid_max, so never a live process
    fs::write(dir.path().join(LOCK_FILE), "999999999\n").unwrap();

    let report = Corpus::new(dir.path()).ingest().unwrap();
    assert_eq!(report.processed, 3);
    assert!(!dir.path().join(LOCK_FILE).exists());
}

#[test]
fn test_extraction_and_query_are_repeatable() {
    let dir = tone_corpus();
    let corpus = Corpus::new(dir.path());
    corpus.ingest().unwrap();

    let recording = dir.path().join("a.wav");
    assert_eq!(
        corpus.extract_file(&recording).unwrap(),
        corpus.extract_file(&recording).unwrap()
    );
    assert_eq!(
        corpus.query(&recording, 3).unwrap(),
        corpus.query(&recording, 3).unwrap()
    );
}

#[test]
fn test_shared_stem_keeps_first_raw_file() {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("a.wav"), 440.0, 0.5);
    write_tone(&dir.path().join("a.wave"), 3000.0, 0.5);

    let corpus = Corpus::new(dir.path());
    let report = corpus.ingest().unwrap();
    assert_eq!(report.processed, 2);

    let raw = FeatureFile::load(&dir.path().join("a.json")).unwrap();
    assert_eq!(
        SummaryVector::from_feature_file(&raw).unwrap(),
        corpus.extract_file(&dir.path().join("a.wav")).unwrap()
    );
}

/// Row `r` of every feature reads `[r, r + 2]`, whatever the audio
struct RampExtractor;

impl FeatureExtractor for RampExtractor {
    fn extract(
        &self,
        samples: &[f32],
        _sample_rate: u32,
    ) -> std::result::Result<FrameFeatures, ExtractionError> {
        if samples.is_empty() {
            return Err(ExtractionError::Empty);
        }
        let rows = |n: usize| -> Vec<Vec<f64>> {
            (0..n).map(|r| vec![r as f64, r as f64 + 2.0]).collect()
        };
        Ok(FrameFeatures {
            mfcc: rows(11),
            delta_mfcc: rows(11),
            spectral_contrast: rows(7),
            spectral_centroid: rows(1),
            spectral_flatness: rows(1),
        })
    }

    fn sample_rate(&self) -> u32 {
        8000
    }
}

#[test]
fn test_custom_extractor_drives_ingest_and_query() {
    let dir = tone_corpus();
    let corpus = Corpus::new(dir.path()).with_extractor(Box::new(RampExtractor));

    let report = corpus.ingest().unwrap();
    assert_eq!(report.processed, 3);

    let raw = FeatureFile::load(&dir.path().join("a.json")).unwrap();
    let vector = SummaryVector::from_feature_file(&raw).unwrap();
    let expected_means: Vec<f64> = (0..11).map(|r| r as f64 + 1.0).collect();
    assert_eq!(vector.get(Field::MfccMean), expected_means.as_slice());
    assert_eq!(vector.get(Field::MfccStd), vec![1.0; 11].as_slice());
    assert_eq!(vector.get(Field::SpectralCentroid), &[1.0]);

    // Identical vectors normalize to 0.5 everywhere, so every entry ties
    let outcome = corpus.query(&dir.path().join("b.wav"), 5).unwrap();
    let ids: Vec<String> = outcome.hits.iter().map(|h| h.identity.clone()).collect();
    assert_eq!(
        ids,
        vec![
            identity_for(dir.path(), Path::new("a.wav")),
            identity_for(dir.path(), Path::new("b.wav")),
            identity_for(dir.path(), Path::new("far/c.wav")),
        ]
    );
    assert!(outcome.hits.iter().all(|h| (h.score - 1.0).abs() < 1e-12));
}
