//! File discovery, change detection, and extraction orchestration.
//!
//! Per-file work splits in two: `prepare` (read, hash, parse, extract;
//! safe to run on any worker) and `apply` (all store mutations plus
//! blast-radius accounting; runs only on the single writer). Parallel
//! and serial mode share both halves, and because the fingerprint diff
//! is keyed on identities rather than row ids, the final persisted
//! state is independent of worker order.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::analyzer::AnalyzerSet;
use crate::models::Language;
use crate::store::{FileExtraction, Store};

use super::cancel::CancellationToken;
use super::error::{BatchErrors, EngineError, EngineResult};
use super::fingerprint;

/// Directories never worth indexing, applied on top of ignore rules.
const DENYLIST: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "out",
    "__pycache__",
    ".git",
    ".cache",
];

/// Summary of one indexing batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    /// Files considered (supported language, discovered or passed in).
    pub files_seen: usize,
    /// Files whose content changed and were (re-)extracted.
    pub files_indexed: usize,
    /// Files skipped because their content hash was unchanged.
    pub files_unchanged: usize,
    /// File rows removed because the file left the discovered set.
    pub files_removed: usize,
    /// Symbols written by this batch.
    pub symbols_indexed: usize,
}

/// Files whose resolution tier must be recomputed, accumulated across
/// a batch. `None` means everything (first run or forced rebuild).
#[derive(Debug, Default)]
pub struct BlastRadius {
    files: HashSet<i64>,
}

impl BlastRadius {
    pub fn add(&mut self, file_id: i64) {
        self.files.insert(file_id);
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.files.extend(ids);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.files.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Walk a directory and produce the indexable source files, honoring
/// tracked-tree ignore rules when present and a fixed denylist of
/// build-artifact directories otherwise.
pub fn discover_files(root: &Path, analyzers: &AnalyzerSet) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !DENYLIST.contains(&name.as_ref())
        });

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter(|entry| analyzers.for_path(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Canonical absolute path string used as the file identity.
pub fn canonical_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn count_lines(source: &str) -> u32 {
    source.lines().count() as u32
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Worker half of the per-file pipeline.
pub(crate) enum Prepared {
    /// Content hash matches the stored row; nothing to do.
    Unchanged,
    Extracted(Box<PreparedFile>),
}

pub(crate) struct PreparedFile {
    pub path: String,
    pub language: Language,
    pub hash: String,
    pub line_count: u32,
    pub extraction: FileExtraction,
}

pub(crate) fn prepare_file(
    store: &Store,
    analyzers: &AnalyzerSet,
    path: &Path,
) -> EngineResult<Prepared> {
    let analyzer = analyzers
        .for_path(path)
        .ok_or_else(|| EngineError::InvalidInput(format!("unsupported file: {}", path.display())))?;

    let canonical = canonical_path(path);
    let bytes = std::fs::read(path)?;
    let hash = content_hash(&bytes);

    if let Some(existing) = store.find_file_by_path(&canonical)? {
        if existing.hash == hash {
            return Ok(Prepared::Unchanged);
        }
    }

    let source = String::from_utf8_lossy(&bytes).to_string();
    let parsed = analyzer
        .parse(path, &source)
        .map_err(|err| EngineError::script(canonical.clone(), err.to_string()))?;
    let mut extraction = analyzer
        .extract(&parsed)
        .map_err(|err| EngineError::script(canonical.clone(), err.to_string()))?;

    for symbol in &mut extraction.symbols {
        symbol.signature_hash = fingerprint::signature_hash(symbol);
    }

    Ok(Prepared::Extracted(Box::new(PreparedFile {
        path: canonical,
        language: analyzer.language(),
        hash,
        line_count: count_lines(&source),
        extraction,
    })))
}

/// Writer half: replace any previous row for the path, install the new
/// extraction, and fold this file's contribution into the blast
/// radius.
pub(crate) fn apply_prepared(
    store: &Store,
    prepared: PreparedFile,
    blast: &mut BlastRadius,
) -> EngineResult<usize> {
    let existing = store.find_file_by_path(&prepared.path)?;

    let (old_fingerprints, referencing, old_packages) = match &existing {
        Some(file) => {
            let rows = store.symbols_by_file(file.id)?;
            let old_packages: Vec<String> = rows
                .iter()
                .filter(|row| row.kind.is_package_like())
                .map(|row| row.name.clone())
                .collect();
            (
                fingerprint::from_rows(&rows),
                store.referencing_files_by_symbol(file.id)?,
                old_packages,
            )
        }
        None => (Vec::new(), HashMap::new(), Vec::new()),
    };

    if let Some(file) = &existing {
        store.delete_file_cascade(file.id)?;
    }

    let (file_id, symbol_ids) = store.apply_file_extraction(
        &prepared.path,
        prepared.language,
        &prepared.hash,
        prepared.line_count,
        now_epoch_seconds(),
        &prepared.extraction,
    )?;

    let new_fingerprints =
        fingerprint::from_extraction(&prepared.extraction.symbols, &symbol_ids);
    let diff = fingerprint::diff(&old_fingerprints, &new_fingerprints);

    blast.add(file_id);
    for old_id in &diff.invalidated_old_ids {
        if let Some(files) = referencing.get(old_id) {
            blast.extend(files.iter().copied());
        }
    }

    if diff.set_changed {
        let mut packages: Vec<&String> = prepared
            .extraction
            .symbols
            .iter()
            .filter(|symbol| symbol.kind.is_package_like())
            .map(|symbol| &symbol.name)
            .collect();
        if packages.is_empty() {
            packages = old_packages.iter().collect();
        }
        for package in packages {
            blast.extend(store.files_importing(package)?);
        }
    }

    debug!(path = %prepared.path, symbols = symbol_ids.len(), "indexed file");
    Ok(symbol_ids.len())
}

/// Remove a file row that left the discovered set, folding the removal
/// into the blast radius.
pub(crate) fn remove_file(
    store: &Store,
    file_id: i64,
    blast: &mut BlastRadius,
) -> EngineResult<()> {
    let rows = store.symbols_by_file(file_id)?;
    let referencing = store.referencing_files_by_symbol(file_id)?;

    for row in &rows {
        if let Some(files) = referencing.get(&row.id) {
            blast.extend(files.iter().copied());
        }
    }
    // Every symbol disappeared; package-level dependents must
    // re-resolve too.
    for row in &rows {
        if row.kind.is_package_like() {
            blast.extend(store.files_importing(&row.name)?);
        }
    }

    store.delete_file_cascade(file_id)?;
    blast.add(file_id);
    Ok(())
}

/// Run a batch of files through the pipeline, serially or through a
/// worker pool with a single serializing writer.
pub(crate) fn index_paths(
    store: &Store,
    analyzers: &AnalyzerSet,
    cancel: &CancellationToken,
    parallel: bool,
    paths: &[PathBuf],
    blast: &mut BlastRadius,
) -> EngineResult<IndexReport> {
    let mut report = IndexReport {
        files_seen: paths.len(),
        ..Default::default()
    };
    let mut errors = BatchErrors::new();

    if parallel && paths.len() > 1 {
        let workers = num_cpus::get().min(paths.len()).max(1);
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<PathBuf>();
        let (result_tx, result_rx) =
            crossbeam_channel::unbounded::<(PathBuf, EngineResult<Prepared>)>();

        for path in paths {
            job_tx.send(path.clone()).expect("job channel open");
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let cancel = cancel.clone();
                scope.spawn(move || {
                    while let Ok(path) = job_rx.recv() {
                        if cancel.is_cancelled() {
                            let _ = result_tx.send((path, Err(EngineError::Cancelled)));
                            continue;
                        }
                        let prepared = prepare_file(store, analyzers, &path);
                        if result_tx.send((path, prepared)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            // Single writer: apply results as they arrive.
            while let Ok((path, prepared)) = result_rx.recv() {
                match prepared {
                    Ok(Prepared::Unchanged) => report.files_unchanged += 1,
                    Ok(Prepared::Extracted(file)) => match apply_prepared(store, *file, blast) {
                        Ok(symbols) => {
                            report.files_indexed += 1;
                            report.symbols_indexed += symbols;
                        }
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "failed to index file");
                            errors.record(path.display().to_string(), err);
                        }
                    },
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to index file");
                        errors.record(path.display().to_string(), err);
                    }
                }
            }
        });
    } else {
        for path in paths {
            if cancel.is_cancelled() {
                errors.record(path.display().to_string(), EngineError::Cancelled);
                break;
            }
            match prepare_file(store, analyzers, path) {
                Ok(Prepared::Unchanged) => report.files_unchanged += 1,
                Ok(Prepared::Extracted(file)) => match apply_prepared(store, *file, blast) {
                    Ok(symbols) => {
                        report.files_indexed += 1;
                        report.symbols_indexed += symbols;
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to index file");
                        errors.record(path.display().to_string(), err);
                    }
                },
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to index file");
                    errors.record(path.display().to_string(), err);
                }
            }
        }
    }

    errors.into_result(report.files_seen, "files")?;
    Ok(report)
}
