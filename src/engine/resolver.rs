//! Resolution orchestration: one pass per language with staleness
//! handling.
//!
//! The accumulated blast radius decides how much work happens: an
//! empty set means no file changed and resolution is skipped outright;
//! a non-empty set invalidates exactly those files' resolution rows
//! before re-running their languages; an absent set (first run, forced
//! rebuild) invalidates and re-resolves everything. A language failure
//! is recorded and the remaining languages still run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzer::{AnalyzerSet, ResolveContext};
use crate::models::Language;
use crate::store::{FileRow, Store};

use super::cancel::CancellationToken;
use super::error::{BatchErrors, EngineError, EngineResult};
use super::indexer::BlastRadius;

/// Summary of one resolve cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveReport {
    /// Languages whose resolution pass ran.
    pub languages_resolved: usize,
    /// Files handed to resolution passes.
    pub files_resolved: usize,
}

pub(crate) fn run_resolution(
    store: &Store,
    analyzers: &AnalyzerSet,
    cancel: &CancellationToken,
    parallel: bool,
    blast: Option<&BlastRadius>,
) -> EngineResult<ResolveReport> {
    if let Some(blast) = blast {
        if blast.is_empty() {
            debug!("no files changed; skipping resolution");
            return Ok(ResolveReport::default());
        }
    }

    // Work out which files each language resolves this cycle.
    let mut per_language: HashMap<Language, (Vec<FileRow>, Vec<FileRow>)> = HashMap::new();

    match blast {
        Some(blast) => {
            let mut live: Vec<FileRow> = Vec::new();
            for id in blast.ids() {
                if let Some(file) = store.file_by_id(id)? {
                    live.push(file);
                }
            }
            let live_ids: Vec<i64> = live.iter().map(|f| f.id).collect();
            store.delete_resolution_data_for_files(&live_ids)?;

            for file in live {
                let language = file.language;
                if analyzers.for_language(language).is_none() {
                    continue;
                }
                per_language
                    .entry(language)
                    .or_insert_with(|| (Vec::new(), Vec::new()))
                    .0
                    .push(file);
            }
            for (language, (_, all_files)) in per_language.iter_mut() {
                *all_files = store.files_by_language(*language)?;
            }
        }
        None => {
            for language in store.distinct_languages()? {
                if analyzers.for_language(language).is_none() {
                    continue;
                }
                let files = store.files_by_language(language)?;
                let ids: Vec<i64> = files.iter().map(|f| f.id).collect();
                store.delete_resolution_data_for_files(&ids)?;
                per_language.insert(language, (files.clone(), files));
            }
        }
    }

    let mut report = ResolveReport::default();
    let mut errors = BatchErrors::new();

    let mut work: Vec<(Language, Vec<FileRow>, Vec<FileRow>)> = per_language
        .into_iter()
        .map(|(language, (files, all))| (language, files, all))
        .collect();
    work.sort_by_key(|(language, _, _)| *language);
    let total = work.len();

    if parallel && work.len() > 1 {
        let results: Vec<(Language, usize, Result<(), EngineError>)> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = work
                    .into_iter()
                    .map(|(language, files, all)| {
                        let cancel = cancel.clone();
                        scope.spawn(move || {
                            let count = files.len();
                            let outcome =
                                resolve_language(store, analyzers, &cancel, language, files, all);
                            (language, count, outcome)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().expect("resolver thread panicked"))
                    .collect()
            });
        for (language, files, outcome) in results {
            match outcome {
                Ok(()) => {
                    report.languages_resolved += 1;
                    report.files_resolved += files;
                }
                Err(err) => {
                    warn!(language = %language, error = %err, "resolution failed");
                    errors.record(language.as_str(), err);
                }
            }
        }
    } else {
        for (language, files, all) in work {
            let count = files.len();
            match resolve_language(store, analyzers, cancel, language, files, all) {
                Ok(()) => {
                    report.languages_resolved += 1;
                    report.files_resolved += count;
                }
                Err(err) => {
                    warn!(language = %language, error = %err, "resolution failed");
                    errors.record(language.as_str(), err);
                }
            }
        }
    }

    errors.into_result(total, "languages")?;
    Ok(report)
}

fn resolve_language(
    store: &Store,
    analyzers: &AnalyzerSet,
    cancel: &CancellationToken,
    language: Language,
    files: Vec<FileRow>,
    language_files: Vec<FileRow>,
) -> Result<(), EngineError> {
    cancel.checkpoint()?;
    let analyzer = analyzers
        .for_language(language)
        .ok_or_else(|| EngineError::script(language.as_str(), "no analyzer loaded"))?;

    debug!(language = %language, files = files.len(), "resolving");
    let cx = ResolveContext {
        store,
        files,
        language_files,
        cancel: cancel.clone(),
    };
    analyzer
        .resolve(&cx)
        .map_err(|err| {
            if cancel.is_cancelled() {
                EngineError::Cancelled
            } else {
                EngineError::script(language.as_str(), err.to_string())
            }
        })
}
