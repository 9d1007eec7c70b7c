//! The engine façade: indexing, resolution, and query access over one
//! persistent store.

pub mod cancel;
pub mod error;
pub mod fingerprint;
mod indexer;
mod resolver;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::analyzer::AnalyzerSet;
use crate::models::Language;
use crate::query::QueryHandle;
use crate::store::{schema, Store};

pub use cancel::CancellationToken;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use indexer::{discover_files, IndexReport};
pub use resolver::ResolveReport;

use indexer::BlastRadius;

/// Engine construction options.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Restrict indexing and resolution to these languages.
    pub languages: Option<Vec<Language>>,
    /// Run extraction workers and resolution fan-out concurrently.
    pub parallel: bool,
}

/// Default on-disk location for the index database: `.canopy/index.db`
/// under the nearest ancestor carrying a `.git` marker, else under the
/// target directory itself.
pub fn default_db_path(target: &Path) -> PathBuf {
    let start = target
        .canonicalize()
        .unwrap_or_else(|_| target.to_path_buf());
    let mut current: Option<&Path> = Some(&start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return dir.join(".canopy").join("index.db");
        }
        current = dir.parent();
    }
    start.join(".canopy").join("index.db")
}

pub struct Engine {
    store: Store,
    analyzers: AnalyzerSet,
    options: EngineOptions,
    cancel: CancellationToken,
    /// `None` means the next resolve covers everything (first run or
    /// forced rebuild); otherwise the set accumulated by indexing.
    blast: Mutex<Option<BlastRadius>>,
}

impl Engine {
    /// Open (or create) an engine over the database at `db_path`, with
    /// `analyzers` as the scripts source.
    pub fn new(
        db_path: &Path,
        analyzers: AnalyzerSet,
        options: EngineOptions,
    ) -> EngineResult<Self> {
        let analyzers = match &options.languages {
            Some(list) => AnalyzerSet::restricted(list),
            None => analyzers,
        };
        let store = Store::open(db_path)?;
        Self::with_store(store, analyzers, options)
    }

    /// In-memory engine, used by tests.
    pub fn in_memory(analyzers: AnalyzerSet, options: EngineOptions) -> EngineResult<Self> {
        let analyzers = match &options.languages {
            Some(list) => AnalyzerSet::restricted(list),
            None => analyzers,
        };
        let store = Store::open_in_memory()?;
        Self::with_store(store, analyzers, options)
    }

    fn with_store(
        store: Store,
        analyzers: AnalyzerSet,
        options: EngineOptions,
    ) -> EngineResult<Self> {
        let current = analyzers.bundle_hash();
        let stored = store.get_metadata(schema::META_SCRIPTS_HASH)?;

        let blast = match stored {
            Some(hash) if hash == current => Some(BlastRadius::default()),
            Some(_) => {
                warn!("analyzer bundle changed; rebuilding index from scratch");
                store.clear_all()?;
                None
            }
            None => None,
        };

        Ok(Self {
            store,
            analyzers,
            options,
            cancel: CancellationToken::new(),
            blast: Mutex::new(blast),
        })
    }

    /// Whether the loaded analyzer bundle differs from the one that
    /// produced the persisted index.
    pub fn scripts_changed(&self) -> EngineResult<bool> {
        let stored = self.store.get_metadata(schema::META_SCRIPTS_HASH)?;
        Ok(match stored {
            Some(hash) => hash != self.analyzers.bundle_hash(),
            None => true,
        })
    }

    /// A clone of the ambient cancellation token; signalling it makes
    /// long-running calls return [`EngineError::Cancelled`] at their
    /// next safe point.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Index an explicit list of files.
    pub fn index_files(&self, paths: &[PathBuf]) -> EngineResult<IndexReport> {
        let mut local = BlastRadius::default();
        let result = indexer::index_paths(
            &self.store,
            &self.analyzers,
            &self.cancel,
            self.options.parallel,
            paths,
            &mut local,
        );
        self.merge_blast(local);
        result
    }

    /// Discover and index every supported file under `root`, removing
    /// file rows whose paths left the discovered set.
    pub fn index_directory(&self, root: &Path) -> EngineResult<IndexReport> {
        let discovered = indexer::discover_files(root, &self.analyzers);
        info!(root = %root.display(), files = discovered.len(), "indexing directory");

        let mut local = BlastRadius::default();
        let result = indexer::index_paths(
            &self.store,
            &self.analyzers,
            &self.cancel,
            self.options.parallel,
            &discovered,
            &mut local,
        );

        // Stale rows: previously indexed paths under this root that are
        // gone from the discovered set.
        let mut removed = 0usize;
        let removal_result = (|| -> EngineResult<()> {
            let discovered_set: std::collections::HashSet<String> = discovered
                .iter()
                .map(|path| indexer::canonical_path(path))
                .collect();
            let root_prefix = format!(
                "{}/",
                indexer::canonical_path(root).trim_end_matches('/')
            );
            for file in self.store.list_files()? {
                if file.path.starts_with(&root_prefix) && !discovered_set.contains(&file.path) {
                    indexer::remove_file(&self.store, file.id, &mut local)?;
                    removed += 1;
                }
            }
            Ok(())
        })();

        self.merge_blast(local);

        removal_result?;
        let mut report = result?;
        report.files_removed = removed;
        Ok(report)
    }

    fn merge_blast(&self, local: BlastRadius) {
        let mut guard = self
            .blast
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(accumulated) = guard.as_mut() {
            accumulated.extend(local.ids());
        }
        // When `None`, the next resolve already covers everything.
    }

    /// Run resolution for every language present, incrementally when a
    /// blast radius is available. On full success the analyzer bundle
    /// hash is persisted and the blast radius resets.
    pub fn resolve(&self) -> EngineResult<ResolveReport> {
        let pending = {
            let mut guard = self
                .blast
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.take()
        };

        let report = resolver::run_resolution(
            &self.store,
            &self.analyzers,
            &self.cancel,
            self.options.parallel,
            pending.as_ref(),
        );

        match report {
            Ok(report) => {
                self.store
                    .set_metadata(schema::META_SCRIPTS_HASH, &self.analyzers.bundle_hash())?;
                let mut guard = self
                    .blast
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = Some(BlastRadius::default());
                Ok(report)
            }
            Err(err) => {
                // Keep the staleness marker so a retry re-resolves.
                let mut guard = self
                    .blast
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = pending;
                Err(err)
            }
        }
    }

    /// Read-side access to the index.
    pub fn query(&self) -> QueryHandle<'_> {
        QueryHandle::new(&self.store, self.cancel.clone())
    }

    /// Close the engine, releasing the store.
    pub fn close(self) {
        drop(self);
    }
}
