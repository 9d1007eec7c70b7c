//! SQLite schema for the two-tier index.
//!
//! Extraction tables (`files`, `symbols`, `scopes`, `refs`, `imports`,
//! `type_members`, `function_params`, `type_params`, `annotations`) are
//! written per file; resolution tables (`resolved_refs`, `call_edges`,
//! `implementations`, `type_compositions`, `extension_bindings`,
//! `reexports`) per language. Referential cleanup is delegated to
//! `ON DELETE CASCADE` chains rooted at `files` and `symbols`, so
//! deleting a file removes its extraction rows and every resolution row
//! that transitively references its symbols.
//!
//! Initialization is idempotent: every statement is `IF NOT EXISTS` and
//! the logical schema version lives in the `meta` table.

use rusqlite::Connection;

use super::StoreResult;

/// Logical schema version stored under `meta.schema_version`.
pub const SCHEMA_VERSION: &str = "1";

/// Metadata key for the analyzer bundle hash.
pub const META_SCRIPTS_HASH: &str = "scripts_hash";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id         INTEGER PRIMARY KEY,
    path       TEXT NOT NULL UNIQUE,
    language   TEXT NOT NULL,
    hash       TEXT NOT NULL,
    line_count INTEGER NOT NULL,
    indexed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS symbols (
    id               INTEGER PRIMARY KEY,
    file_id          INTEGER REFERENCES files(id) ON DELETE CASCADE,
    name             TEXT NOT NULL,
    kind             TEXT NOT NULL,
    visibility       TEXT NOT NULL,
    modifiers        TEXT NOT NULL DEFAULT '',
    signature_hash   TEXT NOT NULL,
    start_line       INTEGER NOT NULL,
    start_col        INTEGER NOT NULL,
    end_line         INTEGER NOT NULL,
    end_col          INTEGER NOT NULL,
    parent_symbol_id INTEGER REFERENCES symbols(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_symbols_file_id ON symbols(file_id);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_parent ON symbols(parent_symbol_id);

CREATE TABLE IF NOT EXISTS scopes (
    id              INTEGER PRIMARY KEY,
    file_id         INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    kind            TEXT NOT NULL,
    start_line      INTEGER NOT NULL,
    start_col       INTEGER NOT NULL,
    end_line        INTEGER NOT NULL,
    end_col         INTEGER NOT NULL,
    parent_scope_id INTEGER REFERENCES scopes(id) ON DELETE CASCADE,
    symbol_id       INTEGER REFERENCES symbols(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_scopes_file_range ON scopes(file_id, start_line, end_line);
CREATE INDEX IF NOT EXISTS idx_scopes_parent ON scopes(parent_scope_id);

CREATE TABLE IF NOT EXISTS refs (
    id         INTEGER PRIMARY KEY,
    file_id    INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    name       TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_col  INTEGER NOT NULL,
    end_line   INTEGER NOT NULL,
    end_col    INTEGER NOT NULL,
    context    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_refs_file_line ON refs(file_id, start_line);
CREATE INDEX IF NOT EXISTS idx_refs_name ON refs(name);

CREATE TABLE IF NOT EXISTS imports (
    id       INTEGER PRIMARY KEY,
    file_id  INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    source   TEXT NOT NULL,
    name     TEXT,
    alias    TEXT,
    kind     TEXT NOT NULL,
    scope_id INTEGER REFERENCES scopes(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_imports_file_id ON imports(file_id);
CREATE INDEX IF NOT EXISTS idx_imports_source ON imports(source);

CREATE TABLE IF NOT EXISTS type_members (
    id         INTEGER PRIMARY KEY,
    symbol_id  INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    name       TEXT NOT NULL,
    kind       TEXT NOT NULL,
    type_expr  TEXT NOT NULL DEFAULT '',
    visibility TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_type_members_symbol ON type_members(symbol_id);

CREATE TABLE IF NOT EXISTS function_params (
    id          INTEGER PRIMARY KEY,
    symbol_id   INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    ordinal     INTEGER NOT NULL,
    name        TEXT NOT NULL,
    type_expr   TEXT NOT NULL DEFAULT '',
    is_receiver INTEGER NOT NULL DEFAULT 0,
    is_return   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_function_params_symbol ON function_params(symbol_id);

CREATE TABLE IF NOT EXISTS type_params (
    id          INTEGER PRIMARY KEY,
    symbol_id   INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    ordinal     INTEGER NOT NULL,
    name        TEXT NOT NULL,
    constraints TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_type_params_symbol ON type_params(symbol_id);

CREATE TABLE IF NOT EXISTS annotations (
    id        INTEGER PRIMARY KEY,
    symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    name      TEXT NOT NULL,
    arguments TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_annotations_symbol ON annotations(symbol_id);

CREATE TABLE IF NOT EXISTS resolved_refs (
    id         INTEGER PRIMARY KEY,
    ref_id     INTEGER NOT NULL UNIQUE REFERENCES refs(id) ON DELETE CASCADE,
    symbol_id  INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    confidence REAL NOT NULL,
    kind       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_resolved_refs_symbol ON resolved_refs(symbol_id);

CREATE TABLE IF NOT EXISTS call_edges (
    id                INTEGER PRIMARY KEY,
    caller_symbol_id  INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    callee_symbol_id  INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    file_id           INTEGER REFERENCES files(id) ON DELETE CASCADE,
    line              INTEGER NOT NULL,
    col               INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_call_edges_caller ON call_edges(caller_symbol_id);
CREATE INDEX IF NOT EXISTS idx_call_edges_callee ON call_edges(callee_symbol_id);

CREATE TABLE IF NOT EXISTS implementations (
    id                  INTEGER PRIMARY KEY,
    type_symbol_id      INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    interface_symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    kind                TEXT NOT NULL,
    file_id             INTEGER REFERENCES files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_implementations_type ON implementations(type_symbol_id);
CREATE INDEX IF NOT EXISTS idx_implementations_interface ON implementations(interface_symbol_id);

CREATE TABLE IF NOT EXISTS type_compositions (
    id                  INTEGER PRIMARY KEY,
    composite_symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    component_symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    kind                TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_type_compositions_composite ON type_compositions(composite_symbol_id);
CREATE INDEX IF NOT EXISTS idx_type_compositions_component ON type_compositions(component_symbol_id);

CREATE TABLE IF NOT EXISTS extension_bindings (
    id                      INTEGER PRIMARY KEY,
    member_symbol_id        INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    extended_type           TEXT NOT NULL,
    extended_type_symbol_id INTEGER REFERENCES symbols(id) ON DELETE CASCADE,
    kind                    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_extension_bindings_type ON extension_bindings(extended_type_symbol_id);
CREATE INDEX IF NOT EXISTS idx_extension_bindings_member ON extension_bindings(member_symbol_id);

CREATE TABLE IF NOT EXISTS reexports (
    id            INTEGER PRIMARY KEY,
    file_id       INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    symbol_id     INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    exported_name TEXT NOT NULL,
    source        TEXT,
    alias         TEXT,
    kind          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reexports_file ON reexports(file_id);
"#;

/// Create any missing tables and indexes and stamp the schema version.
///
/// Safe to call on every open; an existing database with a different
/// recorded version is rejected rather than silently reinterpreted.
pub fn initialize(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match stored {
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                [SCHEMA_VERSION],
            )?;
            Ok(())
        }
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) => Err(super::StoreError::Corrupt(format!(
            "unsupported index schema version {version}; expected {SCHEMA_VERSION}"
        ))),
    }
}
