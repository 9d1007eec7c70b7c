//! Command-line argument definitions and conversion into engine
//! inputs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::models::{Page, Sort};
use crate::query::{parse_kinds, parse_sort, parse_visibility};
use crate::store::SymbolFilter;
use crate::EngineResult;

#[derive(Debug, Parser)]
#[command(
    name = "canopy",
    version,
    about = "Deterministic, scope-aware semantic code analyzer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index files or directories into the persistent store.
    Index(IndexArgs),
    /// Run reference resolution for every indexed language.
    Resolve(CommonArgs),
    /// Show index statistics.
    Info(CommonArgs),
    /// List symbols with filters, sorting, and pagination.
    Symbols(SymbolsArgs),
    /// Search symbols by name pattern (`*` matches any run).
    Search(SearchArgs),
    /// Positional lookups: symbol, definition, or scope at a position.
    Lookup(LookupArgs),
    /// List resolved references to a symbol.
    Refs(IdArgs),
    /// Direct or transitive callers of a symbol.
    Callers(CallArgs),
    /// Direct or transitive callees of a symbol.
    Callees(CallArgs),
    /// Implementations of an interface, or interfaces of a type.
    Impls(ImplsArgs),
    /// Full type hierarchy bundle for a symbol.
    Hierarchy(IdArgs),
    /// Imports of one file.
    Deps(DepsArgs),
    /// Re-exports declared by one file.
    Reexports(DepsArgs),
    /// Files importing a given source.
    Dependents(DependentsArgs),
    /// List indexed files.
    Files(FilesArgs),
    /// List package/module/namespace symbols.
    Packages(PackagesArgs),
    /// Aggregated package dependency graph.
    Graph(CommonArgs),
    /// Circular package dependencies.
    Cycles(CommonArgs),
    /// Project-wide summary.
    Summary(SummaryArgs),
    /// Summary for one package.
    PackageSummary(PackageSummaryArgs),
    /// Most referenced symbols with call degrees.
    Hotspots(HotspotsArgs),
    /// Symbols with no incoming references.
    Unused(SymbolsArgs),
    /// Run the HTTP daemon.
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Flags shared by every command.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Index database path (default: `<repo root>/.canopy/index.db`).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Forward the request to a running `canopy serve` instance.
    #[arg(long)]
    pub server: Option<String>,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Files or directories to index.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Restrict indexing to these languages.
    #[arg(long = "language")]
    pub languages: Vec<String>,

    /// Process files one at a time instead of using a worker pool.
    #[arg(long)]
    pub serial: bool,

    /// Skip the resolution pass after extraction.
    #[arg(long)]
    pub no_resolve: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Listing filters shared by `symbols`, `search`, and `unused`.
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Filter to these symbol kinds (any-of).
    #[arg(long = "kind")]
    pub kinds: Vec<String>,

    /// Filter to an exact visibility.
    #[arg(long)]
    pub visibility: Option<String>,

    /// Require these modifiers (all-of).
    #[arg(long = "modifier")]
    pub modifiers: Vec<String>,

    /// Restrict to symbols declared in this file.
    #[arg(long)]
    pub file: Option<String>,

    /// Restrict to children of this symbol id.
    #[arg(long)]
    pub parent_id: Option<i64>,

    /// Restrict to files under this path prefix.
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Minimum reference count.
    #[arg(long)]
    pub ref_min: Option<u64>,

    /// Maximum reference count.
    #[arg(long)]
    pub ref_max: Option<u64>,
}

/// Sort and pagination flags.
#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Sort field: name, kind, file, ref_count, external_ref_count.
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort order: asc or desc.
    #[arg(long)]
    pub order: Option<String>,

    /// Page size (default 50, capped at 500).
    #[arg(long)]
    pub limit: Option<u32>,

    /// Page offset; negative values clamp to zero.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i64,
}

impl PageArgs {
    pub fn sort(&self) -> EngineResult<Sort> {
        parse_sort(self.sort.as_deref(), self.order.as_deref())
    }

    pub fn page(&self) -> Page {
        Page {
            offset: self.offset.max(0) as u32,
            limit: self.limit,
        }
    }
}

impl FilterArgs {
    /// Build the engine filter; the optional `--file` path has already
    /// been resolved to a file id by the caller.
    pub fn filter(&self, file_id: Option<i64>) -> EngineResult<SymbolFilter> {
        let visibility = match &self.visibility {
            Some(value) => Some(parse_visibility(value)?),
            None => None,
        };
        Ok(SymbolFilter {
            kinds: parse_kinds(&self.kinds)?,
            exclude_kinds: Vec::new(),
            visibility,
            modifiers: self.modifiers.clone(),
            file_id,
            parent_id: self.parent_id,
            path_prefix: self.path_prefix.clone(),
            ref_count_min: self.ref_min,
            ref_count_max: self.ref_max,
            name_glob: None,
        })
    }
}

#[derive(Debug, Args)]
pub struct SymbolsArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
    #[command(flatten)]
    pub page: PageArgs,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Name pattern; `*` matches any run of characters.
    pub pattern: String,
    #[command(flatten)]
    pub filters: FilterArgs,
    #[command(flatten)]
    pub page: PageArgs,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LookupWhat {
    Symbol,
    Definition,
    Scope,
    Detail,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Source file path.
    pub file: String,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub col: u32,
    /// What to look up at the position.
    #[arg(long, value_enum, default_value = "symbol")]
    pub what: LookupWhat,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    /// Symbol id.
    pub id: i64,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Symbol id.
    pub id: i64,
    /// Traverse transitively up to this depth (capped at 100).
    #[arg(long, allow_hyphen_values = true)]
    pub depth: Option<i64>,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct ImplsArgs {
    /// Symbol id.
    pub id: i64,
    /// List the interfaces this type implements instead of the types
    /// implementing this interface.
    #[arg(long)]
    pub reverse: bool,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct DepsArgs {
    /// File path.
    pub file: String,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct DependentsArgs {
    /// Import source string (exact or short name).
    pub source: String,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Restrict to files under this path prefix.
    #[arg(long)]
    pub path_prefix: Option<String>,
    /// Restrict to one language.
    #[arg(long)]
    pub language: Option<String>,
    #[command(flatten)]
    pub page: PageArgs,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct PackagesArgs {
    /// Restrict to files under this path prefix.
    #[arg(long)]
    pub path_prefix: Option<String>,
    #[command(flatten)]
    pub page: PageArgs,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Number of top symbols to include.
    #[arg(long, default_value_t = 10)]
    pub top: u32,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct PackageSummaryArgs {
    /// Package path (`app/util`), package name, or `id:<symbol id>`.
    pub selector: String,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct HotspotsArgs {
    /// Number of symbols to report.
    #[arg(long, default_value_t = 10, allow_hyphen_values = true)]
    pub top: i64,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Socket address to bind.
    #[arg(long, default_value = "127.0.0.1:7345")]
    pub addr: String,
    #[command(flatten)]
    pub common: CommonArgs,
}
