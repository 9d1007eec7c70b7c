//! CLI front end: argument parsing, config defaults, dispatch, and
//! rendering. All semantic work happens in the engine; this layer only
//! converts inputs and prints results.

mod args;
mod config;
mod format;
mod http_backend;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use serde::Serialize;

use crate::analyzer::AnalyzerSet;
use crate::engine::{default_db_path, Engine, EngineOptions, IndexReport};
use crate::models::Language;
use crate::server::{IndexRequest, SummaryRequest, SymbolsRequest};

pub use args::{
    CallArgs, Cli, Commands, CommonArgs, DependentsArgs, DepsArgs, FilesArgs, FilterArgs,
    HotspotsArgs, IdArgs, ImplsArgs, IndexArgs, LookupArgs, LookupWhat, OutputFormat,
    PackageSummaryArgs, PackagesArgs, PageArgs, SearchArgs, ServeArgs, SummaryArgs, SymbolsArgs,
};

use config::CliConfig;
use http_backend::HttpBackend;

/// Entry point for the CLI binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config()?.unwrap_or_default();

    let Some(command) = cli.command else {
        let mut cmd = Cli::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    dispatch(command, &config)
}

fn db_path(common: &CommonArgs, config: &CliConfig) -> Result<PathBuf> {
    if let Some(db) = &common.db {
        return Ok(db.clone());
    }
    if let Some(db) = &config.db {
        return Ok(db.clone());
    }
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    Ok(default_db_path(&cwd))
}

fn server_url(common: &CommonArgs, config: &CliConfig) -> Option<String> {
    common.server.clone().or_else(|| config.server.clone())
}

fn parse_languages(values: &[String]) -> Result<Option<Vec<Language>>> {
    if values.is_empty() {
        return Ok(None);
    }
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match Language::parse(value) {
            Some(language) => out.push(language),
            None => bail!("unknown language: {value}"),
        }
    }
    Ok(Some(out))
}

fn open_engine(
    common: &CommonArgs,
    config: &CliConfig,
    languages: Option<Vec<Language>>,
    serial: bool,
) -> Result<Engine> {
    let db = db_path(common, config)?;
    let options = EngineOptions {
        languages,
        parallel: !(serial || config.serial),
    };
    Engine::new(&db, AnalyzerSet::builtin(), options)
        .with_context(|| format!("cannot open index at {}", db.display()))
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T),
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer(std::io::stdout(), value)?;
            println!();
        }
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Commands that only run locally reject an explicit `--server`; a
/// server configured in `canopy.toml` is just a default for the
/// commands that support forwarding.
fn require_local(common: &CommonArgs, _config: &CliConfig) -> Result<()> {
    if common.server.is_some() {
        bail!("this command is not supported via --server; run it locally");
    }
    Ok(())
}

fn dispatch(command: Commands, config: &CliConfig) -> Result<()> {
    match command {
        Commands::Index(args) => cmd_index(args, config),
        Commands::Resolve(common) => {
            if let Some(url) = server_url(&common, config) {
                let report = HttpBackend::new(url)?.resolve()?;
                return emit(common.format, &report, format::print_resolve_report);
            }
            let engine = open_engine(&common, config, None, false)?;
            let report = engine.resolve()?;
            emit(common.format, &report, format::print_resolve_report)
        }
        Commands::Info(common) => cmd_info(common, config),
        Commands::Symbols(args) => cmd_symbols(args, config, None),
        Commands::Search(args) => {
            let SearchArgs {
                pattern,
                filters,
                page,
                common,
            } = args;
            cmd_symbols(
                SymbolsArgs {
                    filters,
                    page,
                    common,
                },
                config,
                Some(pattern),
            )
        }
        Commands::Lookup(args) => cmd_lookup(args, config),
        Commands::Refs(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let locations = engine.query().references_to(args.id)?;
            emit(args.common.format, &locations, |locations| {
                format::print_locations(locations)
            })
        }
        Commands::Callers(args) => cmd_calls(args, config, true),
        Commands::Callees(args) => cmd_calls(args, config, false),
        Commands::Impls(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let related = if args.reverse {
                engine.query().implements_interfaces(args.id)?
            } else {
                engine.query().implementations(args.id)?
            };
            emit(args.common.format, &related, |related| {
                format::print_related(related)
            })
        }
        Commands::Hierarchy(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let hierarchy = engine.query().type_hierarchy(args.id)?;
            emit(args.common.format, &hierarchy, |hierarchy| {
                format::print_hierarchy(hierarchy.as_ref())
            })
        }
        Commands::Deps(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let query = engine.query();
            let imports = match query.file_by_path(&args.file)? {
                Some(file) => query.dependencies(file.id)?,
                None => Vec::new(),
            };
            emit(args.common.format, &imports, |imports| {
                format::print_imports(imports)
            })
        }
        Commands::Reexports(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let query = engine.query();
            let rows = match query.file_by_path(&args.file)? {
                Some(file) => query.reexports(file.id)?,
                None => Vec::new(),
            };
            emit(args.common.format, &rows, |rows| {
                format::print_reexports(rows)
            })
        }
        Commands::Dependents(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let files = engine.query().dependents(&args.source)?;
            emit(args.common.format, &files, |files| {
                if files.is_empty() {
                    println!("no dependents");
                } else {
                    for file in files {
                        println!("{}", file.path);
                    }
                }
            })
        }
        Commands::Files(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let language = match &args.language {
                Some(value) => match Language::parse(value) {
                    Some(language) => Some(language),
                    None => bail!("unknown language: {value}"),
                },
                None => None,
            };
            let page = engine.query().files(
                args.path_prefix.as_deref(),
                language,
                args.page.sort()?,
                args.page.page(),
            )?;
            emit(args.common.format, &page, format::print_files)
        }
        Commands::Packages(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let page = engine.query().packages(
                args.path_prefix.as_deref(),
                args.page.sort()?,
                args.page.page(),
            )?;
            emit(args.common.format, &page, format::print_symbols)
        }
        Commands::Graph(common) => {
            require_local(&common, config)?;
            let engine = open_engine(&common, config, None, false)?;
            let graph = engine.query().package_dependency_graph()?;
            emit(common.format, &graph, format::print_package_graph)
        }
        Commands::Cycles(common) => {
            require_local(&common, config)?;
            let engine = open_engine(&common, config, None, false)?;
            let cycles = engine.query().circular_dependencies()?;
            emit(common.format, &cycles, |cycles| format::print_cycles(cycles))
        }
        Commands::Summary(args) => {
            if let Some(url) = server_url(&args.common, config) {
                let summary =
                    HttpBackend::new(url)?.summary(&SummaryRequest { top: args.top })?;
                return emit(args.common.format, &summary, format::print_project_summary);
            }
            let engine = open_engine(&args.common, config, None, false)?;
            let summary = engine.query().project_summary(args.top)?;
            emit(args.common.format, &summary, format::print_project_summary)
        }
        Commands::PackageSummary(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let query = engine.query();
            let summary = match args.selector.strip_prefix("id:") {
                Some(id) => {
                    let id: i64 = id
                        .parse()
                        .with_context(|| format!("invalid symbol id: {id}"))?;
                    query.package_summary_by_id(id)?
                }
                None => query.package_summary_by_path(&args.selector)?,
            };
            emit(args.common.format, &summary, |summary| {
                format::print_package_summary(summary.as_ref())
            })
        }
        Commands::Hotspots(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let hotspots = engine.query().hotspots(args.top)?;
            emit(args.common.format, &hotspots, |hotspots| {
                format::print_hotspots(hotspots)
            })
        }
        Commands::Unused(args) => {
            require_local(&args.common, config)?;
            let engine = open_engine(&args.common, config, None, false)?;
            let query = engine.query();
            let file_id = resolve_file_filter(&query, &args.filters)?;
            let filter = args.filters.filter(file_id)?;
            let page = query.unused_symbols(&filter, args.page.sort()?, args.page.page())?;
            emit(args.common.format, &page, format::print_symbols)
        }
        Commands::Serve(args) => cmd_serve(args, config),
    }
}

fn cmd_index(args: IndexArgs, config: &CliConfig) -> Result<()> {
    if let Some(url) = server_url(&args.common, config) {
        let response = HttpBackend::new(url)?.index(&IndexRequest {
            paths: args.paths.clone(),
            resolve: !args.no_resolve,
        })?;
        emit(args.common.format, &response.index, format::print_index_report)?;
        if let Some(resolve) = &response.resolve {
            format::print_resolve_report(resolve);
        }
        return Ok(());
    }

    let languages = if args.languages.is_empty() {
        parse_languages(&config.languages)?
    } else {
        parse_languages(&args.languages)?
    };
    let engine = open_engine(&args.common, config, languages, args.serial)?;

    let mut report = IndexReport::default();
    for path in &args.paths {
        let partial = if path.is_dir() {
            engine.index_directory(path)?
        } else {
            engine.index_files(std::slice::from_ref(path))?
        };
        report.files_seen += partial.files_seen;
        report.files_indexed += partial.files_indexed;
        report.files_unchanged += partial.files_unchanged;
        report.files_removed += partial.files_removed;
        report.symbols_indexed += partial.symbols_indexed;
    }

    emit(args.common.format, &report, format::print_index_report)?;

    if !args.no_resolve {
        let resolve_report = engine.resolve()?;
        if args.common.format == OutputFormat::Text {
            format::print_resolve_report(&resolve_report);
        }
    }
    Ok(())
}

fn cmd_info(common: CommonArgs, config: &CliConfig) -> Result<()> {
    require_local(&common, config)?;
    let engine = open_engine(&common, config, None, false)?;
    let summary = engine.query().project_summary(0)?;
    let scripts_changed = engine.scripts_changed()?;

    #[derive(Serialize)]
    struct Info<'a> {
        summary: &'a crate::query::ProjectSummary,
        scripts_changed: bool,
    }
    let info = Info {
        summary: &summary,
        scripts_changed,
    };
    emit(common.format, &info, |info| {
        format::print_project_summary(info.summary);
        if info.scripts_changed {
            println!("analyzers changed since last resolve; reindex required");
        }
    })
}

fn resolve_file_filter(
    query: &crate::query::QueryHandle<'_>,
    filters: &FilterArgs,
) -> Result<Option<i64>> {
    match &filters.file {
        None => Ok(None),
        Some(path) => match query.file_by_path(path)? {
            Some(file) => Ok(Some(file.id)),
            // An unknown file matches nothing; filter on an id no row
            // can carry.
            None => Ok(Some(-1)),
        },
    }
}

fn cmd_symbols(args: SymbolsArgs, config: &CliConfig, pattern: Option<String>) -> Result<()> {
    if let Some(url) = server_url(&args.common, config) {
        if args.filters.file.is_some() || args.filters.parent_id.is_some() {
            bail!("--file and --parent-id are not supported via --server");
        }
        let request = SymbolsRequest {
            pattern: pattern.clone(),
            kinds: args.filters.kinds.clone(),
            visibility: args.filters.visibility.clone(),
            modifiers: args.filters.modifiers.clone(),
            path_prefix: args.filters.path_prefix.clone(),
            ref_min: args.filters.ref_min,
            ref_max: args.filters.ref_max,
            sort: args.page.sort.clone(),
            order: args.page.order.clone(),
            limit: args.page.limit,
            offset: args.page.offset.max(0) as u32,
        };
        let backend = HttpBackend::new(url)?;
        let page = if pattern.is_some() {
            backend.search(&request)?
        } else {
            backend.symbols(&request)?
        };
        return emit(args.common.format, &page, format::print_symbols);
    }

    let engine = open_engine(&args.common, config, None, false)?;
    let query = engine.query();
    let file_id = resolve_file_filter(&query, &args.filters)?;
    let filter = args.filters.filter(file_id)?;
    let sort = args.page.sort()?;
    let page = args.page.page();

    let result = match pattern {
        Some(pattern) => query.search_symbols(&pattern, &filter, sort, page)?,
        None => query.symbols(&filter, sort, page)?,
    };
    emit(args.common.format, &result, format::print_symbols)
}

fn cmd_lookup(args: LookupArgs, config: &CliConfig) -> Result<()> {
    require_local(&args.common, config)?;
    let engine = open_engine(&args.common, config, None, false)?;
    let query = engine.query();

    match args.what {
        LookupWhat::Symbol => {
            let info = query.symbol_at(&args.file, args.line, args.col)?;
            emit(args.common.format, &info, |info| {
                format::print_symbol_info(info.as_ref())
            })
        }
        LookupWhat::Definition => {
            let locations = query.definition_at(&args.file, args.line, args.col)?;
            emit(args.common.format, &locations, |locations| {
                format::print_locations(locations)
            })
        }
        LookupWhat::Scope => {
            let chain = query.scope_at(&args.file, args.line, args.col)?;
            emit(args.common.format, &chain, |chain| {
                format::print_scopes(chain)
            })
        }
        LookupWhat::Detail => {
            let detail = query.symbol_detail_at(&args.file, args.line, args.col)?;
            emit(args.common.format, &detail, |detail| {
                format::print_symbol_detail(detail.as_ref())
            })
        }
    }
}

fn cmd_calls(args: CallArgs, config: &CliConfig, callers: bool) -> Result<()> {
    require_local(&args.common, config)?;
    let engine = open_engine(&args.common, config, None, false)?;
    let query = engine.query();

    match args.depth {
        Some(depth) => {
            let graph = if callers {
                query.transitive_callers(args.id, depth)?
            } else {
                query.transitive_callees(args.id, depth)?
            };
            emit(args.common.format, &graph, |graph| {
                format::print_call_graph(graph.as_ref())
            })
        }
        None => {
            let sites = if callers {
                query.callers(args.id)?
            } else {
                query.callees(args.id)?
            };
            emit(args.common.format, &sites, |sites| {
                format::print_call_sites(sites)
            })
        }
    }
}

fn cmd_serve(args: ServeArgs, config: &CliConfig) -> Result<()> {
    let addr: SocketAddr = args
        .addr
        .parse()
        .with_context(|| format!("invalid listen address: {}", args.addr))?;

    let engine = Arc::new(open_engine(&args.common, config, None, false)?);
    println!("starting canopy HTTP server on http://{addr}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(crate::server::run(addr, engine))
}
