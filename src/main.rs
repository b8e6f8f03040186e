//! CLI entry point for the bibimport tool.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bibimport_core::config::{self, FileConfig, VerbositySetting};
use bibimport_core::crawl::{FileNode, UnlinkedFilesCrawler, referenced_files};
use bibimport_core::normalize::CaseKeeper;
use bibimport_core::{
    ArxivSource, CancellationFlag, CiteSeerSource, DblpFetcher, Entry, EntryTypeRegistry,
    FetchPipeline, FetchSummary, FormatRegistry, HttpSettings, ParseResult, ScraperClient,
};
use clap::Parser;
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::{Args, Command};
use progress::ProgressSink;

/// Shared state for one command run.
struct RunContext {
    json: bool,
    quiet: bool,
    file: FileConfig,
    http: HttpSettings,
    case_keeper: Option<CaseKeeper>,
    entry_types: Arc<EntryTypeRegistry>,
    stop: CancellationFlag,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = config::load_config(args.config.as_deref())?;
    let file = loaded.file_config();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config file > info
    let default_level = if args.quiet {
        "error"
    } else {
        match (args.verbose, file.verbosity) {
            (0, None | Some(VerbositySetting::Default)) => "info",
            (0, Some(VerbositySetting::Quiet)) => "error",
            (0, Some(VerbositySetting::Verbose)) | (1, _) => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(?args, config_path = ?loaded.path, "CLI arguments parsed");

    let mut file_with_overrides = file.clone();
    if args.http.protect_terms {
        file_with_overrides.protect_terms = Some(true);
    }
    let case_keeper = file_with_overrides.case_keeper()?;

    let mut http = file.http_settings();
    if let Some(secs) = args.http.connect_timeout_secs {
        http.connect_timeout_secs = secs;
    }
    if let Some(secs) = args.http.read_timeout_secs {
        http.read_timeout_secs = secs;
    }

    let stop = CancellationFlag::new();
    let stop_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_signal.cancel();
        }
    });

    let ctx = RunContext {
        json: args.json,
        quiet: args.quiet,
        file,
        http,
        case_keeper,
        entry_types: Arc::new(EntryTypeRegistry::with_builtins()),
        stop,
    };

    match args.command {
        Command::Import { file, format } => import_file(&ctx, &file, format.as_deref()),
        Command::Formats => list_formats(&ctx),
        Command::Arxiv { ids } => {
            let base = ctx
                .file
                .arxiv_oai_url
                .as_deref()
                .unwrap_or(ArxivSource::DEFAULT_BASE_URL);
            let source = ArxivSource::with_base_url(&ctx.http, base)?;
            run_pipeline(&ctx, FetchPipeline::new(Box::new(source)), &ids).await
        }
        Command::Citeseer { ids, citations } => {
            let base = ctx
                .file
                .citeseer_oai_url
                .as_deref()
                .unwrap_or(CiteSeerSource::DEFAULT_BASE_URL);
            let source = CiteSeerSource::with_base_url(&ctx.http, base)?;
            if citations {
                fetch_citations(&ctx, &source, &ids).await
            } else {
                run_pipeline(&ctx, FetchPipeline::new(Box::new(source)), &ids).await
            }
        }
        Command::Dblp { query } => search_dblp(&ctx, &query.join(" ")).await,
        Command::Scrape { url } => scrape(&ctx, &url).await,
        Command::Unlinked {
            dir,
            bib,
            extensions,
        } => list_unlinked(&ctx, &dir, &bib, &extensions),
    }
}

fn new_sink(ctx: &RunContext) -> ProgressSink {
    let show_bar = io::stderr().is_terminal() && !ctx.quiet;
    ProgressSink::new(show_bar, ctx.stop.clone())
}

fn import_file(ctx: &RunContext, path: &Path, format: Option<&str>) -> Result<ExitCode> {
    let registry = FormatRegistry::with_defaults(Arc::clone(&ctx.entry_types));
    let result = if path == Path::new("-") {
        let stdin = io::stdin().lock();
        let imported = match format {
            Some(name) => registry.import_with(name, stdin),
            None => registry.import_auto(stdin),
        };
        imported.context("Failed to import standard input")?
    } else {
        let file = File::open(path)
            .with_context(|| format!("Failed to open '{}'", path.display()))?;
        let imported = match format {
            Some(name) => registry.import_with(name, file),
            None => registry.import_auto(file),
        };
        imported.with_context(|| format!("Failed to import '{}'", path.display()))?
    };

    for warning in result.warnings() {
        warn!("{warning}");
    }
    // Non-interactive shell: declared types are accepted without asking
    for entry_type in result.custom_types() {
        ctx.entry_types.register_custom(entry_type.clone(), |_| true);
    }
    info!(
        entries = result.len(),
        encoding = result.encoding().unwrap_or("unknown"),
        "Imported file"
    );
    write_entries(ctx, result.entries())?;
    Ok(ExitCode::SUCCESS)
}

fn list_formats(ctx: &RunContext) -> Result<ExitCode> {
    let registry = FormatRegistry::with_defaults(Arc::clone(&ctx.entry_types));
    let mut out = io::stdout().lock();
    for format in registry.formats() {
        writeln!(
            out,
            "{:<10} {:<12} {}",
            format.name(),
            format.priority().label(),
            format.description()
        )?;
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_pipeline(ctx: &RunContext, pipeline: FetchPipeline, ids: &[String]) -> Result<ExitCode> {
    let mut sink = new_sink(ctx);
    let summary = pipeline.run(&ids.join(" "), &mut sink).await;
    finish_fetch(ctx, sink, summary)
}

async fn fetch_citations(
    ctx: &RunContext,
    source: &CiteSeerSource,
    ids: &[String],
) -> Result<ExitCode> {
    let mut sink = new_sink(ctx);
    let mut summary = FetchSummary::default();
    for id in ids {
        if ctx.stop.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        let part = source.fetch_citations(id, &mut sink).await;
        summary.requested += part.requested;
        summary.imported += part.imported;
        summary.failed += part.failed;
        summary.cancelled |= part.cancelled;
    }
    finish_fetch(ctx, sink, summary)
}

async fn search_dblp(ctx: &RunContext, query: &str) -> Result<ExitCode> {
    let base = ctx
        .file
        .dblp_url
        .as_deref()
        .unwrap_or(DblpFetcher::DEFAULT_BASE_URL);
    let mut fetcher = DblpFetcher::with_base_url(&ctx.http, Arc::clone(&ctx.entry_types), base)?;
    if let Some(keeper) = &ctx.case_keeper {
        fetcher = fetcher.with_case_keeper(keeper.clone());
    }
    let mut sink = new_sink(ctx);
    let summary = fetcher.search(query, &mut sink).await;
    finish_fetch(ctx, sink, summary)
}

async fn scrape(ctx: &RunContext, url: &str) -> Result<ExitCode> {
    let service = ctx
        .file
        .scraper_url
        .as_deref()
        .unwrap_or(ScraperClient::DEFAULT_SERVICE_URL);
    let mut client =
        ScraperClient::with_service_url(&ctx.http, Arc::clone(&ctx.entry_types), service)?;
    if let Some(keeper) = &ctx.case_keeper {
        client = client.with_case_keeper(keeper.clone());
    }
    match client.lookup(url).await {
        Some(entry) => {
            write_entries(ctx, std::slice::from_ref(&entry))?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!(url, "The scraper service returned no entry");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn finish_fetch(ctx: &RunContext, sink: ProgressSink, summary: FetchSummary) -> Result<ExitCode> {
    let diagnostics = sink.diagnostic_count();
    let entries = sink.finish();
    info!(
        requested = summary.requested,
        imported = summary.imported,
        failed = summary.failed,
        diagnostics,
        "Fetch complete"
    );
    write_entries(ctx, &entries)?;

    if summary.cancelled {
        warn!(imported = summary.imported, "Interrupted before all records were fetched");
        return Ok(ExitCode::FAILURE);
    }
    if summary.imported == 0 && summary.failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn list_unlinked(
    ctx: &RunContext,
    dir: &Path,
    bib: &Path,
    extensions: &[String],
) -> Result<ExitCode> {
    if !dir.is_dir() {
        bail!("'{}' is not a directory", dir.display());
    }
    let registry = FormatRegistry::with_defaults(Arc::clone(&ctx.entry_types));
    let database = File::open(bib)
        .with_context(|| format!("Failed to open database '{}'", bib.display()))?;
    let result: ParseResult = registry
        .import_with("bibtex", database)
        .with_context(|| format!("Failed to read database '{}'", bib.display()))?;

    let base_dir = bib.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let referenced: HashSet<PathBuf> = referenced_files(&result, &base_dir);
    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .collect();
    let filter = |path: &Path| {
        wanted.is_empty()
            || path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| wanted.contains(&ext.to_ascii_lowercase()))
    };

    let crawler = UnlinkedFilesCrawler::new(dir, referenced);
    let Some(tree) = crawler.crawl(filter, &ctx.stop) else {
        info!("No unlinked files found");
        return Ok(ExitCode::SUCCESS);
    };
    print_tree(&tree)?;
    Ok(ExitCode::SUCCESS)
}

fn print_tree(tree: &FileNode) -> Result<()> {
    let mut out = io::stdout().lock();
    for path in tree.files() {
        writeln!(out, "{}", path.display())?;
    }
    Ok(())
}

fn write_entries(ctx: &RunContext, entries: &[Entry]) -> Result<()> {
    let mut out = io::stdout().lock();
    if ctx.json {
        serde_json::to_writer_pretty(&mut out, entries).context("Failed to encode entries")?;
        writeln!(out)?;
    } else {
        for entry in entries {
            writeln!(out, "{}", entry.to_bibtex())?;
        }
    }
    Ok(())
}
