//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Import bibliographic records from feeds, exports and scraped pages.
///
/// Imported entries are written to stdout as BibTeX (or JSON with `--json`);
/// logs and diagnostics go to stderr.
#[derive(Parser, Debug)]
#[command(name = "bibimport")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit entries as JSON instead of BibTeX
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub http: HttpArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// HTTP overrides for the config file values.
#[derive(ClapArgs, Debug, Default, Clone, Copy)]
pub struct HttpArgs {
    /// Connect timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout_secs: Option<u64>,

    /// Whole-request timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout_secs: Option<u64>,

    /// Brace-protect acronyms in scraped titles
    #[arg(long, global = true)]
    pub protect_terms: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect the format of a local file and import it ("-" reads stdin)
    Import {
        file: PathBuf,

        /// Skip detection and use this format
        #[arg(short, long, value_name = "NAME")]
        format: Option<String>,
    },

    /// List the registered formats in detection order
    Formats,

    /// Fetch records from arXiv by identifier
    Arxiv {
        #[arg(required = true, value_name = "IDS")]
        ids: Vec<String>,
    },

    /// Fetch records from CiteSeer by record number
    Citeseer {
        #[arg(required = true, value_name = "IDS")]
        ids: Vec<String>,

        /// Fetch the records each identifier cites instead of the record itself
        #[arg(long)]
        citations: bool,
    },

    /// Search DBLP and import every listed record
    Dblp {
        #[arg(required = true, value_name = "QUERY")]
        query: Vec<String>,
    },

    /// Look up one web page through the scraper service
    Scrape { url: String },

    /// List files under a directory that no entry of a BibTeX database links
    Unlinked {
        dir: PathBuf,

        /// BibTeX database whose `file` fields mark files as linked
        #[arg(long, value_name = "FILE")]
        bib: PathBuf,

        /// Only consider files with this extension (repeatable)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
    },
}
