//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::lineage::DEFAULT_DEPTH;
use crate::ports::fetcher::SourceKind;

/// Top-level CLI parser for `schemalink`.
#[derive(Debug, Parser)]
#[command(
    name = "schemalink",
    version,
    about = "Keep warehouse metadata in sync with its documentation"
)]
pub struct Cli {
    /// Config file (defaults to $SCHEMALINK_CONFIG, then ./schemalink.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync one source document into the warehouse.
    Sync {
        /// Source type: confluence, jira or file.
        source_type: SourceKind,
        /// Page id, issue key or file name.
        source_id: String,
        /// Check drift and print planned comments without writing.
        #[arg(long)]
        dry_run: bool,
        /// Skip the drift check.
        #[arg(long)]
        skip_drift: bool,
        /// Skip quality checks.
        #[arg(long)]
        skip_quality: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Sync several sources, in parallel by default.
    Batch {
        /// Source as <type>:<id>; repeat for each source.
        #[arg(long = "source", required = true)]
        sources: Vec<String>,
        /// Run jobs one after another.
        #[arg(long)]
        sequential: bool,
        /// Override `batch.max_workers`.
        #[arg(long)]
        workers: Option<usize>,
        /// Check drift without writing.
        #[arg(long)]
        dry_run: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compare a documented schema file against a live schema file.
    Drift {
        /// YAML/JSON schema as documented.
        #[arg(long)]
        documented: PathBuf,
        /// YAML/JSON schema as found in the warehouse.
        #[arg(long)]
        live: PathBuf,
        /// Also report differing descriptions.
        #[arg(long)]
        check_descriptions: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Query the lineage graph.
    Lineage {
        /// The query to run.
        #[command(subcommand)]
        query: LineageQuery,
    },
    /// Print the quality checks generated for a schema file.
    Quality {
        /// YAML/JSON schema file.
        #[arg(long)]
        schema: PathBuf,
    },
    /// Search the documents indexed during sync.
    Search {
        /// Words to look for.
        query: String,
        /// Maximum number of documents to list.
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Only search documents of this source type.
        #[arg(long)]
        source_type: Option<SourceKind>,
        /// Print the hits as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Summarize past syncs from the audit trail.
    Stats {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Lineage queries.
#[derive(Debug, Subcommand)]
pub enum LineageQuery {
    /// Nodes the given node depends on.
    Upstream {
        /// Node id, e.g. table:ANALYTICS.PUBLIC.ORDERS.
        node_id: String,
        /// Maximum number of hops.
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: usize,
    },
    /// Nodes that depend on the given node.
    Downstream {
        /// Node id.
        node_id: String,
        /// Maximum number of hops.
        #[arg(long, default_value_t = DEFAULT_DEPTH)]
        depth: usize,
    },
    /// What is affected if a table changes.
    Impact {
        /// Table name or table node id.
        table: String,
    },
    /// Node and edge counts.
    Stats,
    /// Graphviz DOT export of the whole graph.
    Dot,
}
