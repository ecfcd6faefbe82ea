//! CLI for histmon - turn collected monitor snapshots into interval reports.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use histmon_core::ReportKind;

#[derive(Parser)]
#[command(name = "histmon")]
#[command(about = "histmon - replay periodic monitor snapshots as interval reports")]
#[command(version = histmon_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report similar to MONREPORT.DBSUMMARY, CONNECTION or PKGCACHE
    Report {
        /// Path where the hourly collection directories are stored
        path: PathBuf,

        /// Report to generate: dbsummary, connection, pkgcache
        #[arg(short, long, default_value = "dbsummary")]
        report: ReportKind,

        /// Show collections from this time on (YYYY-mm-dd HH:MM:SS, or copied
        /// from a collection as YYYY-mm-dd-HH.MM.SS.ffffff)
        #[arg(long, visible_alias = "st")]
        start_time: Option<String>,

        /// Show collections up to this time (same formats as --start-time)
        #[arg(long, visible_alias = "et")]
        end_time: Option<String>,

        /// Compare collections this many buckets apart, e.g. 3 diffs every third collection
        #[arg(short, long, default_value = "1")]
        period: usize,

        /// Show min, max and mean after each series of values
        #[arg(short, long)]
        stats: bool,

        /// Only include these members
        #[arg(short, long, num_args = 1..)]
        members: Vec<i64>,

        /// Only include these application handles (connection report)
        #[arg(long, visible_alias = "ah", num_args = 1..)]
        application_handles: Vec<i64>,

        /// Write the differenced data behind the report as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Print the raw rows of one data collection as a table
    Parse {
        /// Path where the hourly collection directories are stored
        path: PathBuf,

        /// Data collection name, as defined in task_details.json
        #[arg(short, long)]
        collection: String,

        /// Display the summary columns of the collection or every column
        #[arg(long, default_value = "details", value_parser = ["summary", "details"])]
        display: String,

        /// Start timestamp (same formats as report --start-time)
        #[arg(long)]
        start_time: Option<String>,

        /// End timestamp
        #[arg(long)]
        end_time: Option<String>,

        /// Only show rows of this application handle
        #[arg(long)]
        application_handle: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            path,
            report,
            start_time,
            end_time,
            period,
            stats,
            members,
            application_handles,
            output,
        } => commands::report::run(commands::report::ReportCommandConfig {
            path,
            kind: report,
            start_time: start_time.as_deref(),
            end_time: end_time.as_deref(),
            period,
            stats,
            members: &members,
            application_handles: &application_handles,
            output_path: output.as_deref(),
        }),
        Commands::Parse {
            path,
            collection,
            display,
            start_time,
            end_time,
            application_handle,
        } => commands::parse::run(commands::parse::ParseCommandConfig {
            path,
            collection: &collection,
            display: &display,
            start_time: start_time.as_deref(),
            end_time: end_time.as_deref(),
            application_handle,
        }),
    }
}
