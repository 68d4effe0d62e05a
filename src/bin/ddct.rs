//! ddct - Relative qPCR expression CLI
//!
//! Command-line interface for delta-delta-Ct analysis of Ct tables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ddct::{
    analyze, unique_values, write_long_to_path, write_wide_to_path, AnalysisConfig, Source, Table,
};
use itertools::Itertools;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Relative qPCR expression with the delta-delta-Ct method
#[derive(Parser)]
#[command(name = "ddct")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of an input file
    Sheets {
        /// Input table (csv, tsv, xlsx, xls, ods)
        input: PathBuf,
    },

    /// List the distinct values of a column (e.g. to pick the control group)
    Values {
        /// Input table (csv, tsv, xlsx, xls, ods)
        input: PathBuf,

        /// Sheet to read; required when the input has several sheets
        #[arg(short, long)]
        sheet: Option<String>,

        /// Column to inspect
        #[arg(short, long)]
        column: String,
    },

    /// Normalize target genes against the housekeeping gene and control group
    Analyze {
        /// Input table (csv, tsv, xlsx, xls, ods)
        input: PathBuf,

        /// Sheet to read; required when the input has several sheets
        #[arg(short, long)]
        sheet: Option<String>,

        /// Sample identifier column
        #[arg(long)]
        sample: String,

        /// Group label column
        #[arg(short, long)]
        group: String,

        /// Housekeeping gene Ct column
        #[arg(long)]
        housekeeping: String,

        /// Target gene Ct column (repeatable)
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        /// Control group label
        #[arg(short, long)]
        control: String,

        /// Write the long table (csv, tsv or xlsx, by extension)
        #[arg(long)]
        long: Option<PathBuf>,

        /// Write the wide table (csv, tsv or xlsx, by extension)
        #[arg(long)]
        wide: Option<PathBuf>,

        /// Print the gene summaries as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Sheets { input } => {
            let source = open(&input)?;
            for name in source.sheet_names() {
                println!("{name}");
            }
        }

        Commands::Values {
            input,
            sheet,
            column,
        } => {
            let table = load_table(&input, sheet.as_deref())?;
            if !table.headers.contains(&column) {
                bail!("column '{}' not found in {}", column, input.display());
            }
            for value in unique_values(&table.rows, &column) {
                println!("{value}");
            }
        }

        Commands::Analyze {
            input,
            sheet,
            sample,
            group,
            housekeeping,
            targets,
            control,
            long,
            wide,
            json,
        } => {
            let table = load_table(&input, sheet.as_deref())?;
            if table.rows.is_empty() {
                bail!("{} contains no data rows", input.display());
            }

            let config = AnalysisConfig::builder()
                .sample_column(sample)
                .group_column(group)
                .housekeeping_column(housekeeping)
                .target_columns(targets)
                .control_group(control)
                .build();
            config.validate(&table.headers)?;

            let results = analyze(&table.rows, &config)?;
            info!(
                observations = results.long.len(),
                samples = results.wide.len(),
                groups = %results.groups.iter().join(", "),
                "analysis complete"
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&results.summary)?);
            } else {
                results.pprint(&config.control_group);
            }

            if let Some(path) = long {
                write_long_to_path(&path, &results.long)
                    .with_context(|| format!("writing long table to {}", path.display()))?;
                info!(path = %path.display(), "wrote long table");
            }
            if let Some(path) = wide {
                write_wide_to_path(&path, &results.wide)
                    .with_context(|| format!("writing wide table to {}", path.display()))?;
                info!(path = %path.display(), "wrote wide table");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(input: &Path) -> Result<Source> {
    Source::open(input).with_context(|| format!("reading {}", input.display()))
}

fn load_table(input: &Path, sheet: Option<&str>) -> Result<Table> {
    let mut source = open(input)?;
    let table = match sheet {
        Some(sheet) => source.table(sheet)?,
        None => {
            let names = source.sheet_names();
            if names.len() > 1 {
                bail!(
                    "{} has several sheets, choose one with --sheet: {}",
                    input.display(),
                    names.join(", ")
                );
            }
            source.first_table()?
        }
    };
    Ok(table)
}
