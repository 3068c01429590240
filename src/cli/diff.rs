use std::{collections::BTreeSet, path::PathBuf, process};

use clap::Parser;
use testament::{Directory, LibraryDiff, Name, RecordSets, diff};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Compare two library snapshots and classify every record")]
pub struct Diff {
    /// The root of the base snapshot
    base: PathBuf,

    /// The root of the candidate snapshot
    candidate: PathBuf,

    /// Output format (table, json, summary)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Print one changed record per line for scripting
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Summary,
}

impl Diff {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let base = Directory::new(self.base).load_all()?;
        let candidate = Directory::new(self.candidate).load_all()?;

        let report = diff(base.library(), candidate.library())?;

        match self.output {
            OutputFormat::Json => Self::output_json(&report)?,
            OutputFormat::Summary => Self::output_summary(&report),
            OutputFormat::Table => {
                if self.quiet {
                    Self::output_quiet(&report);
                } else {
                    Self::output_table(&report);
                }
            }
        }

        // Exit with a non-zero code when the snapshots differ.
        if !report.is_unchanged() {
            process::exit(2);
        }

        Ok(())
    }

    fn output_json(report: &LibraryDiff) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(report)?);
        Ok(())
    }

    fn output_summary(report: &LibraryDiff) {
        println!(
            "removed={} added={} modified={} unchanged={}",
            report.removed.len(),
            report.added.len(),
            report.modified.len(),
            report.unchanged.len()
        );
    }

    fn output_quiet(report: &LibraryDiff) {
        for (classification, sets) in [
            ("removed", &report.removed),
            ("added", &report.added),
            ("modified", &report.modified),
        ] {
            for name in &sets.test_plans {
                println!("{classification} testplans {name}");
            }
            for name in &sets.requirements {
                println!("{classification} requirements {name}");
            }
            for name in &sets.test_cases {
                println!("{classification} testcases {name}");
            }
        }
    }

    fn output_table(report: &LibraryDiff) {
        if report.is_unchanged() {
            println!("{}", "No differences found.".success());
            println!("{} records unchanged.", report.unchanged.len());
            return;
        }

        Self::print_section(&"Removed".warning(), &report.removed);
        Self::print_section(&"Added".success(), &report.added);
        Self::print_section(&"Modified".info(), &report.modified);

        println!(
            "{}",
            format!("Unchanged: {} records", report.unchanged.len()).dim()
        );
    }

    fn print_section(heading: &str, sets: &RecordSets) {
        if sets.is_empty() {
            return;
        }
        println!("{heading}");
        Self::print_names("test plans", &sets.test_plans);
        Self::print_names("requirements", &sets.requirements);
        Self::print_names("test cases", &sets.test_cases);
        println!();
    }

    fn print_names(label: &str, names: &BTreeSet<Name>) {
        if names.is_empty() {
            return;
        }
        let joined = names
            .iter()
            .map(Name::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {label}: {joined}");
    }
}
