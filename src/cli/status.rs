use std::{collections::BTreeSet, path::PathBuf, process};

use clap::Parser;
use testament::{Directory, Library, ResolveError};
use tracing::instrument;

use super::terminal::{is_narrow, Colorize};

#[derive(Debug, Parser, Default)]
#[command(about = "Show record counts, relationship totals and query health")]
pub struct Status {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all()?;
        let library = directory.library();

        let counts = Counts::of(library);

        // Check if we have an empty library
        if counts.total() == 0 {
            println!(
                "No records found yet. Add .tc.yaml, .req.yaml or .plan.yaml files to get started."
            );
            return Ok(());
        }

        let cycles: Vec<Vec<String>> = library
            .cycles()
            .iter()
            .map(|cycle| cycle.iter().map(ToString::to_string).collect())
            .collect();
        let queries = query_count(library);
        let health = Health::of(library);

        match self.output {
            OutputFormat::Json => {
                Self::output_json(&counts, queries, &health, &cycles)?;
            }
            OutputFormat::Table => {
                if self.quiet {
                    Self::output_quiet(&counts, queries, &health, &cycles);
                } else {
                    Self::output_table(&counts, queries, &health, &cycles);
                }
            }
        }

        // Exit with a non-zero code when the library needs attention.
        let mut exit_code = 0;
        if !cycles.is_empty() {
            exit_code = exit_code.max(3);
        }
        if matches!(health, Health::Broken { .. }) {
            exit_code = exit_code.max(2);
        }

        if exit_code != 0 {
            process::exit(exit_code);
        }

        Ok(())
    }

    fn output_json(
        counts: &Counts,
        queries: usize,
        health: &Health,
        cycles: &[Vec<String>],
    ) -> anyhow::Result<()> {
        use serde_json::json;

        let relationships = match health {
            Health::Resolved {
                verifier_links,
                member_links,
            } => json!({
                "verifier_links": verifier_links,
                "member_links": member_links,
            }),
            Health::Blocked | Health::Broken { .. } => serde_json::Value::Null,
        };

        let query_health = match health {
            Health::Resolved { .. } => json!({
                "count": queries,
                "status": "ok",
            }),
            Health::Blocked => json!({
                "count": queries,
                "status": "blocked",
            }),
            Health::Broken { message } => json!({
                "count": queries,
                "status": "broken",
                "error": message,
            }),
        };

        let output = json!({
            "counts": {
                "testcases": counts.test_cases,
                "requirements": counts.requirements,
                "testplans": counts.test_plans,
                "total": counts.total(),
            },
            "relationships": relationships,
            "queries": query_health,
            "cycles": {
                "count": cycles.len(),
                "members": cycles,
            }
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_quiet(counts: &Counts, queries: usize, health: &Health, cycles: &[Vec<String>]) {
        let status = match health {
            Health::Resolved { .. } => "ok",
            Health::Blocked => "blocked",
            Health::Broken { .. } => "broken",
        };
        println!(
            "total={} queries={queries} cycles={} status={status}",
            counts.total(),
            cycles.len()
        );
    }

    fn output_table(counts: &Counts, queries: usize, health: &Health, cycles: &[Vec<String>]) {
        const MAX_CYCLE_DISPLAY: usize = 5;
        let narrow = is_narrow();

        println!("Record counts");
        println!("{}", "─────────────".dim());

        if narrow {
            // Stacked output for narrow terminals
            println!("test cases: {}", counts.test_cases);
            println!("requirements: {}", counts.requirements);
            println!("test plans: {}", counts.test_plans);
            println!("Total: {}", counts.total());
        } else {
            // Table layout
            println!("{:<14} Count", "Kind");
            println!("{:<14} {}", "test cases", counts.test_cases);
            println!("{:<14} {}", "requirements", counts.requirements);
            println!("{:<14} {}", "test plans", counts.test_plans);
            println!("{:<14} {}", "Total", counts.total());
        }

        println!();

        match health {
            Health::Resolved {
                verifier_links,
                member_links,
            } => {
                println!(
                    "Relationships: {verifier_links} verifier links, {member_links} plan members"
                );
                println!("Queries: {} ok ✅", queries.to_string().success());
            }
            Health::Blocked => {
                println!("Queries: {} ⚠️", "blocked by composition cycles".warning());
            }
            Health::Broken { message } => {
                println!("Queries: {} ⚠️", "broken".warning());
                println!("  {message}");
                println!("{}", "Run 'tlib validate' to investigate.".dim());
            }
        }

        println!();

        if cycles.is_empty() {
            println!("Cycles: {} ✅", "0".success());
        } else {
            println!("Cycles: {} ⚠️", cycles.len().to_string().warning());
            for cycle in cycles.iter().take(MAX_CYCLE_DISPLAY) {
                println!("  - {}", cycle.join(" -> "));
            }
            if cycles.len() > MAX_CYCLE_DISPLAY {
                println!("  - ... and {} more cycles", cycles.len() - MAX_CYCLE_DISPLAY);
            }
            println!(
                "{}",
                "Resolve cycles to restore an acyclic composition graph.".dim()
            );
        }
    }
}

struct Counts {
    test_cases: usize,
    requirements: usize,
    test_plans: usize,
}

impl Counts {
    fn of(library: &Library) -> Self {
        Self {
            test_cases: library.test_cases().len(),
            requirements: library.requirements().len(),
            test_plans: library.test_plans().len(),
        }
    }

    const fn total(&self) -> usize {
        self.test_cases + self.requirements + self.test_plans
    }
}

enum Health {
    Resolved {
        verifier_links: usize,
        member_links: usize,
    },
    Blocked,
    Broken {
        message: String,
    },
}

impl Health {
    fn of(library: &Library) -> Self {
        match library.resolution() {
            Ok(resolution) => Self::Resolved {
                verifier_links: resolution.verifiers.values().map(BTreeSet::len).sum(),
                member_links: resolution.members.values().map(BTreeSet::len).sum(),
            },
            Err(ResolveError::Cycle(_)) => Self::Blocked,
            Err(error) => Self::Broken {
                message: error.to_string(),
            },
        }
    }
}

fn query_count(library: &Library) -> usize {
    let requirement_queries = library
        .requirements()
        .values()
        .filter(|requirement| requirement.verified_by.query.is_some())
        .count();
    let plan_queries = library
        .test_plans()
        .values()
        .filter(|plan| plan.test_cases.query.is_some())
        .count();
    requirement_queries + plan_queries
}
