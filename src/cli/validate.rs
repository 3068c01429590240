use std::path::PathBuf;

use clap::Parser;
use testament::{Directory, Library, RecordKind};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Validate library health across multiple dimensions")]
pub struct Validate {
    /// Types of checks to run (can be specified multiple times)
    #[arg(long, value_name = "TYPE")]
    check: Vec<CheckType>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, PartialEq, Eq)]
enum CheckType {
    /// Check selection queries parse and evaluate against every test case
    Queries,
    /// Check the test plan composition graph is acyclic
    Cycles,
    /// Check direct lists and child lists name existing records
    References,
    /// Run all checks
    All,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Default)]
struct ValidationResult {
    selections_checked: usize,
    query_issues: Vec<QueryIssue>,
    cycle_issues: Vec<Vec<String>>,
    reference_issues: Vec<ReferenceIssue>,
}

#[derive(Debug)]
struct QueryIssue {
    kind: RecordKind,
    owner: String,
    message: String,
}

#[derive(Debug)]
struct ReferenceIssue {
    kind: RecordKind,
    owner: String,
    missing: String,
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all()?;
        let library = directory.library();

        // Determine which checks to run
        let checks = if self.check.is_empty() || self.check.contains(&CheckType::All) {
            vec![CheckType::Queries, CheckType::Cycles, CheckType::References]
        } else {
            self.check.clone()
        };

        // Run checks
        let mut result = ValidationResult::default();

        for check in &checks {
            match check {
                CheckType::Queries => Self::check_queries(library, &mut result),
                CheckType::Cycles => Self::check_cycles(library, &mut result),
                CheckType::References => Self::check_references(library, &mut result),
                CheckType::All => unreachable!("All should have been expanded"),
            }
        }

        // Output results
        match self.output {
            OutputFormat::Table => self.output_table(&result),
            OutputFormat::Json => Self::output_json(&result)?,
        }

        // Broken queries and cycles are errors; dangling references only warn.
        if error_count(&result) > 0 {
            std::process::exit(2);
        }

        Ok(())
    }

    fn check_queries(library: &Library, result: &mut ValidationResult) {
        for (name, requirement) in library.requirements() {
            result.selections_checked += 1;
            if let Err(error) = requirement.verified_by.resolve(library.test_cases()) {
                result.query_issues.push(QueryIssue {
                    kind: RecordKind::Requirement,
                    owner: name.to_string(),
                    message: error.to_string(),
                });
            }
        }

        for (name, plan) in library.test_plans() {
            result.selections_checked += 1;
            if let Err(error) = plan.test_cases.resolve(library.test_cases()) {
                result.query_issues.push(QueryIssue {
                    kind: RecordKind::TestPlan,
                    owner: name.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }

    fn check_cycles(library: &Library, result: &mut ValidationResult) {
        result.cycle_issues = library
            .cycles()
            .iter()
            .map(|cycle| cycle.iter().map(ToString::to_string).collect())
            .collect();
    }

    fn check_references(library: &Library, result: &mut ValidationResult) {
        for (name, requirement) in library.requirements() {
            for reference in &requirement.verified_by.direct_list {
                if !library.test_cases().contains_key(reference) {
                    result.reference_issues.push(ReferenceIssue {
                        kind: RecordKind::Requirement,
                        owner: name.to_string(),
                        missing: reference.to_string(),
                    });
                }
            }
        }

        for (name, plan) in library.test_plans() {
            for reference in &plan.test_cases.direct_list {
                if !library.test_cases().contains_key(reference) {
                    result.reference_issues.push(ReferenceIssue {
                        kind: RecordKind::TestPlan,
                        owner: name.to_string(),
                        missing: reference.to_string(),
                    });
                }
            }
            for child in &plan.children {
                if !library.test_plans().contains_key(child) {
                    result.reference_issues.push(ReferenceIssue {
                        kind: RecordKind::TestPlan,
                        owner: name.to_string(),
                        missing: child.to_string(),
                    });
                }
            }
        }
    }

    fn output_table(&self, result: &ValidationResult) {
        if self.quiet {
            return;
        }

        println!("Validating library...\n");

        // Queries
        if result.query_issues.is_empty() {
            println!(
                "✓ Queries:    {} selections evaluate cleanly",
                result.selections_checked
            );
        } else {
            println!(
                "{}",
                format!("✗ Queries:    {} broken selections", result.query_issues.len()).warning()
            );
            for issue in &result.query_issues {
                println!("  • {} '{}': {}", issue.kind, issue.owner, issue.message);
            }
        }

        // Cycles
        if result.cycle_issues.is_empty() {
            println!("✓ Cycles:     Composition graph is acyclic");
        } else {
            println!(
                "{}",
                format!("✗ Cycles:     {} composition cycles", result.cycle_issues.len()).warning()
            );
            for cycle in &result.cycle_issues {
                println!("  • {}", cycle.join(" -> "));
            }
        }

        // References
        if result.reference_issues.is_empty() {
            println!("✓ References: All direct lists name existing records");
        } else {
            println!(
                "{}",
                format!(
                    "✗ References: {} dangling references",
                    result.reference_issues.len()
                )
                .warning()
            );
            for issue in &result.reference_issues {
                println!(
                    "  • {} '{}' names missing '{}'",
                    issue.kind, issue.owner, issue.missing
                );
            }
        }

        // Summary
        let errors = error_count(result);
        let warnings = result.reference_issues.len();
        if errors == 0 && warnings == 0 {
            println!("\n{}", "Library is healthy (0 issues)".success());
        } else {
            println!(
                "\n{}",
                format!("Summary: {errors} errors, {warnings} warnings").warning()
            );
            if warnings > 0 {
                println!(
                    "{}",
                    "Dangling names are dropped during resolution; remove them or restore the records."
                        .dim()
                );
            }
        }
    }

    fn output_json(result: &ValidationResult) -> anyhow::Result<()> {
        use serde_json::json;

        let query_issues: Vec<_> = result
            .query_issues
            .iter()
            .map(|issue| {
                json!({
                    "kind": issue.kind.to_string(),
                    "owner": issue.owner,
                    "error": issue.message,
                })
            })
            .collect();

        let reference_issues: Vec<_> = result
            .reference_issues
            .iter()
            .map(|issue| {
                json!({
                    "kind": issue.kind.to_string(),
                    "owner": issue.owner,
                    "missing": issue.missing,
                })
            })
            .collect();

        let errors = error_count(result);
        let warnings = result.reference_issues.len();
        let status = if errors > 0 {
            "errors_found"
        } else if warnings > 0 {
            "warnings"
        } else {
            "healthy"
        };

        let output = json!({
            "status": status,
            "issues": {
                "queries": query_issues,
                "cycles": result.cycle_issues,
                "references": reference_issues,
            },
            "summary": {
                "errors": errors,
                "warnings": warnings,
            }
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

fn error_count(result: &ValidationResult) -> usize {
    result.query_issues.len() + result.cycle_issues.len()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn write(root: &std::path::Path, file: &str, text: &str) {
        std::fs::write(root.join(file), text).unwrap();
    }

    fn validate() -> Validate {
        Validate {
            check: Vec::new(),
            output: OutputFormat::Table,
            quiet: true,
        }
    }

    #[test]
    fn clean_library_passes() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "ignition.tc.yaml", "name: Ignition\n");
        write(
            tmp.path(),
            "running.req.yaml",
            "name: Running\nverified_by:\n  direct_list: [Ignition]\n",
        );

        validate().run(tmp.path().to_path_buf()).unwrap();
    }

    #[test]
    fn dangling_reference_is_a_warning_not_an_error() {
        let tmp = tempdir().unwrap();
        write(
            tmp.path(),
            "running.req.yaml",
            "name: Running\nverified_by:\n  direct_list: [Retired case]\n",
        );

        // Warnings leave the exit code untouched, so run returns normally.
        validate().run(tmp.path().to_path_buf()).unwrap();
    }

    #[test]
    fn checks_collect_the_documented_issues() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "ignition.tc.yaml", "name: Ignition\n");
        write(
            tmp.path(),
            "broken.req.yaml",
            "name: Broken\nverified_by:\n  query: 'tc.priority >'\n",
        );
        write(
            tmp.path(),
            "loop.plan.yaml",
            "name: Loop\ntest_plans: [Loop]\n",
        );
        write(
            tmp.path(),
            "dangling.plan.yaml",
            "name: Dangling\nacceptance_criteria:\n  test_cases:\n    direct_list: [Ghost]\n",
        );

        let directory = Directory::new(tmp.path().to_path_buf()).load_all().unwrap();
        let library = directory.library();

        let mut result = ValidationResult::default();
        Validate::check_queries(library, &mut result);
        Validate::check_cycles(library, &mut result);
        Validate::check_references(library, &mut result);

        assert_eq!(result.query_issues.len(), 1);
        assert_eq!(result.query_issues[0].owner, "Broken");
        assert_eq!(result.cycle_issues, vec![vec!["Loop".to_string()]]);
        assert_eq!(result.reference_issues.len(), 1);
        assert_eq!(result.reference_issues[0].missing, "Ghost");
        assert_eq!(error_count(&result), 2);
    }
}
