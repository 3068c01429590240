use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use clap::Parser;
use testament::{Content, Directory, Library, Name, Resolution, Selection, TestCase};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Display detailed information about a record")]
pub struct Show {
    /// The name of the record to display
    #[clap(value_parser = super::parse_name)]
    name: Name,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
    Raw,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all()?;

        // Find the record
        let Some((_, path)) = directory.paths().find(&self.name) else {
            eprintln!("Record '{}' not found", self.name);
            std::process::exit(1);
        };
        let path = path.to_path_buf();
        let library = directory.library();

        // Display based on output format
        match self.output {
            OutputFormat::Pretty => {
                let resolution = library.resolution()?;
                self.output_pretty(library, resolution, &path);
            }
            OutputFormat::Json => {
                let resolution = library.resolution()?;
                self.output_json(library, resolution, &path)?;
            }
            OutputFormat::Raw => Self::output_raw(&path)?,
        }

        Ok(())
    }

    fn output_pretty(&self, library: &Library, resolution: &Resolution, path: &Path) {
        // Header
        println!("# {}\n", self.name);

        println!("{}", "Metadata".dim());

        if let Some(case) = library.test_cases().get(&self.name) {
            println!("  Kind:      test case");
            println!("  Path:      {}", path.display());
            println!("  Priority:  {}", case.priority);

            if !case.tags.is_empty() {
                println!("\n{}", "Tags".dim());
                for tag in &case.tags {
                    println!("  • {tag}");
                }
            }

            Self::print_resolved("Verified by", resolution.verified_by.get(&self.name));
            Self::print_content(&case.content);
        } else if let Some(requirement) = library.requirements().get(&self.name) {
            println!("  Kind:      requirement");
            println!("  Path:      {}", path.display());

            Self::print_selection(&requirement.verified_by, library.test_cases());
            Self::print_resolved("Verifiers", resolution.verifiers.get(&self.name));
            Self::print_content(&requirement.content);
        } else if let Some(plan) = library.test_plans().get(&self.name) {
            println!("  Kind:      test plan");
            println!("  Path:      {}", path.display());

            Self::print_selection(&plan.test_cases, library.test_cases());

            if !plan.children.is_empty() {
                println!("\n{}", "Children".dim());
                for child in &plan.children {
                    // Flag children that no longer exist
                    let indicator = if library.test_plans().contains_key(child) {
                        ""
                    } else {
                        " ⚠️"
                    };
                    println!("  • {child}{indicator}");
                }
            }

            Self::print_resolved("Members", resolution.members.get(&self.name));
            Self::print_content(&plan.content);
        }
    }

    fn print_selection(selection: &Selection, cases: &BTreeMap<Name, TestCase>) {
        if selection.is_empty() {
            return;
        }
        println!("\n{}", "Selection".dim());
        if let Some(query) = &selection.query {
            println!("  Query: {query}");
        }
        if !selection.direct_list.is_empty() {
            println!("  Direct list");
            for name in &selection.direct_list {
                // Flag names that no longer exist
                let indicator = if cases.contains_key(name) { "" } else { " ⚠️" };
                println!("    • {name}{indicator}");
            }
        }
    }

    fn print_resolved(label: &str, names: Option<&BTreeSet<Name>>) {
        let Some(names) = names else { return };
        if names.is_empty() {
            return;
        }
        println!("\n{}", format!("{label} (resolved)").dim());
        for name in names {
            println!("  • {name}");
        }
    }

    fn print_content(content: &Content) {
        if content.is_empty() {
            return;
        }
        println!("\n{}", "Content".dim());
        let yaml = serde_yaml::to_string(content).unwrap_or_default();
        for line in yaml.lines() {
            println!("  {line}");
        }
    }

    fn output_json(
        &self,
        library: &Library,
        resolution: &Resolution,
        path: &Path,
    ) -> anyhow::Result<()> {
        use serde_json::json;

        let resolved = |sets: &BTreeMap<Name, BTreeSet<Name>>| -> Vec<String> {
            sets.get(&self.name)
                .map(|names| names.iter().map(ToString::to_string).collect())
                .unwrap_or_default()
        };

        let output = if let Some(case) = library.test_cases().get(&self.name) {
            json!({
                "name": self.name.to_string(),
                "kind": "test case",
                "path": path,
                "tags": case.tags,
                "priority": case.priority,
                "verified_by": resolved(&resolution.verified_by),
                "content": case.content,
            })
        } else if let Some(requirement) = library.requirements().get(&self.name) {
            json!({
                "name": self.name.to_string(),
                "kind": "requirement",
                "path": path,
                "selection": requirement.verified_by,
                "verifiers": resolved(&resolution.verifiers),
                "content": requirement.content,
            })
        } else if let Some(plan) = library.test_plans().get(&self.name) {
            json!({
                "name": self.name.to_string(),
                "kind": "test plan",
                "path": path,
                "selection": plan.test_cases,
                "children": plan.children,
                "members": resolved(&resolution.members),
                "content": plan.content,
            })
        } else {
            json!(null)
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_raw(path: &Path) -> anyhow::Result<()> {
        // Output the raw YAML document
        let content = std::fs::read_to_string(path)?;
        print!("{content}");
        Ok(())
    }
}
