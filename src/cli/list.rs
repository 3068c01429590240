use std::{cmp::Ordering, path::PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use regex::Regex;
use serde::Serialize;
use testament::{Directory, Library, Name, RecordKind};
use tracing::instrument;

const DEFAULT_LIMIT: usize = 200;

/// Command arguments for `tlib list`.
#[derive(Debug, Parser)]
#[command(about = "List records with filters")]
pub struct List {
    /// Filter by record kind (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "KIND")]
    kind: Vec<KindFilter>,

    /// Filter by tag (comma-separated, case-insensitive).
    #[arg(long, value_delimiter = ',', value_name = "TAG")]
    tag: Vec<String>,

    /// Case-insensitive substring match against record names.
    #[arg(long, conflicts_with = "regex")]
    contains: Option<String>,

    /// Regular expression match against record names.
    #[arg(long)]
    regex: Option<String>,

    /// Sort field (default: name).
    #[arg(long, value_name = "FIELD", default_value = "name")]
    sort: SortField,

    /// Output format (default: table).
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and print names only.
    #[arg(long)]
    quiet: bool,

    /// Limit number of rows returned.
    #[arg(long)]
    limit: Option<usize>,

    /// Skip the first N rows.
    #[arg(long)]
    offset: Option<usize>,
}

/// Record kinds accepted by `--kind`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum KindFilter {
    #[value(name = "testcase")]
    TestCase,
    #[value(name = "requirement")]
    Requirement,
    #[value(name = "testplan")]
    TestPlan,
}

/// Supported output formats.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Sortable fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
enum SortField {
    #[default]
    Name,
    Kind,
    Priority,
}

/// Parsed record snapshot used for listing.
#[derive(Debug, Clone)]
struct Entry {
    name: Name,
    kind: RecordKind,
    tags: Vec<String>,
    priority: Option<i64>,
}

#[derive(Debug, Clone)]
struct Filters {
    kinds: Vec<RecordKind>,
    tags: Vec<String>,
    contains: Option<String>,
    regex: Option<Regex>,
}

#[derive(Debug, Clone, Serialize)]
struct SerializableRow<'a> {
    name: &'a str,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<String>,
}

impl List {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root).load_all()?;

        let filters = Filters::new(&self)?;

        let mut entries = collect_entries(directory.library());
        if filters.any() {
            entries.retain(|entry| filters.matches(entry));
        }

        entries = apply_sort(entries, self.sort);

        let effective_limit = self
            .limit
            .and_then(|value| (value > 0).then_some(value))
            .or(Some(DEFAULT_LIMIT));
        entries = apply_offset_limit(entries, self.offset, effective_limit);

        render_entries(&entries, self.output, self.quiet)
    }
}

impl Filters {
    fn new(cmd: &List) -> anyhow::Result<Self> {
        let regex = if let Some(pattern) = &cmd.regex {
            Some(Regex::new(pattern).with_context(|| format!("invalid regex: {pattern}"))?)
        } else {
            None
        };

        Ok(Self {
            kinds: cmd.kind.iter().copied().map(RecordKind::from).collect(),
            tags: cmd
                .tag
                .iter()
                .map(String::as_str)
                .map(str::to_ascii_lowercase)
                .collect(),
            contains: cmd.contains.as_deref().map(str::to_ascii_lowercase),
            regex,
        })
    }

    fn any(&self) -> bool {
        !self.kinds.is_empty()
            || !self.tags.is_empty()
            || self.contains.is_some()
            || self.regex.is_some()
    }

    fn matches(&self, entry: &Entry) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&entry.kind) {
            return false;
        }

        if !self.tags.is_empty() {
            let tag_set: Vec<String> = entry
                .tags
                .iter()
                .map(String::as_str)
                .map(str::to_ascii_lowercase)
                .collect();
            if !self
                .tags
                .iter()
                .any(|tag| tag_set.iter().any(|entry_tag| entry_tag == tag))
            {
                return false;
            }
        }

        if let Some(search) = &self.contains {
            if !entry.name.as_str().to_ascii_lowercase().contains(search) {
                return false;
            }
        }

        if let Some(regex) = &self.regex {
            if !regex.is_match(entry.name.as_str()) {
                return false;
            }
        }

        true
    }
}

impl From<KindFilter> for RecordKind {
    fn from(value: KindFilter) -> Self {
        match value {
            KindFilter::TestCase => Self::TestCase,
            KindFilter::Requirement => Self::Requirement,
            KindFilter::TestPlan => Self::TestPlan,
        }
    }
}

fn collect_entries(library: &Library) -> Vec<Entry> {
    let mut entries = Vec::new();

    for (name, case) in library.test_cases() {
        entries.push(Entry {
            name: name.clone(),
            kind: RecordKind::TestCase,
            tags: case.tags.iter().cloned().collect(),
            priority: Some(case.priority),
        });
    }

    for name in library.requirements().keys() {
        entries.push(Entry {
            name: name.clone(),
            kind: RecordKind::Requirement,
            tags: Vec::new(),
            priority: None,
        });
    }

    for name in library.test_plans().keys() {
        entries.push(Entry {
            name: name.clone(),
            kind: RecordKind::TestPlan,
            tags: Vec::new(),
            priority: None,
        });
    }

    entries
}

fn apply_sort(mut entries: Vec<Entry>, sort_field: SortField) -> Vec<Entry> {
    entries.sort_by(|a, b| compare_entries(a, b, sort_field));
    entries
}

fn compare_entries(a: &Entry, b: &Entry, sort_field: SortField) -> Ordering {
    match sort_field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Kind => a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)),
        SortField::Priority => a
            .priority
            .cmp(&b.priority)
            .then_with(|| a.name.cmp(&b.name)),
    }
}

fn apply_offset_limit(
    mut entries: Vec<Entry>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Vec<Entry> {
    if let Some(off) = offset {
        if off < entries.len() {
            entries = entries.into_iter().skip(off).collect();
        } else {
            entries.clear();
        }
    }

    if let Some(max) = limit {
        entries.truncate(max);
    }

    entries
}

fn render_entries(entries: &[Entry], output: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match output {
        OutputFormat::Table => {
            render_table(entries, quiet);
            Ok(())
        }
        OutputFormat::Json => render_json(entries),
    }
}

fn render_table(entries: &[Entry], quiet: bool) {
    if quiet {
        for entry in entries {
            println!("{}", entry.name);
        }
        return;
    }

    let headers = ["Name", "Kind", "Priority", "Tags"];
    let data: Vec<[String; 4]> = entries
        .iter()
        .map(|entry| {
            [
                entry.name.to_string(),
                entry.kind.to_string(),
                entry
                    .priority
                    .map_or_else(String::new, |priority| priority.to_string()),
                entry.tags.join(", "),
            ]
        })
        .collect();

    // Determine column widths for alignment.
    let widths = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            data.iter()
                .map(|row| row[idx].len())
                .max()
                .unwrap_or(0)
                .max(header.len())
        })
        .collect::<Vec<_>>();

    for (header, width) in headers.iter().zip(&widths) {
        print!("{header:<width$}  ");
    }
    println!();

    for width in &widths {
        print!("{:-<width$}  ", "");
    }
    println!();

    for row in &data {
        for (idx, value) in row.iter().enumerate() {
            let width = widths[idx];
            print!("{value:<width$}  ");
        }
        println!();
    }
}

fn render_json(entries: &[Entry]) -> anyhow::Result<()> {
    let rows: Vec<SerializableRow> = entries.iter().map(SerializableRow::from).collect();

    serde_json::to_writer_pretty(std::io::stdout(), &rows)
        .context("failed to render json output")?;
    println!();
    Ok(())
}

impl<'a> From<&'a Entry> for SerializableRow<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            name: entry.name.as_str(),
            kind: entry.kind.to_string(),
            priority: entry.priority,
            tags: (!entry.tags.is_empty()).then(|| entry.tags.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn list() -> List {
        List {
            kind: Vec::new(),
            tag: Vec::new(),
            contains: None,
            regex: None,
            sort: SortField::default(),
            output: OutputFormat::default(),
            quiet: true,
            limit: None,
            offset: None,
        }
    }

    fn entry(name: &str, kind: RecordKind, tags: &[&str], priority: Option<i64>) -> Entry {
        Entry {
            name: Name::try_from(name).unwrap(),
            kind,
            tags: tags.iter().map(ToString::to_string).collect(),
            priority,
        }
    }

    #[test]
    fn kind_filter_keeps_matching_records() {
        let cmd = List {
            kind: vec![KindFilter::TestCase],
            ..list()
        };
        let filters = Filters::new(&cmd).unwrap();

        assert!(filters.matches(&entry("A", RecordKind::TestCase, &[], Some(1))));
        assert!(!filters.matches(&entry("B", RecordKind::Requirement, &[], None)));
    }

    #[test]
    fn tag_filter_is_case_insensitive() {
        let cmd = List {
            tag: vec!["Engine".to_string()],
            ..list()
        };
        let filters = Filters::new(&cmd).unwrap();

        assert!(filters.matches(&entry("A", RecordKind::TestCase, &["engine"], Some(1))));
        assert!(!filters.matches(&entry("B", RecordKind::TestCase, &["brakes"], Some(1))));
    }

    #[test]
    fn contains_matches_name_substrings() {
        let cmd = List {
            contains: Some("fuel".to_string()),
            ..list()
        };
        let filters = Filters::new(&cmd).unwrap();

        assert!(filters.matches(&entry(
            "Engine fuel consumption",
            RecordKind::TestCase,
            &[],
            Some(5)
        )));
        assert!(!filters.matches(&entry("Ignition", RecordKind::TestCase, &[], Some(2))));
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let cmd = List {
            regex: Some("(".to_string()),
            ..list()
        };

        assert!(Filters::new(&cmd).is_err());
    }

    #[test]
    fn sort_by_priority_breaks_ties_by_name() {
        let entries = vec![
            entry("B", RecordKind::TestCase, &[], Some(2)),
            entry("A", RecordKind::TestCase, &[], Some(2)),
            entry("C", RecordKind::Requirement, &[], None),
        ];

        let sorted = apply_sort(entries, SortField::Priority);
        let names: Vec<&str> = sorted.iter().map(|entry| entry.name.as_str()).collect();

        // Records without a priority sort first.
        assert_eq!(names, ["C", "A", "B"]);
    }

    #[test]
    fn offset_and_limit_trim_the_rows() {
        let entries = vec![
            entry("A", RecordKind::TestCase, &[], Some(1)),
            entry("B", RecordKind::TestCase, &[], Some(1)),
            entry("C", RecordKind::TestCase, &[], Some(1)),
        ];

        let trimmed = apply_offset_limit(entries, Some(1), Some(1));
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].name.as_str(), "B");
    }

    #[test]
    fn run_succeeds_on_a_populated_directory() {
        let tmp = tempdir().unwrap();
        std::fs::write(
            tmp.path().join("ignition.tc.yaml"),
            "name: Ignition\ntags: [electronics]\npriority: 2\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("running.req.yaml"), "name: Running\n").unwrap();

        list().run(tmp.path().to_path_buf()).unwrap();
    }

    #[test]
    fn collected_entries_cover_every_kind() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("a.tc.yaml"), "name: A\npriority: 4\n").unwrap();
        std::fs::write(tmp.path().join("b.req.yaml"), "name: B\n").unwrap();
        std::fs::write(tmp.path().join("c.plan.yaml"), "name: C\n").unwrap();

        let directory = Directory::new(tmp.path().to_path_buf()).load_all().unwrap();
        let entries = collect_entries(directory.library());

        assert_eq!(entries.len(), 3);
        let case = entries
            .iter()
            .find(|entry| entry.kind == RecordKind::TestCase)
            .unwrap();
        assert_eq!(case.priority, Some(4));
    }
}
