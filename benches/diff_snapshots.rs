//! This bench simulates diffing two snapshots of a large library of
//! interlinked records.

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use testament::{Content, Library, Name, Requirement, Selection, TestCase, TestPlan, diff};

fn name(text: String) -> Name {
    Name::try_from(text).unwrap()
}

/// Generates a library with `size` test cases plus requirements and plans
/// selecting them by direct list and by query.
///
/// With `edited` set, every tenth case carries a bumped revision field so
/// the two generated snapshots differ the way real snapshots do.
fn seed_library(size: usize, edited: bool) -> Library {
    let mut cases = BTreeMap::new();
    let mut requirements = BTreeMap::new();
    let mut plans = BTreeMap::new();

    for i in 0..size {
        let tag = if i % 2 == 0 { "engine" } else { "electronics" };
        let revision = u8::from(edited && i % 10 == 0);
        let content: Content = serde_yaml::from_str(&format!(
            "instructions: Step through fixture {i}.\nrevision: {revision}\n"
        ))
        .unwrap();
        cases.insert(
            name(format!("Case {i:04}")),
            TestCase {
                tags: BTreeSet::from([tag.to_string()]),
                priority: i64::try_from(i % 5).unwrap() + 1,
                content,
            },
        );
    }

    for i in 0..size / 5 {
        requirements.insert(
            name(format!("Requirement {i:03}")),
            Requirement {
                verified_by: Selection {
                    direct_list: BTreeSet::from([name(format!("Case {:04}", i * 5))]),
                    query: Some(format!("\"engine\" in tc.tags and tc.priority > {}", i % 4)),
                },
                content: Content::default(),
            },
        );
    }

    let plan_count = size / 20;
    for i in 0..plan_count {
        let children = if i + 1 < plan_count {
            BTreeSet::from([name(format!("Plan {:02}", i + 1))])
        } else {
            BTreeSet::new()
        };
        plans.insert(
            name(format!("Plan {i:02}")),
            TestPlan {
                test_cases: Selection {
                    direct_list: BTreeSet::new(),
                    query: Some(format!("tc.priority >= {}", i % 5 + 1)),
                },
                children,
                content: Content::default(),
            },
        );
    }

    Library::new(cases, requirements, plans)
}

fn diff_snapshots(c: &mut Criterion) {
    c.bench_function("diff snapshots", |b| {
        b.iter_batched(
            || {
                // Setup: two snapshots with a tenth of the cases edited
                (seed_library(400, false), seed_library(400, true))
            },
            |(base, candidate)| {
                diff(&base, &candidate).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, diff_snapshots);
criterion_main!(benches);
