use ghcontrib::extract::extract;
use ghcontrib::model::{CommitRecord, RawCommit, RawFile};
use ghcontrib::pipeline::{Pipeline, PipelineConfig, Strategy};
use ghcontrib::report::report;
use ghcontrib::source::MemorySource;
use ghcontrib::store::{AggregateStore, Aggregator, FrozenAggregate};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const LOGINS: [&str; 7] = ["alice", "bob", "carol", "dave", "erin", "frank", "grace"];

/// Deterministic history with repeated contributors, repeated files,
/// email-only authors, empty commits and a few unattributable ones.
fn synthetic_history(m: usize) -> Vec<RawCommit> {
    (0..m)
        .map(|i| {
            let login = match i % 11 {
                0 | 5 => None,
                _ => Some(LOGINS[i % LOGINS.len()].to_string()),
            };
            let author_email = match i % 97 {
                0 => None,
                _ => Some(format!("dev{}@example.com", i % 5)),
            };
            let files = if i % 13 == 0 {
                vec![RawFile::new(format!("src/f{}.rs", i % 40), 0, 0)]
            } else {
                (0..(i % 4) + 1)
                    .map(|k| RawFile::new(format!("src/f{}.rs", (i * 7 + k * 3) % 40), ((i + k) % 9) as u64, (k % 3) as u64))
                    .collect()
            };
            RawCommit {
                sha: format!("{i:08x}"),
                login,
                author_email,
                files,
                ..Default::default()
            }
        })
        .collect()
}

fn sequential_reference(commits: &[RawCommit]) -> FrozenAggregate {
    let mut store = AggregateStore::new();
    for c in commits {
        if let Ok(Some(record)) = extract(c) {
            store.merge(record);
        }
    }
    store.freeze()
}

fn run(strategy: Strategy, workers: usize, commits: Vec<RawCommit>) -> FrozenAggregate {
    let summary = Pipeline::new(PipelineConfig::new(strategy, workers))
        .run(Arc::new(MemorySource::new(commits)))
        .unwrap();
    assert!(summary.stats.is_balanced());
    assert!(summary.interrupted.is_none());
    summary.aggregate
}

#[test]
fn no_lost_updates_for_any_worker_count() {
    let commits = synthetic_history(1000);
    let expected = sequential_reference(&commits);
    assert!(expected.len() > LOGINS.len());

    for strategy in Strategy::ALL {
        for workers in [1, 2, 4, 8] {
            let actual = run(strategy, workers, commits.clone());
            assert_eq!(actual, expected, "{strategy} with {workers} workers");
        }
    }
}

#[test]
fn merge_order_does_not_matter() {
    let commits = synthetic_history(300);
    let expected = sequential_reference(&commits);

    let mut reversed = commits.clone();
    reversed.reverse();
    let mut rotated = commits.clone();
    rotated.rotate_left(137);
    let mut interleaved: Vec<_> = commits.iter().step_by(2).cloned().collect();
    interleaved.extend(commits.iter().skip(1).step_by(2).cloned());

    for permutation in [reversed, rotated, interleaved] {
        for strategy in Strategy::ALL {
            assert_eq!(run(strategy, 4, permutation.clone()), expected, "{strategy}");
        }
    }
}

#[test]
fn concurrent_fetches_with_latency() {
    let commits = synthetic_history(120);
    let expected = sequential_reference(&commits);
    let source = Arc::new(MemorySource::new(commits).with_fetch_delay(Duration::from_millis(1)));

    for strategy in [Strategy::BoundedQueue, Strategy::WorkerPool, Strategy::Futures] {
        let summary = Pipeline::new(PipelineConfig {
            strategy,
            workers: 8,
            queue_capacity: 2,
            progress: false,
        })
        .run(source.clone())
        .unwrap();
        assert_eq!(summary.aggregate, expected, "{strategy}");
    }
}

#[test]
fn end_to_end_scenario() {
    let commits = vec![
        RawCommit {
            sha: "1".to_string(),
            login: Some("alice".to_string()),
            author_email: Some("alice@x.com".to_string()),
            files: vec![RawFile::new("a.py", 10, 2)],
            ..Default::default()
        },
        RawCommit {
            sha: "2".to_string(),
            login: Some(String::new()),
            author_email: Some("bob@x.com".to_string()),
            files: vec![],
            ..Default::default()
        },
        RawCommit {
            sha: "3".to_string(),
            login: Some("alice".to_string()),
            author_email: Some("alice@x.com".to_string()),
            files: vec![RawFile::new("a.py", 3, 1), RawFile::new("b.py", 2, 0)],
            ..Default::default()
        },
    ];

    for strategy in Strategy::ALL {
        let aggregate = run(strategy, 2, commits.clone());
        let alice = aggregate.get("alice").unwrap();
        assert_eq!(alice.additions_total, 15);
        assert_eq!(alice.deletions_total, 3);
        let files: HashSet<&str> = alice.files_touched.iter().map(String::as_str).collect();
        assert_eq!(files, HashSet::from(["a.py", "b.py"]));
        assert!(!aggregate.contains("bob@x.com"));
        assert_eq!(aggregate.len(), 1);
    }
}

#[test]
fn missing_login_is_attributed_to_email() {
    let commits = vec![RawCommit {
        sha: "1".to_string(),
        login: None,
        author_email: Some("someone@example.com".to_string()),
        files: vec![RawFile::new("x", 1, 0)],
        ..Default::default()
    }];
    for strategy in Strategy::ALL {
        let aggregate = run(strategy, 4, commits.clone());
        let ids: Vec<_> = aggregate.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["someone@example.com"]);
    }
}

#[test]
fn zero_change_commits_never_reach_the_aggregate() {
    let commits = vec![RawCommit {
        sha: "1".to_string(),
        login: Some("ghost".to_string()),
        files: vec![RawFile::new("a", 0, 0), RawFile::new("b", 0, 0)],
        ..Default::default()
    }];
    for strategy in Strategy::ALL {
        assert!(run(strategy, 2, commits.clone()).is_empty());
    }
}

/// Delays every merge so a premature read would see missing records.
struct SlowAggregator {
    inner: AggregateStore,
    merged: Arc<AtomicUsize>,
    delay: Duration,
}

impl Aggregator for SlowAggregator {
    fn merge(&mut self, record: CommitRecord) {
        thread::sleep(self.delay);
        self.inner.merge(record);
        self.merged.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn aggregate_is_only_returned_after_the_last_merge() {
    let commits = synthetic_history(60);
    let expected = sequential_reference(&commits);
    let expected_merges = commits
        .iter()
        .filter(|c| matches!(extract(c), Ok(Some(_))))
        .count();
    let source = Arc::new(MemorySource::new(commits));

    for strategy in Strategy::ALL {
        let merged = Arc::new(AtomicUsize::new(0));
        let slow = SlowAggregator {
            inner: AggregateStore::new(),
            merged: Arc::clone(&merged),
            delay: Duration::from_millis(2),
        };

        let outcome = Pipeline::new(PipelineConfig::new(strategy, 4))
            .run_into(source.clone(), slow)
            .unwrap();

        assert_eq!(merged.load(Ordering::SeqCst), expected_merges, "{strategy}");
        assert_eq!(outcome.stats.merged as usize, expected_merges);

        let frozen = outcome.aggregator.inner.freeze();
        assert_eq!(frozen, expected);
        assert_eq!(report(&frozen).len(), expected.len());
    }
}

#[test]
fn failing_fetches_do_not_stall_the_merger() {
    let commits = synthetic_history(200);
    let mut source = MemorySource::new(commits.clone());
    for c in commits.iter().step_by(9) {
        source = source.with_failing(c.sha.clone());
    }
    let source = Arc::new(source);

    for strategy in Strategy::ALL {
        let summary = Pipeline::new(PipelineConfig::new(strategy, 4))
            .run(source.clone())
            .unwrap();
        assert_eq!(summary.stats.seen, 200, "{strategy}");
        assert_eq!(summary.stats.failed, 23, "{strategy}");
        assert!(summary.stats.is_balanced());
    }
}

#[test]
fn report_orders_by_files_touched() {
    let aggregate = sequential_reference(&synthetic_history(500));
    let counts: Vec<usize> = report(&aggregate)
        .into_iter()
        .map(|(_, entry)| entry.files_touched.len())
        .collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]));
}
