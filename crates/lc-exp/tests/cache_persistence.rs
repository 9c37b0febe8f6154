use std::fs;
use std::io::Write;

use lc_core::errors::{ErrorInfo, LcError};
use lc_exp::{CacheFormat, Engine, ExperimentKey, ResultCache, RetryPolicy};

fn key(fp: &str, rep: usize) -> ExperimentKey {
    ExperimentKey::from_fingerprint(Engine::Model, fp, rep)
}

#[test]
fn fetch_or_run_computes_at_most_once() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut cache = ResultCache::open(dir.path(), CacheFormat::Snapshot).expect("open");
    let policy = RetryPolicy::immediate(3);
    let mut calls = 0;

    let first = cache
        .fetch_or_run(&key("abc", 0), &policy, || {
            calls += 1;
            Ok(Some(61.25))
        })
        .expect("first");
    let second = cache
        .fetch_or_run(&key("abc", 0), &policy, || {
            calls += 1;
            Ok(Some(99.0))
        })
        .expect("second");

    assert_eq!(calls, 1);
    assert_eq!(first.score, 61.25);
    assert!(!first.hit);
    assert_eq!(second.score, 61.25);
    assert!(second.hit);
    assert_eq!(second.attempts, 0);
}

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().expect("tmp dir");
    {
        let mut cache = ResultCache::open(dir.path(), CacheFormat::Snapshot).expect("open");
        cache.insert(&key("a", 0), 10.0).expect("insert");
        cache.insert(&key("b", 1), 0.0).expect("insert");
    }
    let cache = ResultCache::open(dir.path(), CacheFormat::Snapshot).expect("reopen");
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&key("a", 0)), Some(10.0));
    assert_eq!(cache.get(&key("b", 1)), Some(0.0));
    assert_eq!(
        cache.keys().collect::<Vec<_>>(),
        vec!["model_a_0", "model_b_1"]
    );
    assert!(dir.path().join("cache.json").exists());
}

#[test]
fn missing_directory_is_created_empty() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let expt = dir.path().join("nested").join("expt");
    let cache = ResultCache::open(&expt, CacheFormat::Snapshot).expect("open");
    assert!(cache.is_empty());
    assert!(expt.is_dir());
}

#[test]
fn journal_ignores_torn_tail_and_compacts() {
    let dir = tempfile::tempdir().expect("tmp dir");
    {
        let mut cache = ResultCache::open(dir.path(), CacheFormat::Journal).expect("open");
        cache.insert(&key("a", 0), 1.5).expect("insert");
        cache.insert(&key("a", 0), 2.5).expect("overwrite");
        cache.insert(&key("b", 0), 3.5).expect("insert");
    }
    let path = dir.path().join("cache.jsonl");
    let mut file = fs::OpenOptions::new().append(true).open(&path).expect("open journal");
    file.write_all(b"{\"key\":\"model_c_0\",\"sco").expect("torn write");
    drop(file);

    let cache = ResultCache::open(dir.path(), CacheFormat::Journal).expect("replay");
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&key("a", 0)), Some(2.5));
    assert_eq!(cache.get(&key("c", 0)), None);

    let text = fs::read_to_string(&path).expect("read journal");
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn journal_rejects_corruption_before_tail() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("cache.jsonl");
    fs::write(
        &path,
        "{\"key\":\"model_a_0\",\"score\":1.0}\nnot json\n{\"key\":\"model_b_0\",\"score\":2.0}\n",
    )
    .expect("seed journal");
    let err = ResultCache::open(dir.path(), CacheFormat::Journal).expect_err("corrupt");
    assert_eq!(err.info().code, "cache-journal-corrupt");
    assert_eq!(err.info().context["line"], "2");
}

#[test]
fn failed_compute_leaves_cache_untouched() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut cache = ResultCache::open(dir.path(), CacheFormat::Snapshot).expect("open");

    let exhausted = cache
        .fetch_or_run(&key("a", 0), &RetryPolicy::immediate(2), || Ok(None))
        .expect_err("exhausted");
    assert_eq!(exhausted.info().code, "retry-exhausted");

    let fatal = cache
        .fetch_or_run(&key("a", 0), &RetryPolicy::immediate(2), || {
            Err(LcError::Tool(ErrorInfo::new("model-score-missing", "no line")))
        })
        .expect_err("fatal");
    assert!(matches!(fatal, LcError::Tool(_)));

    assert!(cache.is_empty());
    let reopened = ResultCache::open(dir.path(), CacheFormat::Snapshot).expect("reopen");
    assert!(reopened.is_empty());
}

#[test]
fn zero_score_is_cached_not_retried() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut cache = ResultCache::open(dir.path(), CacheFormat::Journal).expect("open");
    let fetched = cache
        .fetch_or_run(&key("z", 2), &RetryPolicy::immediate(1), || Ok(Some(0.0)))
        .expect("zero");
    assert_eq!((fetched.score, fetched.attempts), (0.0, 1));
    assert!(cache.contains(&key("z", 2)));
}

#[test]
fn scores_reload_bit_for_bit() {
    let scores = [0.9574 * 100.0, 0.1 + 0.2, 1.0 / 3.0 * 100.0, 66.66666666666667, 5e-324];
    assert_eq!(scores[0], 95.74000000000001);
    for format in [CacheFormat::Snapshot, CacheFormat::Journal] {
        let dir = tempfile::tempdir().expect("tmp dir");
        {
            let mut cache = ResultCache::open(dir.path(), format).expect("open");
            for (rep, score) in scores.iter().enumerate() {
                cache.insert(&key("bits", rep), *score).expect("insert");
            }
        }
        let cache = ResultCache::open(dir.path(), format).expect("reopen");
        for (rep, score) in scores.iter().enumerate() {
            let loaded = cache.get(&key("bits", rep)).expect("cached");
            assert_eq!(loaded.to_bits(), score.to_bits(), "{format:?}: {score} -> {loaded}");
        }
    }
}

#[test]
fn failed_snapshot_write_keeps_memory_consistent() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut cache = ResultCache::open(dir.path(), CacheFormat::Snapshot).expect("open");
    cache.insert(&key("a", 0), 1.0).expect("insert");
    fs::remove_file(dir.path().join("cache.json")).expect("remove snapshot");
    fs::create_dir_all(dir.path().join("cache.json").join("blocker")).expect("block path");

    let err = cache.insert(&key("b", 0), 2.0).expect_err("rename onto directory");
    assert!(matches!(err, LcError::Cache(_)));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&key("b", 0)), None);
}

#[test]
fn failed_journal_append_keeps_memory_consistent() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut cache = ResultCache::open(dir.path(), CacheFormat::Journal).expect("open");
    fs::create_dir_all(dir.path().join("cache.jsonl")).expect("block journal");

    let err = cache.insert(&key("a", 0), 1.0).expect_err("journal is a directory");
    assert_eq!(err.info().code, "cache-journal-open");
    assert!(cache.is_empty());
    assert!(!cache.contains(&key("a", 0)));
}
