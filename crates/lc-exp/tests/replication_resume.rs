use std::cell::Cell;
use std::fs;
use std::path::Path;

use lc_core::errors::{ErrorInfo, LcError};
use lc_corpus::{Corpus, Instance, TaggedToken};
use lc_exp::{
    read_manifest, read_score_table, run_experiment_with_engines, CacheFormat, Engine, Engines,
    ExperimentConfig, FoldFiles, OutputPaths, RetryPolicy, ScoreTool, ToolRun,
};

fn corpus(n: usize, tag: &str) -> Corpus {
    Corpus::new(
        (0..n)
            .map(|i| {
                Instance::new(vec![
                    TaggedToken::new(format!("{tag}{i}"), "B-PER"),
                    TaggedToken::new(format!("x{}", i % 7), "I-PER"),
                    TaggedToken::new("said", "O"),
                ])
            })
            .collect(),
    )
}

/// Scores a fold by the size of its materialized training file.
struct FakeEngine {
    engine: Engine,
    scale: f64,
    calls: Cell<usize>,
    fail_after: Option<usize>,
}

impl FakeEngine {
    fn new(engine: Engine, scale: f64) -> Self {
        Self {
            engine,
            scale,
            calls: Cell::new(0),
            fail_after: None,
        }
    }

    fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }
}

impl ScoreTool for FakeEngine {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn run(&self, files: &FoldFiles) -> Result<ToolRun, LcError> {
        let calls = self.calls.get() + 1;
        self.calls.set(calls);
        if self.fail_after.is_some_and(|limit| calls > limit) {
            return Err(LcError::Tool(ErrorInfo::new("tool-exit-nonzero", "killed")));
        }
        let train = fs::read_to_string(&files.train).map_err(|err| {
            LcError::io("fake-read", &files.train, err)
        })?;
        assert!(files.valid.exists());
        assert!(files.gazetteer.exists());
        Ok(ToolRun {
            score: Some(train.len() as f64 * self.scale),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn config(dir: &Path) -> ExperimentConfig {
    ExperimentConfig {
        n_train: 20,
        n_valid: 6,
        n_gaz: 5,
        n_replication: 3,
        n_train_fold: 2,
        seed: 7,
        retry: RetryPolicy::immediate(2),
        outputs: OutputPaths {
            model: dir.join("model.dat"),
            baseline: dir.join("baseline.dat"),
            delta: dir.join("delta.dat"),
        },
        ..ExperimentConfig::default()
    }
}

#[test]
fn resumed_run_computes_only_missing_cells() {
    let train = corpus(40, "t");
    let valid = corpus(10, "v");

    let reference_dir = tempfile::tempdir().expect("tmp dir");
    let reference_cfg = config(reference_dir.path());
    let model = FakeEngine::new(Engine::Model, 0.1);
    let engines = Engines {
        baseline: None,
        model: &model,
    };
    let reference = run_experiment_with_engines(
        &reference_cfg,
        &train,
        &valid,
        &reference_dir.path().join("expt"),
        &engines,
    )
    .expect("uninterrupted run");
    assert_eq!(model.calls.get(), 6);
    assert_eq!(reference.outcome.counts.computed, 6);

    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = config(dir.path());
    let expt = dir.path().join("expt");
    let crashing = FakeEngine::new(Engine::Model, 0.1).failing_after(4);
    let engines = Engines {
        baseline: None,
        model: &crashing,
    };
    let err = run_experiment_with_engines(&cfg, &train, &valid, &expt, &engines)
        .expect_err("crash mid-loop");
    assert_eq!(err.info().code, "tool-exit-nonzero");
    assert!(!cfg.outputs.model.exists());

    let resumed_model = FakeEngine::new(Engine::Model, 0.1);
    let engines = Engines {
        baseline: None,
        model: &resumed_model,
    };
    let resumed = run_experiment_with_engines(&cfg, &train, &valid, &expt, &engines)
        .expect("resumed run");
    assert_eq!(resumed_model.calls.get(), 2);
    assert_eq!(resumed.outcome.counts.cache_hits, 4);
    assert_eq!(resumed.outcome.counts.computed, 2);

    let expected = fs::read_to_string(&reference_cfg.outputs.model).expect("reference table");
    let actual = fs::read_to_string(&cfg.outputs.model).expect("resumed table");
    assert_eq!(expected, actual);
}

#[test]
fn second_run_is_served_from_cache() {
    let train = corpus(30, "t");
    let valid = corpus(10, "v");
    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = ExperimentConfig {
        cache_format: CacheFormat::Journal,
        ..config(dir.path())
    };
    let expt = dir.path().join("expt");

    for expected_calls in [6, 0] {
        let model = FakeEngine::new(Engine::Model, 1.0);
        let engines = Engines {
            baseline: None,
            model: &model,
        };
        run_experiment_with_engines(&cfg, &train, &valid, &expt, &engines).expect("run");
        assert_eq!(model.calls.get(), expected_calls);
    }
    assert!(expt.join("cache.jsonl").exists());
    assert!(expt.join("manifest.json").exists());
    assert!(expt.join("summary.json").exists());
}

#[test]
fn changed_score_settings_refuse_the_old_cache() {
    let train = corpus(40, "t");
    let valid = corpus(10, "v");
    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = config(dir.path());
    let expt = dir.path().join("expt");
    let model = FakeEngine::new(Engine::Model, 1.0);
    let engines = Engines {
        baseline: None,
        model: &model,
    };
    run_experiment_with_engines(&cfg, &train, &valid, &expt, &engines).expect("first run");
    assert_eq!(model.calls.get(), 6);

    let mut particles = cfg.clone();
    particles.model.particles = Some(64);
    for changed in [
        ExperimentConfig {
            n_gaz: 8,
            ..cfg.clone()
        },
        ExperimentConfig {
            repeat_gaz: true,
            ..cfg.clone()
        },
        particles,
    ] {
        let model = FakeEngine::new(Engine::Model, 1.0);
        let engines = Engines {
            baseline: None,
            model: &model,
        };
        let err = run_experiment_with_engines(&changed, &train, &valid, &expt, &engines)
            .expect_err("drift");
        assert_eq!(err.info().code, "config-drift");
        assert_eq!(model.calls.get(), 0);
    }
    let stored = read_manifest(&expt).expect("manifest").expect("present");
    assert_eq!(stored.config.n_gaz, 5);

    let model = FakeEngine::new(Engine::Model, 1.0);
    let engines = Engines {
        baseline: None,
        model: &model,
    };
    let err = run_experiment_with_engines(&cfg, &train, &corpus(10, "w"), &expt, &engines)
        .expect_err("new validation corpus");
    assert_eq!(err.info().code, "config-drift");

    let allowed = ExperimentConfig {
        n_gaz: 8,
        allow_config_drift: true,
        ..cfg.clone()
    };
    run_experiment_with_engines(&allowed, &train, &valid, &expt, &engines).expect("allowed drift");
    let stored = read_manifest(&expt).expect("manifest").expect("present");
    assert_eq!(stored.config.n_gaz, 8);
}

#[test]
fn bookkeeping_changes_keep_the_cache() {
    let train = corpus(40, "t");
    let valid = corpus(10, "v");
    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = config(dir.path());
    let expt = dir.path().join("expt");
    let model = FakeEngine::new(Engine::Model, 1.0);
    let engines = Engines {
        baseline: None,
        model: &model,
    };
    run_experiment_with_engines(&cfg, &train, &valid, &expt, &engines).expect("first run");

    let other = tempfile::tempdir().expect("tmp dir");
    let moved = ExperimentConfig {
        retry: RetryPolicy::immediate(5),
        timeout_secs: Some(30),
        ..config(other.path())
    };
    let model = FakeEngine::new(Engine::Model, 1.0);
    let engines = Engines {
        baseline: None,
        model: &model,
    };
    let report = run_experiment_with_engines(&moved, &train, &valid, &expt, &engines)
        .expect("bookkeeping change");
    assert_eq!(model.calls.get(), 0);
    assert_eq!(report.outcome.counts.cache_hits, 6);
    assert!(moved.outputs.model.exists());
}

#[test]
fn delta_rows_subtract_baseline_per_replication() {
    let train = corpus(30, "t");
    let valid = corpus(10, "v");
    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = ExperimentConfig {
        baseline: true,
        delta: true,
        ..config(dir.path())
    };
    let model = FakeEngine::new(Engine::Model, 1.0);
    let baseline = FakeEngine::new(Engine::Baseline, 0.25);
    let engines = Engines {
        baseline: Some(&baseline),
        model: &model,
    };
    let report = run_experiment_with_engines(&cfg, &train, &valid, &dir.path().join("expt"), &engines)
        .expect("run");
    assert_eq!(report.outputs.len(), 3);
    assert_eq!(baseline.calls.get(), 6);

    let model_rows = read_score_table(&cfg.outputs.model).expect("model table");
    let baseline_rows = read_score_table(&cfg.outputs.baseline).expect("baseline table");
    let delta_rows = read_score_table(&cfg.outputs.delta).expect("delta table");
    assert_eq!(delta_rows.len(), 2);
    for (j, row) in delta_rows.iter().enumerate() {
        assert_eq!(row.size, [10, 20][j]);
        assert_eq!(row.scores.len(), 3);
        for i in 0..3 {
            let expected = model_rows[j].scores[i] - baseline_rows[j].scores[i];
            assert!((row.scores[i] - expected).abs() < 1e-9);
        }
    }
    assert_eq!(report.summary.series.len(), 3);
    assert_eq!(report.summary.series["delta"][1].size, 20);
}

#[test]
fn insufficient_corpus_fails_before_any_engine_call() {
    let train = corpus(24, "t");
    let valid = corpus(10, "v");
    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = config(dir.path());
    let model = FakeEngine::new(Engine::Model, 1.0);
    let engines = Engines {
        baseline: None,
        model: &model,
    };
    let err = run_experiment_with_engines(&cfg, &train, &valid, &dir.path().join("expt"), &engines)
        .expect_err("too small");
    assert_eq!(err.info().code, "corpus-insufficient");
    assert_eq!(err.info().context["requested"], "25");
    assert_eq!(model.calls.get(), 0);
}

#[test]
fn empty_gazetteer_budget_writes_empty_artifact() {
    let train = corpus(20, "t");
    let valid = corpus(10, "v");
    let dir = tempfile::tempdir().expect("tmp dir");
    let cfg = ExperimentConfig {
        n_gaz: 0,
        n_replication: 1,
        ..config(dir.path())
    };
    let expt = dir.path().join("expt");
    let model = FakeEngine::new(Engine::Model, 1.0);
    let engines = Engines {
        baseline: None,
        model: &model,
    };
    run_experiment_with_engines(&cfg, &train, &valid, &expt, &engines).expect("run");
    let gaz = fs::read(expt.join("work").join("replications_gaz.tab")).expect("gaz");
    assert!(gaz.is_empty());
}
