use std::io::Read;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use lc_core::errors::{ErrorInfo, LcError};
use lc_corpus::convert_bio_to_stanford;
use tracing::{debug, warn};

use crate::config::{BaselineConfig, ModelConfig};
use crate::key::Engine;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_LINES: usize = 20;

/// Materialized inputs shared by both engines for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldFiles {
    /// Training prefix in `token<delim>label` form.
    pub train: PathBuf,
    /// Validation set in the same form.
    pub valid: PathBuf,
    /// BIO gazetteer artifact (possibly empty).
    pub gazetteer: PathBuf,
}

/// Captured result of one engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRun {
    /// Parsed F1, or `None` when the run produced nothing usable (e.g. it timed out).
    pub score: Option<f64>,
    /// Captured standard output of the scoring step.
    pub stdout: String,
    /// Captured standard error of the scoring step.
    pub stderr: String,
}

/// An engine that trains on a fold and scores the validation set.
pub trait ScoreTool {
    /// Which engine this is; used in cache keys.
    fn engine(&self) -> Engine;

    /// Trains and evaluates on `files`.
    ///
    /// Transient misses are reported as `score: None` so the caller can retry;
    /// failures that a retry cannot fix are errors.
    fn run(&self, files: &FoldFiles) -> Result<ToolRun, LcError>;
}

/// Output of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Runs shell command lines through `sh -c` from the current directory.
#[derive(Debug, Clone, Default)]
pub struct ShellInvoker {
    timeout: Option<Duration>,
}

impl ShellInvoker {
    /// Invoker with an optional wall clock limit per command.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Runs `line` and captures both streams.
    ///
    /// Returns `Ok(None)` when the command, or anything it spawned that still
    /// holds its output, outlived the timeout; the whole process group is
    /// killed. A non-zero exit status is a `tool-exit-nonzero` error.
    pub fn run(&self, line: &str) -> Result<Option<ShellOutput>, LcError> {
        debug!(command = line, "spawning shell command");
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let Some(limit) = self.timeout else {
            let output = cmd.output().map_err(|err| spawn_error(line, err))?;
            let out = ShellOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            check_status(line, output.status.code(), &out)?;
            return Ok(Some(out));
        };

        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(|err| spawn_error(line, err))?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let started = Instant::now();
        let mut status = None;
        // Descendants may keep the pipes open after `sh` exits, so the
        // deadline covers the drains as well as the shell itself.
        while started.elapsed() < limit {
            if status.is_none() {
                match child.try_wait() {
                    Ok(exited) => status = exited,
                    Err(err) => {
                        kill_group(&mut child);
                        return Err(LcError::Tool(
                            ErrorInfo::new("tool-wait", err.to_string())
                                .with_context("command", line),
                        ));
                    }
                }
            }
            if status.is_some() && drained(&stdout) && drained(&stderr) {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        let finished = status.is_some() && drained(&stdout) && drained(&stderr);
        let Some(status) = status.filter(|_| finished) else {
            kill_group(&mut child);
            warn!(
                command = line,
                timeout_secs = limit.as_secs_f64(),
                "command exceeded timeout and was killed"
            );
            return Ok(None);
        };
        let out = ShellOutput {
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
        };
        check_status(line, status.code(), &out)?;
        Ok(Some(out))
    }
}

/// Kills the command's whole process group, then reaps the shell.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let _ = Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut stream: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        buf
    })
}

fn drained(handle: &Option<thread::JoinHandle<Vec<u8>>>) -> bool {
    handle.as_ref().map_or(true, |h| h.is_finished())
}

fn join_drain(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn spawn_error(line: &str, err: std::io::Error) -> LcError {
    LcError::Tool(
        ErrorInfo::new("tool-spawn", err.to_string())
            .with_context("command", line)
            .with_hint("check that `sh` is on PATH"),
    )
}

fn check_status(line: &str, code: Option<i32>, out: &ShellOutput) -> Result<(), LcError> {
    if code == Some(0) {
        return Ok(());
    }
    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    Err(LcError::Tool(
        ErrorInfo::new("tool-exit-nonzero", "external command failed")
            .with_context("command", line)
            .with_context("status", code)
            .with_hint(stderr_tail(&out.stderr)),
    ))
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "command wrote nothing to stderr".to_string()
    } else {
        tail
    }
}

/// Quotes `value` for safe inclusion in an `sh` command line.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '='))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Extracts the baseline F1 from its evaluation stderr.
///
/// The score is the fourth field of the first line starting with `Totals`,
/// scaled to a percentage. Output without a usable `Totals` line scores 0.0,
/// which is what the classifier reports when it finds no entities at all.
pub fn baseline_f1(stderr: &str) -> f64 {
    stderr
        .lines()
        .find(|line| line.trim_start().starts_with("Totals"))
        .and_then(|line| line.split_whitespace().nth(3))
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map_or(0.0, |value| value * 100.0)
}

/// Extracts the model F1 from its stdout.
///
/// The score is the eighth field of the first line starting with `accuracy`,
/// already a percentage.
pub fn model_f1(stdout: &str) -> Result<f64, LcError> {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with("accuracy"))
        .ok_or_else(|| {
            LcError::Tool(
                ErrorInfo::new("model-score-missing", "model output has no accuracy line")
                    .with_hint(stdout_tail(stdout)),
            )
        })?;
    let token = line.split_whitespace().nth(7);
    token
        .and_then(|token| token.parse::<f64>().ok())
        .ok_or_else(|| {
            LcError::Tool(
                ErrorInfo::new("model-score-unparseable", "accuracy line has no F1 field")
                    .with_context("line", line.trim())
                    .with_context("field", token.unwrap_or("<none>")),
            )
        })
}

fn stdout_tail(stdout: &str) -> String {
    let tail: Vec<&str> = stdout.lines().rev().take(5).collect();
    if tail.is_empty() {
        "model wrote nothing to stdout".to_string()
    } else {
        tail.into_iter().rev().collect::<Vec<_>>().join("\n")
    }
}

/// The CRF baseline: train with the gazetteer as features, then score.
#[derive(Debug, Clone)]
pub struct BaselineTool {
    config: BaselineConfig,
    model_path: PathBuf,
    other_label: String,
    shell: ShellInvoker,
}

impl BaselineTool {
    /// Baseline writing its serialized classifier under `work_dir` unless
    /// the configuration names a location.
    pub fn new(
        config: BaselineConfig,
        work_dir: &Path,
        other_label: &str,
        shell: ShellInvoker,
    ) -> Self {
        let model_path = config
            .model_path
            .clone()
            .unwrap_or_else(|| work_dir.join("crf.model"));
        Self {
            config,
            model_path,
            other_label: other_label.to_string(),
            shell,
        }
    }

    /// Command line training the classifier.
    pub fn train_command(&self, files: &FoldFiles, gazette: &Path) -> String {
        format!(
            "{} -prop {} -serializeTo {} -trainFile {} -useGazettes=true -gazette {}",
            self.config.command,
            quote_path(&self.config.features),
            quote_path(&self.model_path),
            quote_path(&files.train),
            quote_path(gazette),
        )
    }

    /// Command line scoring the validation set.
    pub fn test_command(&self, files: &FoldFiles) -> String {
        format!(
            "{} -loadClassifier {} -testFile {}",
            self.config.command,
            quote_path(&self.model_path),
            quote_path(&files.valid),
        )
    }
}

/// Location of the converted gazette next to the BIO artifact.
pub fn stanford_gazette_path(bio: &Path) -> PathBuf {
    let mut name = bio.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

impl ScoreTool for BaselineTool {
    fn engine(&self) -> Engine {
        Engine::Baseline
    }

    fn run(&self, files: &FoldFiles) -> Result<ToolRun, LcError> {
        let gazette = stanford_gazette_path(&files.gazetteer);
        let entries = convert_bio_to_stanford(&files.gazetteer, &gazette, &self.other_label)?;
        debug!(entries, gazette = %gazette.display(), "converted gazetteer for baseline");

        if self.shell.run(&self.train_command(files, &gazette))?.is_none() {
            return Ok(ToolRun {
                score: None,
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        let Some(out) = self.shell.run(&self.test_command(files))? else {
            return Ok(ToolRun {
                score: None,
                stdout: String::new(),
                stderr: String::new(),
            });
        };
        Ok(ToolRun {
            score: Some(baseline_f1(&out.stderr)),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}

/// The sequence model under study, driven by a single script invocation.
#[derive(Debug, Clone)]
pub struct ModelTool {
    config: ModelConfig,
    shell: ShellInvoker,
}

impl ModelTool {
    /// Wraps the configured model command.
    pub fn new(config: ModelConfig, shell: ShellInvoker) -> Self {
        Self { config, shell }
    }

    /// Full command line for one cell.
    pub fn command(&self, files: &FoldFiles) -> String {
        let mut line = format!(
            "{} {} {} {}",
            self.config.command,
            quote_path(&files.train),
            quote_path(&files.valid),
            quote_path(&files.gazetteer),
        );
        if let Some(particles) = self.config.particles {
            line.push_str(&format!(" --particles {particles}"));
        }
        if let Some(pseudocount) = self.config.gaz_pseudocount {
            line.push_str(&format!(" --gaz-pseudocount {pseudocount}"));
        }
        for arg in &self.config.extra_args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }
}

impl ScoreTool for ModelTool {
    fn engine(&self) -> Engine {
        Engine::Model
    }

    fn run(&self, files: &FoldFiles) -> Result<ToolRun, LcError> {
        let Some(out) = self.shell.run(&self.command(files))? else {
            return Ok(ToolRun {
                score: None,
                stdout: String::new(),
                stderr: String::new(),
            });
        };
        let score = model_f1(&out.stdout)?;
        Ok(ToolRun {
            score: Some(score),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}
