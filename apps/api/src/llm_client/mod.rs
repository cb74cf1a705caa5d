/// Evaluator client — the single point of entry for all model calls.
///
/// ARCHITECTURAL RULE: no other module may spawn the model process directly.
///
/// The model runs locally as `<program> run <model> --think=false`, with the
/// prompt on stdin. Every outcome, including failures, comes back as an
/// [`EvaluatorOutput`] that renders to plain text, so the parsing stages
/// downstream see one channel whatever happened.
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub mod prompts;

pub const DEFAULT_PROGRAM: &str = "ollama";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of one model invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorOutput {
    /// Exit code 0; stdout verbatim.
    Completed(String),
    /// Non-zero exit (or killed by a signal).
    Failed {
        program: String,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    NotFound {
        program: String,
    },
    /// The process was killed after `after`.
    TimedOut {
        program: String,
        after: Duration,
    },
    LaunchFailed {
        program: String,
        message: String,
    },
}

impl EvaluatorOutput {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluatorOutput::Completed(_) => "completed",
            EvaluatorOutput::Failed { .. } => "failed",
            EvaluatorOutput::NotFound { .. } => "not_found",
            EvaluatorOutput::TimedOut { .. } => "timed_out",
            EvaluatorOutput::LaunchFailed { .. } => "launch_failed",
        }
    }

    /// Renders the outcome into the text channel consumed by the extractor.
    pub fn into_text(self) -> String {
        match self {
            EvaluatorOutput::Completed(stdout) => stdout,
            EvaluatorOutput::Failed {
                program,
                stdout,
                stderr,
                ..
            } => format!("{stdout}\n\n[{} STDERR]\n{stderr}", stderr_label(&program)),
            EvaluatorOutput::NotFound { program } => format!(
                "[ERROR] '{program}' executable not found. Ensure {program} is installed and in PATH."
            ),
            EvaluatorOutput::TimedOut { program, .. } => {
                format!("[ERROR] {program} run timed out.")
            }
            EvaluatorOutput::LaunchFailed { program, message } => {
                format!("[ERROR] {program} run failed: {message}")
            }
        }
    }
}

fn stderr_label(program: &str) -> String {
    Path::new(program)
        .file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| program.to_uppercase())
}

/// Anything that can answer an evaluation prompt. Carried in `AppState` as
/// `Arc<dyn Evaluator>`; implementations must not fail outward.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, model: &str, prompt: &str) -> EvaluatorOutput;
}

/// Runs the local model through its CLI.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    program: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, model: &str, prompt: &str) -> EvaluatorOutput {
        let program = self.program.clone();

        let mut child = match Command::new(&self.program)
            .args(["run", model, "--think=false"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return EvaluatorOutput::NotFound { program }
            }
            Err(e) => {
                return EvaluatorOutput::LaunchFailed {
                    program,
                    message: e.to_string(),
                }
            }
        };

        // Feed stdin and drain both pipes concurrently so a large prompt or a
        // chatty model cannot fill a pipe buffer and stall the child.
        let stdin = child.stdin.take();
        let input = prompt.as_bytes().to_vec();
        let mut writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, io::Error>(())
        });
        let mut stdout_task = spawn_reader(child.stdout.take());
        let mut stderr_task = spawn_reader(child.stderr.take());

        // One deadline covers both the exit and the pipes closing: a
        // background process that inherited stdout keeps the pipe open.
        let finished = tokio::time::timeout(self.timeout, async {
            let status = child.wait().await?;
            if let Ok(Err(e)) = (&mut writer).await {
                // Broken pipe when the process exits before reading everything.
                debug!("Writing prompt to {program} failed: {e}");
            }
            let stdout = collect(&mut stdout_task).await;
            let stderr = collect(&mut stderr_task).await;
            Ok::<_, io::Error>((status, stdout, stderr))
        })
        .await;

        match finished {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    EvaluatorOutput::Completed(stdout)
                } else {
                    EvaluatorOutput::Failed {
                        program,
                        stdout,
                        stderr,
                        exit_code: status.code(),
                    }
                }
            }
            Ok(Err(e)) => {
                abort_all(&writer, &stdout_task, &stderr_task);
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill {program} after wait error: {kill_err}");
                }
                EvaluatorOutput::LaunchFailed {
                    program,
                    message: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    "{program} exceeded {}s, killing process",
                    self.timeout.as_secs_f32()
                );
                abort_all(&writer, &stdout_task, &stderr_task);
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("{program} had already exited ({status}); output pipes still open")
                    }
                    // kill() also reaps the child.
                    _ => {
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill timed-out {program}: {e}");
                        }
                    }
                }
                EvaluatorOutput::TimedOut {
                    program,
                    after: self.timeout,
                }
            }
        }
    }
}

#[async_trait]
impl Evaluator for OllamaClient {
    async fn evaluate(&self, model: &str, prompt: &str) -> EvaluatorOutput {
        let started = Instant::now();
        let output = self.run(model, prompt).await;
        info!(
            "Evaluator call finished: model={model} outcome={} elapsed_ms={}",
            output.kind(),
            started.elapsed().as_millis()
        );
        output
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!("Reading evaluator output failed: {e}");
            }
        }
        buf
    })
}

async fn collect(task: &mut JoinHandle<Vec<u8>>) -> String {
    let bytes = task.await.unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn abort_all<A, B, C>(a: &JoinHandle<A>, b: &JoinHandle<B>, c: &JoinHandle<C>) {
    a.abort();
    b.abort();
    c.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_for_not_found_names_program() {
        let text = EvaluatorOutput::NotFound {
            program: "ollama".to_string(),
        }
        .into_text();
        assert_eq!(
            text,
            "[ERROR] 'ollama' executable not found. Ensure ollama is installed and in PATH."
        );
    }

    #[test]
    fn test_text_for_failure_has_labeled_stderr() {
        let text = EvaluatorOutput::Failed {
            program: "/usr/local/bin/ollama".to_string(),
            stdout: "partial".to_string(),
            stderr: "model not pulled".to_string(),
            exit_code: Some(1),
        }
        .into_text();
        assert_eq!(text, "partial\n\n[OLLAMA STDERR]\nmodel not pulled");
    }

    #[test]
    fn test_text_for_timeout() {
        let text = EvaluatorOutput::TimedOut {
            program: "ollama".to_string(),
            after: DEFAULT_TIMEOUT,
        }
        .into_text();
        assert_eq!(text, "[ERROR] ollama run timed out.");
    }

    #[tokio::test]
    async fn test_missing_executable_yields_not_found() {
        let client = OllamaClient::new("/definitely/not/here/ollama", Duration::from_secs(5));
        let output = client.evaluate("llama3.1:8b", "prompt").await;
        assert!(matches!(output, EvaluatorOutput::NotFound { .. }));
        assert!(output.into_text().contains("executable not found"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        /// Writes an executable `ollama` shell script into `dir`.
        fn fake_ollama(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("ollama");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_success_returns_stdout_and_passes_args_and_stdin() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ollama(dir.path(), "echo \"args: $*\"\ncat");
            let client = OllamaClient::new(bin.to_string_lossy(), Duration::from_secs(10));

            let output = client.evaluate("llama3.1:8b", "Analise o CURRÍCULO").await;
            assert_eq!(
                output,
                EvaluatorOutput::Completed(
                    "args: run llama3.1:8b --think=false\nAnalise o CURRÍCULO".to_string()
                )
            );
        }

        #[tokio::test]
        async fn test_non_zero_exit_keeps_stdout_and_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ollama(
                dir.path(),
                "cat > /dev/null\necho partial\necho 'boom' >&2\nexit 3",
            );
            let client = OllamaClient::new(bin.to_string_lossy(), Duration::from_secs(10));

            let output = client.evaluate("gemma3:12b", "x").await;
            match &output {
                EvaluatorOutput::Failed { exit_code, .. } => assert_eq!(*exit_code, Some(3)),
                other => panic!("expected Failed, got {other:?}"),
            }
            let text = output.into_text();
            assert!(text.starts_with("partial\n"));
            assert!(text.contains("[OLLAMA STDERR]\nboom"));
        }

        #[tokio::test]
        async fn test_timeout_kills_the_process() {
            let dir = tempfile::tempdir().unwrap();
            let pid_file = dir.path().join("pid");
            let bin = fake_ollama(
                dir.path(),
                &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
            );
            let client = OllamaClient::new(bin.to_string_lossy(), Duration::from_millis(700));

            let started = Instant::now();
            let output = client.evaluate("llama3.1:8b", "x").await;
            assert!(started.elapsed() < Duration::from_secs(10));
            assert!(matches!(output, EvaluatorOutput::TimedOut { .. }));
            assert!(output.into_text().contains("timed out"));

            let pid = std::fs::read_to_string(&pid_file).unwrap();
            let alive = std::process::Command::new("kill")
                .args(["-0", pid.trim()])
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(!alive.success(), "process {} still running", pid.trim());
        }

        #[tokio::test]
        async fn test_timeout_covers_output_held_open_by_background_process() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ollama(
                dir.path(),
                "cat > /dev/null\nsleep 8 &\necho partial\nexit 0",
            );
            let client = OllamaClient::new(bin.to_string_lossy(), Duration::from_secs(1));

            let started = Instant::now();
            let output = client.evaluate("llama3.1:8b", "x").await;
            assert!(
                started.elapsed() < Duration::from_secs(3),
                "took {:?}",
                started.elapsed()
            );
            assert!(matches!(output, EvaluatorOutput::TimedOut { .. }));
        }
    }
}
