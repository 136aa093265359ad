use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::ProviderError;
use crate::domain::models::{
    ExecutionFailure, ExecutionOutcome, FilesystemIsolation, NetworkIsolation, RuntimeConfig,
    SandboxConfig, TargetLanguage,
};
use crate::domain::ports::Sandbox;

use super::errors::SandboxError;

const FILE_PLACEHOLDER: &str = "{file}";
const READ_CHUNK: usize = 8 * 1024;

/// Exit status and stderr prefix the lockdown script uses for setup failures
const LOCKDOWN_FAILED: i32 = 125;
const LOCKDOWN_MARKER: &str = "solveloop-sandbox:";

/// Runs as namespace root inside a private mount namespace, then execs the
/// program. Every inherited mount is remounted read-only and the working
/// directory (the scratch dir) is bound back on top of itself read-write.
const LOCKDOWN_SCRIPT: &str = r#"fail() { echo "solveloop-sandbox: $1" >&2; exit 125; }
scratch=$(pwd) || fail "no working directory"
mount -o remount,bind,ro / 2>/dev/null || fail "cannot remount / read-only"
while read -r _ _ _ _ mnt _; do
  mount -o remount,bind,ro "$mnt" 2>/dev/null
done < /proc/self/mountinfo
mount --bind "$scratch" "$scratch" 2>/dev/null || fail "cannot bind the scratch directory"
mount -o remount,bind,rw "$scratch" 2>/dev/null || fail "cannot make the scratch directory writable"
cd / && cd "$scratch" || fail "cannot enter the scratch directory"
exec "$@"
"#;

/// Sandbox that runs each program as a child process in a throwaway directory
///
/// Every execution gets:
/// - a fresh temporary directory as working directory, `HOME` and `TMPDIR`
/// - a cleared environment (only `PATH` and locale are passed through)
/// - its own process group, killed as a whole once the program exits, times
///   out or is dropped
/// - by default a private mount namespace in which only the scratch
///   directory is writable, and a private network namespace
///
/// Standard output and error are captured up to `max_output_bytes` each.
pub struct ProcessSandbox {
    config: SandboxConfig,
    permits: Arc<Semaphore>,
    host_path: String,
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let host_path = std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string());

        Self {
            config,
            permits,
            host_path,
        }
    }

    fn runtime(&self, language: TargetLanguage) -> Result<&RuntimeConfig, ProviderError> {
        self.config
            .runtime_for(language)
            .ok_or_else(|| ProviderError::UnsupportedLanguage(language.to_string()))
    }

    /// `unshare` flags for the configured isolation, ending in `--`
    fn namespace_flags(&self) -> Vec<&'static str> {
        let mut flags = vec!["--user", "--map-root-user"];
        if self.config.network_isolation == NetworkIsolation::Unshare {
            flags.push("--net");
        }
        if self.config.filesystem_isolation == FilesystemIsolation::ReadOnlyHost {
            flags.push("--mount");
        }
        flags.push("--");
        flags
    }

    /// Command for `program` with isolation wrapping and a scrubbed
    /// environment rooted at `scratch`
    fn launcher(&self, program: &str, args: &[String], scratch: &Path) -> Command {
        let mut command = if self.config.needs_namespaces() {
            let mut command = Command::new("unshare");
            command.args(self.namespace_flags());
            if self.config.filesystem_isolation == FilesystemIsolation::ReadOnlyHost {
                command.args(["sh", "-c", LOCKDOWN_SCRIPT, "solveloop-sandbox"]);
            }
            command.arg(program).args(args);
            command
        } else {
            let mut command = Command::new(program);
            command.args(args);
            command
        };

        command
            .current_dir(scratch)
            .env_clear()
            .env("PATH", &self.host_path)
            .env("HOME", scratch)
            .env("TMPDIR", scratch)
            .env("LANG", "C.UTF-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .kill_on_drop(true);

        command
    }

    fn build_command(&self, runtime: &RuntimeConfig, scratch: &Path) -> Command {
        let mut command = self.launcher(&runtime.program, &runtime_args(runtime), scratch);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        command
    }

    fn find_on_path(&self, program: &str) -> Option<PathBuf> {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }

        std::env::split_paths(&self.host_path)
            .map(|dir| dir.join(program))
            .find(|path| path.is_file())
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    #[instrument(skip_all, fields(%language, source_bytes = source.len()))]
    async fn execute(
        &self,
        source: &str,
        test_input: &str,
        language: TargetLanguage,
    ) -> Result<ExecutionOutcome, ProviderError> {
        let runtime = self.runtime(language)?;
        if self.config.needs_namespaces() && self.find_on_path(&runtime.program).is_none() {
            return Err(SandboxError::RuntimeMissing {
                program: runtime.program.clone(),
                language,
            }
            .into());
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| SandboxError::Closed)?;

        let scratch = tempfile::Builder::new()
            .prefix("solveloop-")
            .tempdir()
            .map_err(SandboxError::Scratch)?;
        tokio::fs::write(scratch.path().join(&runtime.file_name), source)
            .await
            .map_err(SandboxError::WriteSource)?;

        let mut child = self
            .build_command(runtime, scratch.path())
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: runtime.program.clone(),
                source,
            })?;
        let group = ProcessGroupGuard::new(child.id());
        debug!(program = %runtime.program, pid = child.id(), "program started");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.max_output_bytes;
        let started = Instant::now();

        let run = async {
            let exited = async {
                let status = child.wait().await;
                // Background children still hold the pipes open
                group.kill();
                status
            };
            tokio::join!(
                feed_stdin(stdin, test_input),
                read_capped(stdout, limit),
                read_capped(stderr, limit),
                exited,
            )
        };

        let time_limit = Duration::from_millis(self.config.timeout_ms);
        let outcome = match timeout(time_limit, run).await {
            Err(_) => {
                info!(limit_ms = self.config.timeout_ms, "program timed out");
                ExecutionOutcome::failed(
                    ExecutionFailure::Timeout {
                        limit_ms: self.config.timeout_ms,
                    },
                    "",
                )
            }
            Ok((stdin_result, stdout_result, stderr_result, status)) => {
                if let Err(err) = stdin_result {
                    debug!(error = %err, "could not deliver test input");
                }
                let status = status.map_err(SandboxError::Wait)?;
                let (stdout, truncated) = stdout_result.map_err(SandboxError::Capture)?;
                let (stderr, _) = stderr_result.unwrap_or_default();

                if self.config.needs_namespaces() {
                    if let Some(reason) = isolation_failure(status, &stderr) {
                        warn!(%reason, "sandbox isolation could not be set up");
                        return Err(SandboxError::IsolationUnavailable(reason).into());
                    }
                }
                classify(status, &stdout, truncated, &stderr)
            }
        };

        info!(
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            completed = outcome.is_completed(),
            "execution finished"
        );
        Ok(outcome)
    }

    async fn health_check(&self, language: TargetLanguage) -> Result<(), ProviderError> {
        let runtime = self.runtime(language)?;

        if self.find_on_path(&runtime.program).is_none() {
            return Err(SandboxError::RuntimeMissing {
                program: runtime.program.clone(),
                language,
            }
            .into());
        }

        if self.config.needs_namespaces() {
            let scratch = tempfile::Builder::new()
                .prefix("solveloop-check-")
                .tempdir()
                .map_err(SandboxError::Scratch)?;
            let check = self
                .launcher("true", &[], scratch.path())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| SandboxError::IsolationUnavailable(e.to_string()))?;

            if !check.status.success() {
                let reason = first_line(&check.stderr)
                    .unwrap_or_else(|| format!("isolation check exited with {}", check.status));
                warn!(%reason, "isolation check failed");
                return Err(SandboxError::IsolationUnavailable(reason).into());
            }
        }

        Ok(())
    }
}

/// Arguments for a runtime with `{file}` substituted, or the file appended
fn runtime_args(runtime: &RuntimeConfig) -> Vec<String> {
    let mut args: Vec<String> = runtime
        .args
        .iter()
        .map(|arg| arg.replace(FILE_PLACEHOLDER, &runtime.file_name))
        .collect();

    if !runtime.args.iter().any(|arg| arg.contains(FILE_PLACEHOLDER)) {
        args.push(runtime.file_name.clone());
    }
    args
}

/// Setup failures of `unshare` or the lockdown script, as opposed to the
/// program's own exit
fn isolation_failure(status: ExitStatus, stderr: &[u8]) -> Option<String> {
    let line = first_line(stderr)?;
    match status.code() {
        Some(LOCKDOWN_FAILED) if line.starts_with(LOCKDOWN_MARKER) => Some(line),
        Some(1) if line.starts_with("unshare: ") => Some(line),
        _ => None,
    }
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn classify(status: ExitStatus, stdout: &[u8], truncated: bool, stderr: &[u8]) -> ExecutionOutcome {
    let stderr = String::from_utf8_lossy(stderr).into_owned();

    if status.success() {
        return ExecutionOutcome::Completed {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            truncated,
        };
    }

    match status.code() {
        Some(code) => ExecutionOutcome::failed(ExecutionFailure::NonZeroExit { code }, stderr),
        None => {
            let signal = status
                .signal()
                .map_or_else(String::new, |signal| format!("signal {signal}"));
            let diagnostic = [signal, stderr]
                .into_iter()
                .filter(|part| !part.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            ExecutionOutcome::failed(ExecutionFailure::Killed, diagnostic)
        }
    }
}

/// Write the test input and close stdin; a program that never reads is fine
async fn feed_stdin(stdin: Option<tokio::process::ChildStdin>, input: &str) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };

    match stdin.write_all(input.as_bytes()).await {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

/// Read a stream to the end, keeping at most `limit` bytes
async fn read_capped<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
) -> io::Result<(Vec<u8>, bool)> {
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut captured = Vec::new();
    let mut truncated = false;
    let mut chunk = vec![0_u8; READ_CHUNK];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.len());
        if read > room {
            truncated = true;
        }
        captured.extend_from_slice(&chunk[..read.min(room)]);
    }

    Ok((captured, truncated))
}

/// Kills the child's whole process group when dropped
struct ProcessGroupGuard {
    group: Option<Pid>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        let group = pid
            .and_then(|pid| i32::try_from(pid).ok())
            .map(Pid::from_raw);
        Self { group }
    }

    fn kill(&self) {
        if let Some(group) = self.group {
            // ESRCH just means everything already exited
            let _ = killpg(group, Signal::SIGKILL);
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}
