//! External tool dispatch.
//!
//! Spawns the native indexer/searcher against a chosen index file and drains
//! its output concurrently. Output draining is line-count bounded: once a
//! stream has produced enough lines the child is terminated, and that
//! deliberate kill still counts as a successful invocation.

use crate::error::{Error, Result};
use log::debug;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Environment variable the external tools read the target index file from
pub const INDEX_ENV_VAR: &str = "CSEARCHINDEX";

/// Captured output of one tool invocation
#[derive(Debug)]
pub struct ToolOutput {
    /// True when the tool exited 0, or when it was killed on purpose after
    /// hitting a line bound
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stdout_lines(&self) -> Vec<&[u8]> {
        lines(&self.stdout)
    }

    pub fn stderr_lines(&self) -> Vec<&[u8]> {
        lines(&self.stderr)
    }
}

/// Split captured bytes into lines, ignoring the empty tail after a final
/// newline
pub fn lines(buf: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = buf.split(|&b| b == b'\n').collect();
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Runs external tools against index files, one spawn at a time.
#[derive(Debug, Default)]
pub struct Dispatcher {
    // The child environment is bound per spawn, so the lock only needs to
    // cover the spawn critical section itself.
    spawn_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `argv` with `CSEARCHINDEX` pointing at `index_file`.
    ///
    /// Both pipes are drained on their own threads while the calling thread
    /// waits for exit. When `max_stdout_lines` / `max_stderr_lines` is set
    /// and the stream reaches it (a final unterminated line counts), the
    /// child is terminated and `success` is reported as true.
    pub fn run_indexed(
        &self,
        argv: &[String],
        index_file: &Path,
        max_stdout_lines: Option<usize>,
        max_stderr_lines: Option<usize>,
    ) -> Result<ToolOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| Error::Spawn {
            program: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty argv"),
        })?;

        debug!(
            "dispatch: {} {:?} (index: {})",
            program,
            args,
            index_file.display()
        );

        let mut child = {
            let _guard = self.spawn_lock.lock().unwrap();
            Command::new(program)
                .args(args)
                .env(INDEX_ENV_VAR, index_file)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|source| Error::Spawn {
                    program: program.clone(),
                    source,
                })?
        };

        let killed = Arc::new(AtomicBool::new(false));
        let pid = child.id();

        let out_handle = spawn_drain(child.stdout.take(), max_stdout_lines, &killed, pid);
        let err_handle = spawn_drain(child.stderr.take(), max_stderr_lines, &killed, pid);

        let status = match child.wait() {
            Ok(status) => Some(status),
            Err(err) if killed.load(Ordering::SeqCst) => {
                debug!("dispatch: wait failed after deliberate kill: {}", err);
                None
            }
            Err(err) => {
                let _ = out_handle.join();
                let _ = err_handle.join();
                return Err(Error::Io(err));
            }
        };

        let stdout = join_drain(out_handle)?;
        let stderr = join_drain(err_handle)?;

        let success = killed.load(Ordering::SeqCst) || status.is_some_and(|s| s.success());
        debug!(
            "dispatch: {} finished (success: {}, killed: {})",
            program,
            success,
            killed.load(Ordering::SeqCst)
        );

        Ok(ToolOutput {
            success,
            stdout,
            stderr,
        })
    }
}

/// Drain one pipe to a buffer, terminating the child once `limit` lines have
/// been seen. Keeps reading to EOF after a kill so the child never blocks on
/// a full pipe.
fn spawn_drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    limit: Option<usize>,
    killed: &Arc<AtomicBool>,
    pid: u32,
) -> JoinHandle<io::Result<Vec<u8>>> {
    let killed = Arc::clone(killed);
    thread::spawn(move || {
        let mut buf = Vec::new();
        let Some(mut pipe) = pipe else {
            return Ok(buf);
        };

        let mut chunk = [0u8; 8192];
        let mut seen = 0usize;
        loop {
            let n = match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if killed.load(Ordering::SeqCst) => {
                    debug!("dispatch: pipe closed after kill: {}", err);
                    break;
                }
                Err(err) => return Err(err),
            };
            buf.extend_from_slice(&chunk[..n]);

            if let Some(limit) = limit {
                seen += chunk[..n].iter().filter(|&&b| b == b'\n').count();
                if seen >= limit && !killed.swap(true, Ordering::SeqCst) {
                    terminate(pid);
                }
            }
        }

        // A final unterminated line still counts toward the bound
        if let Some(limit) = limit {
            if buf.last().is_some_and(|&b| b != b'\n') {
                seen += 1;
            }
            if seen >= limit && !killed.swap(true, Ordering::SeqCst) {
                terminate(pid);
            }
        }

        Ok(buf)
    })
}

fn join_drain(handle: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    let buf = handle
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))??;
    Ok(buf)
}

#[cfg(unix)]
fn terminate(pid: u32) {
    unsafe {
        libc::kill(pid as i32, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn index_file() -> PathBuf {
        PathBuf::from("/tmp/test-index")
    }

    #[test]
    fn test_success_and_output_capture() {
        let dispatcher = Dispatcher::new();
        let output = dispatcher
            .run_indexed(&sh("echo out; echo err >&2"), &index_file(), None, None)
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
        assert_eq!(output.stdout_lines(), vec![b"out".as_slice()]);
    }

    #[test]
    fn test_nonzero_exit_is_reported_not_raised() {
        let dispatcher = Dispatcher::new();
        let output = dispatcher
            .run_indexed(&sh("echo partial; exit 3"), &index_file(), None, None)
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.stdout, b"partial\n");
    }

    #[test]
    fn test_spawn_failure() {
        let dispatcher = Dispatcher::new();
        let argv = vec!["/nonexistent/tool".to_string()];
        match dispatcher.run_indexed(&argv, &index_file(), None, None) {
            Err(Error::Spawn { program, .. }) => assert_eq!(program, "/nonexistent/tool"),
            other => panic!("expected spawn error, got {:?}", other.map(|o| o.success)),
        }
    }

    #[test]
    fn test_index_env_binding() {
        let dispatcher = Dispatcher::new();
        let output = dispatcher
            .run_indexed(
                &sh("printf '%s' \"$CSEARCHINDEX\""),
                &PathBuf::from("/tmp/some-index"),
                None,
                None,
            )
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, b"/tmp/some-index");
    }

    #[test]
    fn test_stdout_line_bound_kills_child() {
        let dispatcher = Dispatcher::new();
        let output = dispatcher
            .run_indexed(
                &sh("i=0; while [ $i -lt 10 ]; do echo line$i; i=$((i+1)); done; sleep 30; echo late"),
                &index_file(),
                Some(5),
                None,
            )
            .unwrap();
        // Deliberate kill reports success; the post-sleep line never arrives
        assert!(output.success);
        assert!(output.stdout_lines().len() >= 5);
        assert!(!output.stdout.ends_with(b"late\n"));
    }

    #[test]
    fn test_unterminated_final_line_counts() {
        let dispatcher = Dispatcher::new();
        let output = dispatcher
            .run_indexed(&sh("printf 'a\\nb'"), &index_file(), Some(2), None)
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout_lines(), vec![b"a".as_slice(), b"b".as_slice()]);
    }

    #[test]
    fn test_stderr_bound_is_independent() {
        let dispatcher = Dispatcher::new();
        let output = dispatcher
            .run_indexed(
                &sh("i=0; while [ $i -lt 10 ]; do echo e$i >&2; i=$((i+1)); done; sleep 30"),
                &index_file(),
                None,
                Some(3),
            )
            .unwrap();
        assert!(output.success);
        assert!(output.stderr_lines().len() >= 3);
    }

    #[test]
    fn test_lines_helper() {
        assert_eq!(lines(b""), Vec::<&[u8]>::new());
        assert_eq!(lines(b"a\n"), vec![b"a".as_slice()]);
        assert_eq!(
            lines(b"a\n\nb"),
            vec![b"a".as_slice(), b"".as_slice(), b"b".as_slice()]
        );
    }
}
