//! Learner code runner.
//!
//! Code is screened by [`forbidden_fragment`], then handed over stdin to a
//! fresh isolated interpreter (`python -I -c BOOTSTRAP`). The bootstrap runs
//! it with only [`SAFE_BUILTINS`] in scope, so `import` and `open` do not
//! exist. Output is read up to a byte cap under a wall-clock limit, and the
//! process is killed when either runs out or the caller goes away.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use sogo_core::code_policy::{combine_output, forbidden_fragment, SECURITY_ALERT};

use crate::config::SandboxConfig;
use crate::error::{Error, Result};

const TRUNCATION_NOTE: &str = "\n... output truncated";

/// The only names learner code can see.
pub const SAFE_BUILTINS: &[&str] = &[
    "print", "int", "str", "float", "len", "range", "list", "dict", "set", "bool", "abs", "min",
    "max", "sum", "round", "enumerate", "zip", "True", "False", "None",
];

/// Reads learner code from stdin and runs it against [`SAFE_BUILTINS`].
/// Tracebacks go to stderr.
const BOOTSTRAP: &str = r#"
import builtins, sys, traceback
code = sys.stdin.read()
safe = {name: getattr(builtins, name) for name in sys.argv[1:]}
try:
    exec(code, {"__builtins__": safe})
except Exception:
    traceback.print_exc()
"#;

#[derive(Debug, Clone)]
pub struct CodeRunner {
    python: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl CodeRunner {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            python: config.python.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Run `code` and return what it printed.
    ///
    /// Blocked code, crashes and timeouts all come back as output text for
    /// the learner to read. Only a missing interpreter is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the interpreter cannot be started or its pipes fail.
    pub async fn run(&self, code: &str) -> Result<String> {
        if let Some(fragment) = forbidden_fragment(code) {
            warn!("blocked learner code containing {fragment:?}");
            return Ok(SECURITY_ALERT.to_string());
        }

        let mut child = Command::new(&self.python)
            .args(["-I", "-c", BOOTSTRAP])
            .args(SAFE_BUILTINS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Interpreter {
                program: self.python.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(code.as_bytes()).await?;
            // stdin dropped here so the interpreter sees EOF
        }

        // One byte past the cap is enough to know the output was cut.
        let limit = self.max_output_bytes as u64 + 1;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = tokio::time::timeout(self.timeout, async {
            let (stdout, stderr) =
                tokio::try_join!(read_capped(stdout, limit), read_capped(stderr, limit))?;
            if stdout.len() as u64 >= limit || stderr.len() as u64 >= limit {
                debug!("learner output passed {} bytes, stopping", self.max_output_bytes);
                let _ = child.start_kill();
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                warn!("learner code timed out after {:?}", self.timeout);
                let _ = child.start_kill();
                return Ok(format!(
                    "Execution timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);
        debug!(
            "learner code exited with {status} ({} bytes out, {} bytes err)",
            stdout.len(),
            stderr.len()
        );

        Ok(truncate(
            combine_output(&stdout, &stderr),
            self.max_output_bytes,
        ))
    }
}

/// Read a pipe to EOF or `limit` bytes, whichever comes first. Dropping the
/// pipe after the cap makes further writes from the child fail.
async fn read_capped<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    limit: u64,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.take(limit).read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn truncate(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_NOTE);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> CodeRunner {
        CodeRunner::new(&SandboxConfig {
            timeout_secs: 2,
            ..SandboxConfig::default()
        })
    }

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    #[tokio::test]
    async fn test_forbidden_code_never_runs() {
        let runner = CodeRunner::new(&SandboxConfig {
            python: "/nonexistent/python".into(),
            ..SandboxConfig::default()
        });
        let out = runner.run("import os\nprint(os.getcwd())").await.unwrap();
        assert_eq!(out, SECURITY_ALERT);
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_error() {
        let runner = CodeRunner::new(&SandboxConfig {
            python: "/nonexistent/python".into(),
            ..SandboxConfig::default()
        });
        let err = runner.run("print(1)").await.unwrap_err();
        assert!(matches!(err, Error::Interpreter { .. }));
    }

    #[tokio::test]
    async fn test_prints_stdout() {
        if !python_available() {
            return;
        }
        let out = runner().run("runs = 4 + 6\nprint('Score:', runs)").await.unwrap();
        assert_eq!(out, "Score: 10\n");
    }

    #[tokio::test]
    async fn test_traceback_follows_stdout() {
        if !python_available() {
            return;
        }
        let out = runner().run("print('before')\nprint(wickets)").await.unwrap();
        assert!(out.starts_with("before\n\n"));
        assert!(out.contains("NameError"));
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        if !python_available() {
            return;
        }
        let runner = CodeRunner::new(&SandboxConfig {
            timeout_secs: 1,
            ..SandboxConfig::default()
        });
        let out = runner.run("while True:\n    pass").await.unwrap();
        assert_eq!(out, "Execution timed out after 1s");
    }

    #[tokio::test]
    async fn test_imports_are_unavailable() {
        if !python_available() {
            return;
        }
        let out = runner().run("print(__import__('os').getcwd())").await.unwrap();
        assert!(out.contains("NameError"), "{out}");
        assert!(!out.contains('/'));

        let out = runner().run("import math\nprint(math.pi)").await.unwrap();
        assert!(out.contains("ImportError"), "{out}");
        assert!(!out.contains("3.14"));
    }

    #[tokio::test]
    async fn test_safe_builtins_work() {
        if !python_available() {
            return;
        }
        let code = "runs = [4, 6, 1]\nprint(len(runs), sum(runs), max(runs), round(2.6))";
        assert_eq!(runner().run(code).await.unwrap(), "3 11 6 3\n");
    }

    #[tokio::test]
    async fn test_output_flood_is_cut_off() {
        if !python_available() {
            return;
        }
        let runner = CodeRunner::new(&SandboxConfig {
            timeout_secs: 5,
            max_output_bytes: 1024,
            ..SandboxConfig::default()
        });
        let code = "line = 'x' * 10000\nfor _ in range(100000):\n    print(line)";
        let out = runner.run(code).await.unwrap();
        assert!(out.starts_with("xxxx"), "{out}");
        assert!(out.ends_with(TRUNCATION_NOTE));
        assert!(out.len() <= 1024 + TRUNCATION_NOTE.len());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short".into(), 10), "short");
        let out = truncate("ಕನ್ನಡ".into(), 4);
        assert!(out.starts_with("ಕ"));
        assert!(out.ends_with(TRUNCATION_NOTE));
    }
}
