//! What learner code may do in the sandbox, and how its output is reported.

/// Returned instead of running code that touches the file system or process.
pub const SECURITY_ALERT: &str =
    "Security Alert: This sandbox does not allow file/system operations.";

const FORBIDDEN: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "open(",
    "exec(",
    "eval(",
];

/// The first forbidden fragment found in `code`, if any.
pub fn forbidden_fragment(code: &str) -> Option<&'static str> {
    FORBIDDEN.iter().copied().find(|f| code.contains(f))
}

/// stdout, followed by stderr on its own line when there is any.
pub fn combine_output(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    }
}

/// Message forwarded to the tutor after a run so it can comment on the result.
pub fn review_message(code: &str, output: &str) -> String {
    format!("I ran this code:\n```python\n{code}\n```\nOutput:\n```\n{output}\n```")
}
