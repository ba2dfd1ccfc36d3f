//! Child process spawning for the proxied server.
//!
//! The child gets piped stdin/stdout (both sides of the protocol) and
//! inherits stderr so its diagnostics reach the operator untouched.

use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Configuration for the proxied child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// The program to execute.
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,
}

impl ProcessOptions {
    /// Create new options for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Build from a full command line: program followed by its arguments.
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone()).args(args.iter().cloned()))
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command line as recorded on the session.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Spawn the child with piped stdin/stdout and inherited stderr.
///
/// Working directory and environment are inherited from the proxy. The
/// child is killed if its handle is dropped before it exits.
pub fn spawn_piped(options: &ProcessOptions) -> Result<Child> {
    let mut cmd = Command::new(&options.program);
    cmd.args(&options.args);

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    cmd.spawn()
        .with_context(|| format!("Failed to spawn process: {}", options.program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn command_line_round_trip() {
        let line: Vec<String> = ["node", "server.js", "--port", "3"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let options = ProcessOptions::from_command_line(&line).unwrap();
        assert_eq!(options.program, "node");
        assert_eq!(options.args, vec!["server.js", "--port", "3"]);
        assert_eq!(options.display(), "node server.js --port 3");

        assert!(ProcessOptions::from_command_line(&[]).is_none());
    }

    #[tokio::test]
    async fn spawn_echoes_through_pipes() {
        let mut child = spawn_piped(&ProcessOptions::new("cat")).unwrap();
        let mut stdin = child.stdin.take().unwrap();
        let mut stdout = child.stdout.take().unwrap();

        stdin.write_all(b"hello\n").await.unwrap();
        drop(stdin);

        let mut output = String::new();
        stdout.read_to_string(&mut output).await.unwrap();
        assert_eq!(output, "hello\n");
        assert!(child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn child_inherits_environment() {
        let path = std::env::var("PATH").unwrap();
        let mut child =
            spawn_piped(&ProcessOptions::new("sh").arg("-c").arg("echo \"$PATH\"")).unwrap();
        let mut stdout = child.stdout.take().unwrap();

        let mut output = String::new();
        stdout.read_to_string(&mut output).await.unwrap();
        assert_eq!(output.trim_end(), path);
        child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn spawn_nonexistent() {
        let result = spawn_piped(&ProcessOptions::new("nonexistent_command_12345"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let mut child = spawn_piped(&ProcessOptions::new("sh").arg("-c").arg("exit 42")).unwrap();
        assert_eq!(child.wait().await.unwrap().code(), Some(42));
    }
}
