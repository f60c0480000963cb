//! The external converter process and the seam used to spawn it.

use std::io;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::command::{converter_command, probe_command};
use crate::invocation::Invocation;

pub type ConverterInput = Box<dyn AsyncWrite + Send + Unpin>;
pub type ConverterOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Resolves once the converter terminated, with its exit code (`None` when it
/// was terminated by a signal).
pub type ExitFuture = BoxFuture<'static, io::Result<Option<i32>>>;

/// A running converter: its three pipes and its termination status.
pub struct ConverterProcess {
    pub stdin: ConverterInput,
    pub stdout: ConverterOutput,
    pub stderr: ConverterOutput,
    pub exit: ExitFuture,
}

impl std::fmt::Debug for ConverterProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterProcess").finish_non_exhaustive()
    }
}

/// Spawns converter processes.
///
/// Called from within a Tokio runtime.
pub trait ConverterSpawner: Send + Sync {
    fn spawn(&self, invocation: &Invocation) -> io::Result<ConverterProcess>;
}

/// Spawns the converter as an OS child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessSpawner;

impl ConverterSpawner for ProcessSpawner {
    fn spawn(&self, invocation: &Invocation) -> io::Result<ConverterProcess> {
        let mut child = converter_command(invocation).spawn()?;
        debug!(
            pid = child.id(),
            program = %invocation.program,
            "Spawned converter"
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture converter stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture converter stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture converter stderr"))?;

        let exit = async move {
            let status = child.wait().await?;
            Ok(status.code())
        }
        .boxed();

        Ok(ConverterProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit,
        })
    }
}

/// Detect the converter version by running `<path> -version`.
///
/// Returns the first line of its output, or `None` if it cannot be run.
pub async fn detect_version(path: &str) -> Option<String> {
    let output = probe_command(path).arg("-version").output().await.ok()?;
    if !output.status.success() {
        return None;
    }

    String::from_utf8(output.stdout)
        .ok()
        .and_then(|s| s.lines().next().map(|l| l.trim().to_string()))
        .filter(|l| !l.is_empty())
}
