//! # Attestation Verifier
//!
//! The in-toto verifier is an external program. [`InTotoVerifier`] runs it
//! with the working directory as its current directory:
//!
//! ```text
//! in-toto-verify --verbose --layout <layout> --layout-keys <key>...
//! ```
//!
//! Any failure to run it, a non-zero exit status, or termination by signal
//! is a rejection. Standard error is captured into the rejection reason.

use std::ffi::OsString;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use intuf_core::TargetPath;

/// Default verifier executable.
pub const DEFAULT_VERIFIER: &str = "in-toto-verify";

/// Longest stderr excerpt kept in a rejection reason.
const MAX_REASON_BYTES: usize = 4096;

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The supply chain verified against the layout.
    Verified,
    /// Verification failed or could not be run.
    Rejected(String),
}

impl Verdict {
    /// Whether this is [`Verdict::Verified`].
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Checks a staged supply chain against a layout.
pub trait Verifier: Send + Sync {
    /// Verify the contents of `workdir` against `layout`, trusting `keys`.
    ///
    /// Paths are relative to `workdir`.
    fn verify(
        &self,
        workdir: &Path,
        layout: &TargetPath,
        keys: &[TargetPath],
    ) -> impl Future<Output = Verdict> + Send;
}

/// Runs the in-toto command-line verifier.
#[derive(Debug, Clone)]
pub struct InTotoVerifier {
    program: OsString,
    verbose: bool,
}

impl Default for InTotoVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFIER)
    }
}

impl InTotoVerifier {
    /// Use `program` as the verifier executable.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            verbose: true,
        }
    }

    /// Toggle `--verbose`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The command that [`Verifier::verify`] runs.
    pub fn command(
        &self,
        workdir: &Path,
        layout: &TargetPath,
        keys: &[TargetPath],
    ) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        if self.verbose {
            cmd.arg("--verbose");
        }
        cmd.arg("--layout").arg(layout.as_str());
        cmd.arg("--layout-keys");
        cmd.args(keys.iter().map(TargetPath::as_str));
        cmd.current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Verifier for InTotoVerifier {
    async fn verify(&self, workdir: &Path, layout: &TargetPath, keys: &[TargetPath]) -> Verdict {
        let program = self.program.to_string_lossy().into_owned();
        tracing::info!(
            verifier = %program,
            layout = %layout,
            keys = keys.len(),
            workdir = %workdir.display(),
            "running attestation verifier"
        );

        let output = match self.command(workdir, layout, keys).output().await {
            Ok(output) => output,
            Err(e) => return Verdict::Rejected(format!("failed to run {program}: {e}")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(verifier = %program, "{}", stdout.trim());
        }

        if output.status.success() {
            return Verdict::Verified;
        }

        let stderr = excerpt(&output.stderr);
        match output.status.code() {
            Some(code) => Verdict::Rejected(format!("{program} exited with status {code}: {stderr}")),
            None => Verdict::Rejected(format!("{program} terminated by signal: {stderr}")),
        }
    }
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_REASON_BYTES)]);
    text.trim().to_string()
}
