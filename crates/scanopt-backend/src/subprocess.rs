//! A [`LocalScanner`] that shells out to an external scanner binary.

use crate::LocalScanner;
use async_trait::async_trait;
use scanopt_core::{ScanResult, ScannerCriteria, ScannerDetails};
use scanopt_error::{ErrorCode, ScanOptError};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Invokes `command args... <dir>` and parses its stdout as a JSON-encoded
/// [`ScanResult`].
///
/// The subprocess is expected to print exactly one JSON object to stdout and
/// exit zero on success; anything else — a nonzero exit, a spawn failure, or
/// stdout that doesn't parse — is reported as a
/// [`ErrorCode::ScannerInvocationFailed`] error, which the orchestrator
/// converts into a synthetic result rather than aborting the run.
#[derive(Debug, Clone)]
pub struct SubprocessScanner {
    name: String,
    version: String,
    command: String,
    args: Vec<String>,
    config_fingerprint: BTreeMap<String, serde_json::Value>,
}

impl SubprocessScanner {
    /// A subprocess scanner named `name` at `version`, invoking `command`
    /// with `args` (plus the scan directory, appended last).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            command: command.into(),
            args,
            config_fingerprint: BTreeMap::new(),
        }
    }

    /// Attach a config fingerprint reported alongside this scanner's identity.
    #[must_use]
    pub fn with_config_fingerprint(
        mut self,
        fingerprint: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        self.config_fingerprint = fingerprint;
        self
    }
}

#[async_trait]
impl LocalScanner for SubprocessScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn details(&self) -> ScannerDetails {
        ScannerDetails {
            name: self.name.clone(),
            version: self.version.clone(),
            config_fingerprint: self.config_fingerprint.clone(),
        }
    }

    fn criteria(&self) -> ScannerCriteria {
        ScannerCriteria::any()
    }

    async fn scan_path(&self, dir: &Path) -> Result<ScanResult, ScanOptError> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| {
                ScanOptError::new(
                    ErrorCode::ScannerInvocationFailed,
                    format!("failed to spawn '{}': {err}", self.command),
                )
                .with_context("scanner", self.name.clone())
            })?;

        if !output.status.success() {
            return Err(ScanOptError::new(
                ErrorCode::ScannerInvocationFailed,
                format!(
                    "'{}' exited with {}: {}",
                    self.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ),
            )
            .with_context("scanner", self.name.clone()));
        }

        serde_json::from_slice::<ScanResult>(&output.stdout).map_err(|err| {
            ScanOptError::new(
                ErrorCode::ScannerInvocationFailed,
                format!("failed to parse '{}' output: {err}", self.command),
            )
            .with_context("scanner", self.name.clone())
        })
    }
}
