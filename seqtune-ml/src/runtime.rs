//! Python runtime manager for the external trainer.
//!
//! The fine-tuning framework is a Python library; seqtune only prepares its
//! inputs and supervises the interpreter as a child process.

use crate::config::PythonConfig;
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Information about the detected Python installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonInfo {
    pub path: PathBuf,
    pub version: String,
    pub venv_path: Option<PathBuf>,
}

/// Managed Python subprocess runner.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    workdir: PathBuf,
    timeout: Option<Duration>,
}

impl PythonRuntime {
    /// Create from the `[python]` configuration section.
    ///
    /// Without an explicit interpreter or venv, an active virtual environment
    /// (`VIRTUAL_ENV`, then `.venv` / `venv` in the working directory) is used.
    pub fn from_config(config: &PythonConfig, workdir: PathBuf) -> Self {
        let venv_path = match (&config.python_path, &config.venv_path) {
            (_, Some(venv)) => Some(venv.clone()),
            (None, None) => detect_venv(),
            (Some(_), None) => None,
        };
        Self {
            python_path: config
                .python_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("python3")),
            venv_path,
            workdir,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Like [`Self::from_config`], but probes `python3` then `python` when
    /// neither an interpreter nor a venv is known.
    ///
    /// Falls back to `python3` if the probe finds nothing; the package check
    /// before launch reports the problem.
    pub async fn resolve(config: &PythonConfig, workdir: PathBuf) -> Self {
        let runtime = Self::from_config(config, workdir);
        if config.python_path.is_some() || runtime.venv_path.is_some() {
            return runtime;
        }
        match Self::detect().await {
            Ok(info) => {
                debug!(python = %info.path.display(), version = %info.version, "Detected Python");
                Self {
                    python_path: info.path,
                    ..runtime
                }
            }
            Err(e) => {
                warn!(error = %e, "Python detection failed, using python3");
                runtime
            }
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Detect available Python installation.
    pub async fn detect() -> Result<PythonInfo, MlError> {
        for cmd in &["python3", "python"] {
            let output = Command::new(cmd).args(["--version"]).output().await;

            if let Ok(output) = output
                && output.status.success()
            {
                // Python 2 printed its version on stderr.
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                let version = if version.is_empty() {
                    String::from_utf8_lossy(&output.stderr).trim().to_string()
                } else {
                    version
                };

                return Ok(PythonInfo {
                    path: PathBuf::from(cmd),
                    version,
                    venv_path: detect_venv(),
                });
            }
        }

        Err(MlError::Python(
            "Python not found. Install Python 3.8+ to run the trainer.".to_string(),
        ))
    }

    /// Effective interpreter path, accounting for a virtual environment.
    pub fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    /// Run a script file to completion, streaming its output to this process.
    ///
    /// The child is killed if the configured timeout elapses.
    pub async fn run_script_file(&self, script_path: &Path, args: &[&str]) -> Result<(), MlError> {
        debug!(script = %script_path.display(), ?args, "Running Python script");

        let mut child = Command::new(self.python_cmd())
            .arg(script_path)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MlError::Python(format!("Failed to spawn Python: {e}")))?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    child.kill().await.ok();
                    return Err(MlError::Timeout(format!(
                        "Script timed out after {}s",
                        limit.as_secs()
                    )));
                }
            },
            None => child.wait().await?,
        };

        if !status.success() {
            return Err(MlError::Python(format!(
                "Script {} failed (exit {status})",
                script_path.display()
            )));
        }
        Ok(())
    }

    /// Check which packages are importable.
    pub async fn check_packages(&self, packages: &[&str]) -> HashMap<String, bool> {
        let mut results = HashMap::new();

        for pkg in packages {
            let script = format!("import importlib; importlib.import_module('{pkg}'); print('ok')");
            let available = Command::new(self.python_cmd())
                .args(["-c", &script])
                .output()
                .await
                .is_ok_and(|o| o.status.success());

            results.insert(pkg.to_string(), available);
        }

        results
    }

    /// Fail unless every package in `packages` can be imported.
    pub async fn require_packages(&self, packages: &[&str]) -> Result<(), MlError> {
        let available = self.check_packages(packages).await;
        let mut missing: Vec<&str> = packages
            .iter()
            .copied()
            .filter(|p| !available.get(*p).copied().unwrap_or(false))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        Err(MlError::Python(format!(
            "missing Python packages for {}: {} (pip install {})",
            self.python_cmd().display(),
            missing.join(", "),
            missing.join(" ")
        )))
    }
}

/// Detect a virtual environment from `VIRTUAL_ENV` or common directory names.
fn detect_venv() -> Option<PathBuf> {
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        let path = PathBuf::from(venv);
        if path.exists() {
            return Some(path);
        }
    }

    for name in &[".venv", "venv"] {
        let path = PathBuf::from(name);
        if path.join("pyvenv.cfg").exists() {
            return Some(path);
        }
    }

    None
}
