//! Environment and system information operations.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::Command;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn current_dir_impl(&self) -> Result<PathBuf> {
        env::current_dir().context("Failed to determine the current directory")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn home_dir_impl(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn config_dir_impl(&self) -> Option<PathBuf> {
        dirs::config_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn command_output_impl(&self, program: &str, args: &[String]) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run {}", program))?;

        if !output.status.success() {
            anyhow::bail!("{} exited with {}", program, output.status);
        }

        let stdout = String::from_utf8(output.stdout)
            .with_context(|| format!("{} produced non UTF-8 output", program))?;
        Ok(stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_real_runtime_env_and_dirs() {
        let runtime = RealRuntime;

        // PATH should exist on all systems
        assert!(runtime.env_var("PATH").is_ok());
        assert!(runtime.current_dir().unwrap().is_absolute());

        // CI might not have home
        let home = runtime.home_dir();
        assert!(home.is_some() || cfg!(target_os = "linux"));
    }

    #[test]
    fn test_real_runtime_missing_env_var() {
        let runtime = RealRuntime;
        assert!(
            runtime
                .env_var("COMPOSER_HISTORY_SURELY_UNSET_VARIABLE")
                .is_err()
        );
    }

    #[test]
    fn test_real_runtime_command_output_missing_program() {
        let runtime = RealRuntime;
        let result = runtime.command_output("composer-history-no-such-program", &[]);
        assert!(result.is_err());
    }
}
