//! Command-line surface of the `wimcap` binary.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use wimcap_config::{
    CaptureProfile, CaptureSettings, ConfigResult, MountBackend, load_settings,
    normalize_capture_settings,
};
use wimcap_telemetry::LogFormat;

use crate::error::{AppError, AppResult};

/// Capture a Hyper-V disk image into a `.wim` archive.
#[derive(Debug, Parser)]
#[command(name = "wimcap", version, about = "Capture Hyper-V disk images into WIM archives")]
pub struct Cli {
    /// Log output format (`json` or `pretty`).
    #[arg(long, global = true, env = "WIMCAP_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mount the upstream disk image and capture it.
    Capture(CaptureArgs),
    /// Remove the workspace of a previous capture.
    Cleanup(CleanupArgs),
}

impl Command {
    /// Label recorded on the process span.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Capture(_) => "capture",
            Self::Cleanup(_) => "cleanup",
        }
    }
}

/// Arguments for `wimcap capture`.
#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Identifier of the builder that produced the files.
    #[arg(long)]
    pub builder_id: String,
    /// File produced by the upstream builder; repeat for several.
    #[arg(long = "file", required = true)]
    pub files: Vec<PathBuf>,
    /// JSON settings document.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Archive base name.
    #[arg(long)]
    pub name: Option<String>,
    /// Description carried onto the artifact.
    #[arg(long)]
    pub description: Option<String>,
    /// Compression code: 0 none, 1 xpress, 2 lzx, 3 lzms.
    #[arg(long)]
    pub compression: Option<u32>,
    /// Permit compression code 3.
    #[arg(long)]
    pub allow_recovery_compression: bool,
    /// Workspace directory for the archive.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Mount tool (`dism` or `guestmount`).
    #[arg(long)]
    pub mount_backend: Option<MountBackend>,
    /// Cancel the run after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Write the resulting artifact as JSON to this path.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

impl CaptureArgs {
    /// Resolve the effective profile: document, then `env_overrides`, then
    /// flags. The binary passes [`wimcap_config::apply_process_env`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when loading, overriding or validation
    /// fails.
    pub fn resolve_profile<F>(&self, env_overrides: F) -> AppResult<CaptureProfile>
    where
        F: FnOnce(CaptureSettings) -> ConfigResult<CaptureSettings>,
    {
        let settings = match &self.config {
            Some(path) => load_settings(path).map_err(|err| AppError::config("config.load", err))?,
            None => CaptureSettings::default(),
        };
        let settings = env_overrides(settings)
            .map_err(|err| AppError::config("config.env_overrides", err))?;
        normalize_capture_settings(self.apply_flags(settings))
            .map_err(|err| AppError::config("config.normalize", err))
    }

    fn apply_flags(&self, mut settings: CaptureSettings) -> CaptureSettings {
        if let Some(name) = &self.name {
            settings.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            settings.description.clone_from(description);
        }
        if let Some(compression) = self.compression {
            settings.compression = compression;
        }
        if self.allow_recovery_compression {
            settings.allow_recovery_compression = true;
        }
        if let Some(output_dir) = &self.output_dir {
            settings.output_dir.clone_from(output_dir);
        }
        if let Some(backend) = self.mount_backend {
            settings.mount_backend = backend;
        }
        settings
    }
}

/// Arguments for `wimcap cleanup`.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["output_dir", "manifest"])))]
pub struct CleanupArgs {
    /// Workspace directory to remove.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Artifact manifest written by a previous `capture --manifest`.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use clap::CommandFactory;
    use tempfile::TempDir;
    use wimcap_config::apply_env_overrides;
    use wimcap_core::CompressionMode;

    use super::*;

    fn capture_args(argv: &[&str]) -> anyhow::Result<CaptureArgs> {
        let cli = Cli::try_parse_from(argv)?;
        match cli.command {
            Command::Capture(args) => Ok(args),
            Command::Cleanup(_) => anyhow::bail!("expected capture"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn capture_requires_at_least_one_file() {
        assert!(Cli::try_parse_from(["wimcap", "capture", "--builder-id", "x"]).is_err());
    }

    #[test]
    fn cleanup_requires_a_target() {
        assert!(Cli::try_parse_from(["wimcap", "cleanup"]).is_err());
        assert!(Cli::try_parse_from(["wimcap", "cleanup", "--output-dir", "wim"]).is_ok());
    }

    #[test]
    fn flags_override_environment_and_document() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = dir.path().join("settings.json");
        fs::write(
            &config,
            r#"{"name":"from-file","description":"file","compression":1}"#,
        )?;
        let config_arg = config.display().to_string();
        let args = capture_args(&[
            "wimcap",
            "capture",
            "--builder-id",
            "MSOpenTech.hyperv",
            "--file",
            "/out/disk.vhdx",
            "--config",
            &config_arg,
            "--name",
            "from-flag",
            "--mount-backend",
            "dism",
        ])?;
        let env = HashMap::from([
            ("WIMCAP_NAME".to_string(), "from-env".to_string()),
            ("WIMCAP_COMPRESSION".to_string(), "0".to_string()),
        ]);

        let profile = args.resolve_profile(|settings| {
            apply_env_overrides(settings, |key| env.get(key).cloned())
        })?;
        assert_eq!(profile.name, "from-flag");
        assert_eq!(profile.description, "file");
        assert_eq!(profile.compression, CompressionMode::None);
        assert_eq!(profile.mount_backend, MountBackend::Dism);
        Ok(())
    }

    #[test]
    fn out_of_range_compression_is_rejected_before_running() -> anyhow::Result<()> {
        let args = capture_args(&[
            "wimcap",
            "capture",
            "--builder-id",
            "MSOpenTech.hyperv",
            "--file",
            "/out/disk.vhdx",
            "--compression",
            "7",
        ])?;
        let err = args
            .resolve_profile(Ok)
            .expect_err("compression 7 is out of range");
        assert!(matches!(err, AppError::Config { operation: "config.normalize", .. }));
        Ok(())
    }

    #[test]
    fn recovery_compression_needs_opt_in_flag() -> anyhow::Result<()> {
        let base = [
            "wimcap",
            "capture",
            "--builder-id",
            "MSOpenTech.hyperv",
            "--file",
            "/out/disk.vhdx",
            "--compression",
            "3",
        ];
        assert!(capture_args(&base)?.resolve_profile(Ok).is_err());

        let mut opted = base.to_vec();
        opted.push("--allow-recovery-compression");
        let profile = capture_args(&opted)?.resolve_profile(Ok)?;
        assert_eq!(profile.compression, CompressionMode::Recovery);
        assert!(!profile.warnings.is_empty());
        Ok(())
    }
}
