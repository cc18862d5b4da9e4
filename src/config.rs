use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub actions: ActionsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Timeout for listing and lookup commands, in seconds (0 = one hour).
    pub command_timeout_secs: u64,
    /// Timeout for mkfs, device add and balance, in seconds (0 = one hour).
    pub long_command_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Reject every mutating action. Off by default: anyone who can reach
    /// the API can mount, convert and format.
    pub read_only: bool,
    /// Parent directory for `btrfs_<uuid prefix>` mount points.
    pub mount_root: PathBuf,
    /// Used when a snapshot request carries no description.
    pub default_snapshot_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace. `RUST_LOG` takes precedence.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { command_timeout_secs: 30, long_command_timeout_secs: 600 }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            read_only:                    false,
            mount_root:                   PathBuf::from("/mnt"),
            default_snapshot_description: "Created via btrdash".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    /// Load from `path`, or from the default location. A missing default
    /// file is created; an unreadable one falls back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let explicit = path.is_some();
        let Some(path) = path.map(Path::to_path_buf).or_else(Config::config_path) else {
            return Config::default();
        };

        match try_load(&path) {
            Ok(c)  => c,
            Err(e) => {
                if path.exists() {
                    // Logging is not up yet; it is configured from this file.
                    eprintln!("btrdash: ignoring {}: {:#}", path.display(), e);
                } else if !explicit {
                    // Write defaults on first run (best-effort)
                    let _ = try_write_defaults(&path);
                }
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("btrdash").join("btrdash.toml"))
    }
}

fn try_load(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

fn try_write_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# btrdash configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: Config = toml::from_str("[actions]\nread_only = true\n").unwrap();
        assert!(cfg.actions.read_only);
        assert_eq!(cfg.actions.mount_root, PathBuf::from("/mnt"));
        assert_eq!(cfg.general.command_timeout_secs, 30);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, Config::default());
    }

    #[test]
    fn explicit_path_loads_and_bad_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        fs::write(&good, "[general]\ncommand_timeout_secs = 5\n").unwrap();
        assert_eq!(Config::load(Some(&good)).general.command_timeout_secs, 5);

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[general\n").unwrap();
        assert_eq!(Config::load(Some(&bad)), Config::default());

        let missing = dir.path().join("missing.toml");
        assert_eq!(Config::load(Some(&missing)), Config::default());
        assert!(!missing.exists());
    }
}
