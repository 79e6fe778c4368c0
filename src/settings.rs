use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::DB_FILE;
use crate::error::{Result, TallyError};
use crate::registry::BankRegistry;

pub const REGISTRY_FILE: &str = "banks.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Bank registry to load instead of `<data_dir>/banks.toml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            registry_path: None,
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join(DB_FILE)
    }

    pub fn registry_file(&self) -> PathBuf {
        match &self.registry_path {
            Some(path) => PathBuf::from(shellexpand_path(path)),
            None => self.data_path().join(REGISTRY_FILE),
        }
    }

    /// The configured registry file, or the built-in banks when none exists
    /// yet. A file that exists but fails to load is an error.
    pub fn load_registry(&self) -> Result<BankRegistry> {
        let path = self.registry_file();
        if path.exists() {
            BankRegistry::load(&path)
        } else if self.registry_path.is_some() {
            Err(TallyError::Config(format!("registry not found: {}", path.display())))
        } else {
            BankRegistry::builtin()
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mailtally")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("mailtally")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
        Settings::default()
    })
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TallyError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    let path = PathBuf::from(path);
    let resolved = match std::fs::canonicalize(&path) {
        Ok(p) => p,
        Err(_) if path.is_relative() => std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path),
        Err(_) => path,
    };
    resolved.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            registry_path: Some("/tmp/banks.toml".to_string()),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_registry_path_is_optional() {
        let s: Settings = serde_json::from_str(r#"{"data_dir": "/tmp/test"}"#).unwrap();
        assert!(s.registry_path.is_none());
        assert_eq!(s.registry_file(), PathBuf::from("/tmp/test").join(REGISTRY_FILE));
        assert_eq!(s.db_path(), PathBuf::from("/tmp/test").join(DB_FILE));
        assert!(!serde_json::to_string(&s).unwrap().contains("registry_path"));
    }

    #[test]
    fn test_shellexpand_makes_missing_relative_path_absolute() {
        let expanded = PathBuf::from(shellexpand_path("not-created-yet/ledger"));
        assert!(expanded.is_absolute());
        assert!(expanded.ends_with("not-created-yet/ledger"));
        assert!(!expanded.exists());

        assert_eq!(shellexpand_path("/no/such/dir"), "/no/such/dir");
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.data_dir.ends_with("mailtally"));
        assert!(s.registry_path.is_none());
    }

    #[test]
    fn test_load_registry_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings {
            data_dir: dir.path().to_string_lossy().to_string(),
            registry_path: None,
        };
        assert_eq!(s.load_registry().unwrap().banks().len(), 5);
    }

    #[test]
    fn test_load_registry_reads_data_dir_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(REGISTRY_FILE),
            "[[bank]]\nid = \"solo\"\nsender = \"a@b.c\"\nkeywords = [\"x\"]\n[bank.regex]\namount = '(\\d+\\.\\d{2})'\ndescription = { label = \"Store\" }\n",
        )
        .unwrap();
        let s = Settings {
            data_dir: dir.path().to_string_lossy().to_string(),
            registry_path: None,
        };
        let reg = s.load_registry().unwrap();
        assert_eq!(reg.banks().len(), 1);
        assert!(reg.get("solo").is_some());
    }

    #[test]
    fn test_missing_explicit_registry_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings {
            data_dir: dir.path().to_string_lossy().to_string(),
            registry_path: Some(dir.path().join("nope.toml").to_string_lossy().to_string()),
        };
        assert!(matches!(s.load_registry(), Err(TallyError::Config(_))));
    }
}
