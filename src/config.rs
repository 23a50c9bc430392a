use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".dmarcwatch_config.json";

/// Persisted settings. Unknown keys survive a load/save round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `~/.dmarcwatch_config.json`, or the current directory if there is no home.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

/// The JSON config file plus its in-memory contents.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Load `path`. A missing file is an empty config; an unreadable or
    /// malformed one is too, with a warning.
    pub fn load(path: PathBuf) -> Self {
        let config = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring malformed config");
                Config::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Could not read config");
                Config::default()
            }
        };
        Self { path, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_model(&self) -> Option<&str> {
        self.config.default_model.as_deref()
    }

    /// Remember `model` and write the file. Write failures are warnings.
    pub fn set_default_model(&mut self, model: &str) {
        self.config.default_model = Some(model.to_string());
        if let Err(err) = self.save() {
            tracing::warn!(path = %self.path.display(), error = %err, "Could not save config");
        }
    }

    fn save(&self) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.path, text + "\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::load(tmp.path().join("cfg.json"));
        assert_eq!(store.default_model(), None);
    }

    #[test]
    fn malformed_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cfg.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ConfigStore::load(path).default_model(), None);
    }

    #[test]
    fn default_model_persists_and_keeps_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cfg.json");
        fs::write(&path, r#"{"default_model": "old", "theme": "dark"}"#).unwrap();

        let mut store = ConfigStore::load(path.clone());
        assert_eq!(store.default_model(), Some("old"));
        store.set_default_model("llama3:8b");

        let reloaded = ConfigStore::load(path.clone());
        assert_eq!(reloaded.default_model(), Some("llama3:8b"));
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[test]
    fn save_failure_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut store = ConfigStore::load(tmp.path().join("missing-dir").join("cfg.json"));
        store.set_default_model("m");
        assert_eq!(store.default_model(), Some("m"));
    }
}
