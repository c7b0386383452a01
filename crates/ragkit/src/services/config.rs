use super::types::RagkitConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

/// Locates the ragkit config file and merges it with defaults and `RAGKIT_*`
/// environment overrides. Command-line `--host`/`--port` are applied by the
/// caller on top of what `load` returns.
pub struct ConfigService {
    config_path: PathBuf,
}

impl ConfigService {
    /// The per-project file, `<project_root>/.ragkit/config.toml`
    pub fn new(project_root: &Path) -> Self {
        let config_path = project_root.join(".ragkit").join("config.toml");
        Self { config_path }
    }

    /// A file named with `--config`; it need not exist yet
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Write the built-in defaults, replacing any existing file
    pub fn init(&self) -> Result<RagkitConfig> {
        let config = RagkitConfig::default();
        self.save(&config)?;
        Ok(config)
    }

    /// Defaults, then the file if present, then `RAGKIT_SECTION__KEY` variables.
    /// Rejects ingest settings the pipeline cannot run with.
    pub fn load(&self) -> Result<RagkitConfig> {
        let mut figment = Figment::from(Serialized::defaults(RagkitConfig::default()));

        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        figment = figment.merge(Env::prefixed("RAGKIT_").split("__"));

        let config: RagkitConfig = figment.extract().context("Failed to load configuration")?;
        config
            .ingest
            .validate()
            .context("Invalid [ingest] settings")?;
        Ok(config)
    }

    /// Render as TOML, creating `.ragkit/` when missing
    pub fn save(&self, config: &RagkitConfig) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        std::fs::write(&self.config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path());
        service.init().unwrap();

        assert!(service.exists());
        assert!(temp_dir.path().join(".ragkit/config.toml").exists());
    }

    #[test]
    fn load_without_init_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path());
        let config = service.load().unwrap();
        assert_eq!(config.ingest.max_chunk_size_tokens, 512);
        assert_eq!(config.ingest.chunk_overlap_tokens, 64);
        assert_eq!(config.math.url, "http://localhost:8080");
    }

    #[test]
    fn load_returns_saved_config() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path());
        let mut config = service.init().unwrap();
        config.models.chat = Some("llama3.2:3b".to_string());
        config.search.max_results = 5;
        service.save(&config).unwrap();

        let loaded = service.load().unwrap();
        assert_eq!(loaded.models.chat.as_deref(), Some("llama3.2:3b"));
        assert_eq!(loaded.search.max_results, 5);
    }

    #[test]
    fn explicit_path_is_used() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[server]\nhost = \"stack.internal\"\nport = 9000\n").unwrap();

        let service = ConfigService::with_path(&path);
        let config = service.load().unwrap();
        assert_eq!(config.server.base_url(), "http://stack.internal:9000");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[ingest]\nmax_chunk_size_tokens = \"lots\"\n").unwrap();

        assert!(ConfigService::with_path(&path).load().is_err());
    }

    #[test]
    fn zero_poll_interval_fails_to_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("busy.toml");
        std::fs::write(&path, "[ingest]\npoll_interval_ms = 0\n").unwrap();

        let err = ConfigService::with_path(&path).load().unwrap_err();
        assert!(format!("{:#}", err).contains("poll_interval_ms must be greater than zero"));
    }

    #[test]
    fn exists_returns_false_before_init() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path());
        assert!(!service.exists());
    }
}
