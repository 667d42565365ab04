use anyhow::Context;
use roombot_core::config::ClientConfig;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<ClientConfig> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: ClientConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        Ok(cfg)
    }

    /// Loads the file, or the defaults when it does not exist yet.
    pub fn load_or_default(&self) -> anyhow::Result<ClientConfig> {
        if !self.path.exists() {
            log::info!(
                "no config at {}, using defaults",
                self.path.display()
            );
            return Ok(crate::defaults::default_client_config());
        }
        self.load()
    }

    pub fn save(&self, cfg: &ClientConfig) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(cfg).context("encode config JSON")?;
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create config directory: {}", parent.display()))?;

        // Write a sibling temp file, then rename it over the target.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("create temp file in {}", parent.display()))?;
        tmp.write_all(&json)
            .with_context(|| format!("write temp: {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .map_err(|e| anyhow::Error::new(e.error))
            .with_context(|| format!("replace file: {}", self.path.display()))?;
        Ok(())
    }
}
