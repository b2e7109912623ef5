use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const TOKEN_FILE: &str = "token";

/// Persisted bearer token, shared by every page that needs credentials.
pub trait TokenStorage {
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, token: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// File-backed store: one token string in `<data dir>/token`.
#[derive(Debug)]
pub struct TokenStore {
    pub data_dir: PathBuf,
    pub token_path: PathBuf,
}

impl TokenStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let token_path = data_dir.join(TOKEN_FILE);
        info!(
            data_dir = %data_dir.display(),
            token = %token_path.display(),
            "opened token store"
        );

        Ok(Self {
            data_dir,
            token_path,
        })
    }
}

impl TokenStorage for TokenStore {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> anyhow::Result<Option<String>> {
        if !self.token_path.exists() {
            debug!("no token file");
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.token_path)
            .with_context(|| format!("failed reading {}", self.token_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    #[tracing::instrument(skip(self, token))]
    fn save(&self, token: &str) -> anyhow::Result<()> {
        debug!(file = %self.token_path.display(), "persisting token atomically");
        let dir = self.token_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(token.trim().as_bytes())?;
        temp.flush()?;
        temp.persist(&self.token_path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.token_path.display(), err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn clear(&self) -> anyhow::Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)
                .with_context(|| format!("failed removing {}", self.token_path.display()))?;
            info!("cleared stored token");
        }
        Ok(())
    }
}

/// In-process store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|_| anyhow!("token store lock poisoned"))
    }
}

impl TokenStorage for MemoryTokenStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        *self.slot()? = Some(token.trim().to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}
