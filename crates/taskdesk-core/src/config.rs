use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use reqwest::Url;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

pub const DEFAULT_BASE_URL: &str =
  "http://localhost:8080";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 =
  30;

const CONFIG_ENV: &str =
  "TASKDESK_CONFIG";
const API_URL_ENV: &str =
  "TASKDESK_API_URL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
  pub base_url:     String,
  pub timeout_secs: u64
}

impl Default for ApiSection {
  fn default() -> Self {
    Self {
      base_url:     DEFAULT_BASE_URL
        .to_string(),
      timeout_secs:
        DEFAULT_TIMEOUT_SECS
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListSection {
  pub page_size: u32
}

impl Default for ListSection {
  fn default() -> Self {
    Self {
      page_size: DEFAULT_PAGE_SIZE
    }
  }
}

#[derive(
  Debug, Clone, Default, Deserialize,
)]
#[serde(default)]
pub struct DataSection {
  pub location: Option<PathBuf>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSection {
  pub color: bool
}

impl Default for UiSection {
  fn default() -> Self {
    Self {
      color: true
    }
  }
}

#[derive(
  Debug, Clone, Default, Deserialize,
)]
#[serde(default)]
pub struct Config {
  pub api:          ApiSection,
  pub list:         ListSection,
  pub data:         DataSection,
  pub ui:           UiSection,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override
    );

    let mut cfg = match path {
      | Some(path) if path.is_file() => {
        info!(config = %path.display(), "loading config");
        let mut cfg =
          Self::from_file(&path)?;
        cfg.loaded_files.push(path);
        cfg
      }
      | Some(path) => {
        warn!(
          config = %path.display(),
          "config file not found; \
           using defaults"
        );
        Self::default()
      }
      | None => {
        warn!(
          "no config location; using \
           defaults"
        );
        Self::default()
      }
    };

    if let Ok(url) =
      std::env::var(API_URL_ENV)
      && !url.trim().is_empty()
    {
      debug!(url = %url, "api url taken from environment");
      cfg.api.base_url =
        url.trim().to_string();
    }

    Ok(cfg)
  }

  #[tracing::instrument]
  pub fn from_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    Self::parse(&text).with_context(
      || {
        format!(
          "failed to parse TOML {}",
          path.display()
        )
      }
    )
  }

  pub fn parse(
    text: &str
  ) -> anyhow::Result<Self> {
    let cfg: Config =
      toml::from_str(text)
        .map_err(anyhow::Error::new)?;
    cfg.validate()?;
    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      self.set(key.trim(), value.trim())?;
    }
    self.validate()
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key {
      | "api.base_url" => {
        self.api.base_url =
          value.to_string();
      }
      | "api.timeout_secs" => {
        self.api.timeout_secs = value
          .parse()
          .with_context(|| {
            format!(
              "api.timeout_secs must \
               be a number, got \
               {value}"
            )
          })?;
      }
      | "list.page_size" => {
        self.list.page_size = value
          .parse()
          .with_context(|| {
            format!(
              "list.page_size must be \
               a number, got {value}"
            )
          })?;
      }
      | "data.location" => {
        self.data.location =
          Some(PathBuf::from(value));
      }
      | "ui.color" => {
        self.ui.color =
          parse_bool(value);
      }
      | other => {
        return Err(anyhow!(
          "unknown config key: {other}"
        ));
      }
    }
    Ok(())
  }

  fn validate(
    &self
  ) -> anyhow::Result<()> {
    self.base_url()?;
    if self.list.page_size == 0 {
      return Err(anyhow!(
        "list.page_size must be \
         greater than zero"
      ));
    }
    Ok(())
  }

  pub fn base_url(
    &self
  ) -> anyhow::Result<Url> {
    Url::parse(&self.api.base_url)
      .with_context(|| {
        format!(
          "api.base_url is not a \
           valid URL: {}",
          self.api.base_url
        )
      })
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(
      self.api.timeout_secs
    )
  }

  pub fn page_size(&self) -> u32 {
    self.list.page_size
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(location) =
    cfg.data.location.as_deref()
  {
    expand_tilde(location)
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(expand_tilde(path));
  }

  if let Ok(path) =
    std::env::var(CONFIG_ENV)
  {
    let trimmed = path.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir
      .join("taskdesk")
      .join("config.toml")
  })
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let base = dirs::data_dir()
    .or_else(dirs::home_dir)
    .ok_or_else(|| {
      anyhow!(
        "cannot determine data \
         directory"
      )
    })?;
  Ok(base.join("taskdesk"))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
