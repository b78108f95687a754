use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub mod themes;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "MdNotes";
const APP_NAME: &str = "mdnotes";

pub const DEFAULT_MOBILE_BREAKPOINT_PX: u32 = 768;
pub const DEFAULT_CELL_WIDTH_PX: u32 = 8;
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 5;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("MDNOTES_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("MDNOTES_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_dir.join("notes.db");

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            database_path,
        })
    }

    /// Paths rooted under a single directory; used by tests and portable installs.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        Self {
            config_file: config_dir.join("config.toml"),
            database_path: data_dir.join("notes.db"),
            config_dir,
            data_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds a status notification stays visible.
    pub notification_ttl_secs: u64,
    pub layout: LayoutOptions,
    pub storage: StorageOptions,
    pub preview: PreviewOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notification_ttl_secs: DEFAULT_NOTIFICATION_TTL_SECS,
            layout: LayoutOptions::default(),
            storage: StorageOptions::default(),
            preview: PreviewOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.layout.cell_width_px == 0 {
            tracing::warn!("layout.cell_width_px must be positive, falling back to default");
            self.layout.cell_width_px = DEFAULT_CELL_WIDTH_PX;
        }
        if self.layout.mobile_breakpoint_px == 0 {
            tracing::warn!("layout.mobile_breakpoint_px must be positive, falling back to default");
            self.layout.mobile_breakpoint_px = DEFAULT_MOBILE_BREAKPOINT_PX;
        }
        if self.storage.quota_bytes == 0 {
            tracing::warn!("storage.quota_bytes must be positive, falling back to default");
            self.storage.quota_bytes = DEFAULT_QUOTA_BYTES;
        }
        if self.notification_ttl_secs == 0 {
            tracing::warn!("notification_ttl_secs must be positive, falling back to default");
            self.notification_ttl_secs = DEFAULT_NOTIFICATION_TTL_SECS;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Logical widths strictly below this are laid out as a single pane.
    pub mobile_breakpoint_px: u32,
    /// Logical pixels per terminal column.
    pub cell_width_px: u32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            mobile_breakpoint_px: DEFAULT_MOBILE_BREAKPOINT_PX,
            cell_width_px: DEFAULT_CELL_WIDTH_PX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
    /// Upper bound on the summed size of all stored keys and values.
    pub quota_bytes: u64,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewOptions {
    pub tables: bool,
    pub strikethrough: bool,
    pub tasklists: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            tasklists: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_default_config() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted_at(temp.path()));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.layout.mobile_breakpoint_px, 768);
        assert_eq!(cfg.storage.database_path, loader.paths().database_path);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.notification_ttl_secs, cfg.notification_ttl_secs);
        assert_eq!(reloaded.storage.quota_bytes, DEFAULT_QUOTA_BYTES);
        Ok(())
    }

    #[test]
    fn zero_values_fall_back_to_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "notification_ttl_secs = 0\n\n[layout]\nmobile_breakpoint_px = 0\ncell_width_px = 0\n\n[storage]\nquota_bytes = 0\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.layout.mobile_breakpoint_px, DEFAULT_MOBILE_BREAKPOINT_PX);
        assert_eq!(cfg.layout.cell_width_px, DEFAULT_CELL_WIDTH_PX);
        assert_eq!(cfg.storage.quota_bytes, DEFAULT_QUOTA_BYTES);
        assert_eq!(cfg.notification_ttl_secs, DEFAULT_NOTIFICATION_TTL_SECS);
        assert!(cfg.preview.tables);
        Ok(())
    }
}
