//! Storefront configuration module.
//!
//! Handles loading, validating, and merging `carlot.toml`. User values are
//! overlaid on the stock defaults, so a config file only needs the keys it
//! changes. A missing file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! app_id = "carlot-local"     # Namespaces the listings collection
//!
//! [intake]
//! max_width = 800             # Uploaded images are fit inside this box
//! max_height = 600
//! quality = 70                # JPEG quality (1-100)
//!
//! [store]
//! path = "carlot-store.json"  # JSON file backing the document store ("" = memory only)
//!
//! [storefront]
//! title = "Car Retail Shop"
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//!
//! [[admin.accounts]]
//! email = "admin@example.com"
//! password_sha256 = "…"       # Output of `carlot hash-password`
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Bounds, CompressParams, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "carlot.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `carlot.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CarlotConfig {
    /// Application id; listings live under `artifacts/{app_id}/public/data/cars`.
    pub app_id: String,
    /// Upload compression settings.
    pub intake: IntakeConfig,
    /// Document store backing file.
    pub store: StoreConfig,
    /// Static storefront page settings.
    pub storefront: StorefrontConfig,
    /// Administrator accounts.
    pub admin: AdminConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for CarlotConfig {
    fn default() -> Self {
        Self {
            app_id: "carlot-local".to_string(),
            intake: IntakeConfig::default(),
            store: StoreConfig::default(),
            storefront: StorefrontConfig::default(),
            admin: AdminConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl CarlotConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() || self.app_id.contains('/') {
            return Err(ConfigError::Validation(
                "app_id must be non-empty and must not contain '/'".into(),
            ));
        }
        if self.intake.quality == 0 || self.intake.quality > 100 {
            return Err(ConfigError::Validation(
                "intake.quality must be 1-100".into(),
            ));
        }
        if self.intake.max_width == 0 || self.intake.max_height == 0 {
            return Err(ConfigError::Validation(
                "intake.max_width and intake.max_height must be non-zero".into(),
            ));
        }
        for account in &self.admin.accounts {
            if !account.email.contains('@') {
                return Err(ConfigError::Validation(format!(
                    "admin account email {:?} is not an email address",
                    account.email
                )));
            }
            let digest = &account.password_sha256;
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Validation(format!(
                    "admin account {}: password_sha256 must be 64 hex characters",
                    account.email
                )));
            }
        }
        Ok(())
    }

    /// The listings collection for this app.
    pub fn collection(&self) -> String {
        crate::store::collection_path(&self.app_id)
    }

    /// Compression parameters for the intake pipeline.
    pub fn compress_params(&self) -> CompressParams {
        CompressParams {
            bounds: Bounds {
                max_width: self.intake.max_width,
                max_height: self.intake.max_height,
            },
            quality: Quality::new(self.intake.quality),
        }
    }

    /// Store file resolved against the config file's directory, or `None`
    /// for a memory-only store.
    pub fn store_path(&self, config_dir: &Path) -> Option<PathBuf> {
        let path = self.store.path.trim();
        if path.is_empty() {
            return None;
        }
        let path = Path::new(path);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        })
    }
}

/// Upload compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality (1-100).
    pub quality: u32,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        let params = CompressParams::default();
        Self {
            max_width: params.bounds.max_width,
            max_height: params.bounds.max_height,
            quality: u32::from(params.quality.value()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// JSON file holding all collections. Empty means memory only.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "carlot-store.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorefrontConfig {
    /// Page title and header.
    pub title: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            title: "Car Retail Shop".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub accounts: Vec<AdminAccount>,
}

/// One administrator login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminAccount {
    pub email: String,
    /// Hex SHA-256 from [`hash_password`](crate::auth::hash_password).
    pub password_sha256: String,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image compression workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(CarlotConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so
///   `[[admin.accounts]]` in a user file replaces the whole list.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CarlotConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CarlotConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<CarlotConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    if overlay.is_none() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `carlot.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# carlot configuration
# ====================
# All options are optional. Values shown are the defaults.
# Unknown keys are rejected.

# Application id. Listings are stored in the collection
# artifacts/{app_id}/public/data/cars.
app_id = "carlot-local"

# ---------------------------------------------------------------------------
# Image intake
# ---------------------------------------------------------------------------
[intake]
# Uploaded images are scaled down (never up) to fit inside this box,
# keeping their aspect ratio.
max_width = 800
max_height = 600

# JPEG quality for re-encoded uploads (1-100).
quality = 70

# ---------------------------------------------------------------------------
# Document store
# ---------------------------------------------------------------------------
[store]
# JSON file holding all listings, relative to this config file.
# Set to "" to keep everything in memory.
path = "carlot-store.json"

# ---------------------------------------------------------------------------
# Storefront page
# ---------------------------------------------------------------------------
[storefront]
title = "Car Retail Shop"

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel compression workers.
# Omit to use all CPU cores. Larger values are clamped to the core count.
# max_processes = 4

# ---------------------------------------------------------------------------
# Administrators
# ---------------------------------------------------------------------------
# One table per account. Generate the digest with:
#   carlot hash-password <email> <password>
#
# [[admin.accounts]]
# email = "admin@example.com"
# password_sha256 = "<64 hex characters>"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, content: &str) -> PathBuf {
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn default_config_values() {
        let config = CarlotConfig::default();
        assert_eq!(config.app_id, "carlot-local");
        assert_eq!(config.intake.max_width, 800);
        assert_eq!(config.intake.max_height, 600);
        assert_eq!(config.intake.quality, 70);
        assert_eq!(config.store.path, "carlot-store.json");
        assert!(config.admin.accounts.is_empty());
    }

    #[test]
    fn collection_uses_app_id() {
        let config = CarlotConfig {
            app_id: "shop-1".into(),
            ..Default::default()
        };
        assert_eq!(config.collection(), "artifacts/shop-1/public/data/cars");
    }

    #[test]
    fn compress_params_follow_intake_section() {
        let mut config = CarlotConfig::default();
        config.intake.max_width = 1024;
        config.intake.quality = 85;
        let params = config.compress_params();
        assert_eq!(params.bounds.max_width, 1024);
        assert_eq!(params.bounds.max_height, 600);
        assert_eq!(params.quality.value(), 85);
    }

    #[test]
    fn parse_partial_config() {
        let config: CarlotConfig = toml::from_str(
            r#"
[intake]
quality = 60
"#,
        )
        .unwrap();
        assert_eq!(config.intake.quality, 60);
        assert_eq!(config.intake.max_width, 800);
        assert_eq!(config.app_id, "carlot-local");
    }

    #[test]
    fn parse_admin_accounts() {
        let digest = hash_password("a@b.c", "pw");
        let config: CarlotConfig = toml::from_str(&format!(
            r#"
[[admin.accounts]]
email = "a@b.c"
password_sha256 = "{digest}"
"#
        ))
        .unwrap();
        assert_eq!(config.admin.accounts.len(), 1);
        assert_eq!(config.admin.accounts[0].password_sha256, digest);
        config.validate().unwrap();
    }

    // =========================================================================
    // store_path
    // =========================================================================

    #[test]
    fn store_path_is_relative_to_config_dir() {
        let config = CarlotConfig::default();
        assert_eq!(
            config.store_path(Path::new("/srv/shop")),
            Some(PathBuf::from("/srv/shop/carlot-store.json"))
        );
    }

    #[test]
    fn empty_store_path_means_memory_only() {
        let mut config = CarlotConfig::default();
        config.store.path = "  ".into();
        assert_eq!(config.store_path(Path::new("/srv")), None);
    }

    #[test]
    fn absolute_store_path_is_kept() {
        let mut config = CarlotConfig::default();
        config.store.path = "/var/lib/carlot/store.json".into();
        assert_eq!(
            config.store_path(Path::new("/srv")),
            Some(PathBuf::from("/var/lib/carlot/store.json"))
        );
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.intake.quality, 70);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
app_id = "lot-7"

[storefront]
title = "Lot Seven"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.app_id, "lot-7");
        assert_eq!(config.storefront.title, "Lot Seven");
        assert_eq!(config.store.path, "carlot-store.json");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "this is not valid toml [[[");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[intake]
quality = 0
"#,
        );
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[intake]
qualty = 80
"#,
        );
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<CarlotConfig, _> = toml::from_str(
            r##"
[colors]
background = "#fff"
"##,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_account_key_rejected() {
        let result: Result<CarlotConfig, _> = toml::from_str(
            r#"
[[admin.accounts]]
email = "a@b.c"
password = "plaintext"
"#,
        );
        assert!(result.is_err());
    }

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        CarlotConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_quality_boundaries() {
        let mut config = CarlotConfig::default();
        config.intake.quality = 100;
        assert!(config.validate().is_ok());
        config.intake.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_bounds() {
        let mut config = CarlotConfig::default();
        config.intake.max_height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_app_id_with_slash() {
        let config = CarlotConfig {
            app_id: "a/b".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bad_digest() {
        let mut config = CarlotConfig::default();
        config.admin.accounts.push(AdminAccount {
            email: "a@b.c".into(),
            password_sha256: "not-a-digest".into(),
        });
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // processing
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 64),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_never_zero() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[intake]\nquality = 55").unwrap();
        let merged = merge_toml(base, overlay);
        let intake = merged.get("intake").unwrap();
        assert_eq!(intake.get("quality").unwrap().as_integer(), Some(55));
        assert_eq!(intake.get("max_width").unwrap().as_integer(), Some(800));
    }

    #[test]
    fn merge_toml_replaces_arrays() {
        let base: toml::Value = toml::from_str("xs = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("xs = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("xs").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("app_id = \"\"").unwrap();
        assert!(matches!(
            resolve_config(base, Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // stock_config_toml
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: CarlotConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.app_id, "carlot-local");
        assert_eq!(config.intake.max_width, 800);
        assert_eq!(config.intake.quality, 70);
        assert_eq!(config.store.path, "carlot-store.json");
        assert_eq!(config.storefront.title, "Car Retail Shop");
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[intake]", "[store]", "[storefront]", "[processing]", "[[admin.accounts]]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        for key in ["app_id", "intake", "store", "storefront", "admin", "processing"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
