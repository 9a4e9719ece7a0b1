use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Move to the system trash.
    Trash,
    /// Move under `quarantine_path`.
    Quarantine,
    /// Remove permanently.
    Erase,
}

/// Name matching rules used for the deny lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub literal: Vec<String>,
    pub insensitive: Vec<String>,
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapConfig {
    pub extensions: Vec<String>,
    pub names: Vec<String>,
}

impl Default for ScrapConfig {
    fn default() -> Self {
        Self {
            extensions: ["txt", "ini", "url", "lnk", "db", "tmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            names: ["Thumbs.db", ".DS_Store", "desktop.ini"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Minimum quality for one classification type. Zero disables a check.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_file_size: u64,
    pub min_resolution: u64,
    pub min_long_side: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PHashConfig {
    /// Candidates must be strictly below this p_hash distance.
    pub threshold: u32,
    pub exact_threshold: u32,
    pub d_hash_exact_threshold: u32,
    pub ratio_epsilon: f64,
    /// Skip candidates from the same directory and the global write lock.
    pub ignore_same_dir: bool,
    /// Incoming pixels below `resolution_ratio * stored pixels` is a rejection.
    pub resolution_ratio: f64,
    /// Incoming bytes below `file_size_ratio * stored bytes` is a rejection.
    pub file_size_ratio: f64,
}

impl Default for PHashConfig {
    fn default() -> Self {
        Self {
            threshold: 11,
            exact_threshold: 4,
            d_hash_exact_threshold: 4,
            ratio_epsilon: 0.05,
            ignore_same_dir: false,
            resolution_ratio: 1.0,
            file_size_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatisticConfig {
    pub mean_threshold: f64,
    pub entropy_threshold: f64,
}

impl Default for StatisticConfig {
    fn default() -> Self {
        Self {
            mean_threshold: 8.0,
            entropy_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub poll_interval_ms: u64,
    pub max_retries: u32,
    pub force: bool,
    pub stale_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_retries: 600,
            force: false,
            stale_ms: 600_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub busy_retries: u32,
    pub busy_delay_ms: u64,
    pub gone_poll_retries: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            busy_retries: 100,
            busy_delay_ms: 100,
            gone_poll_retries: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_paths: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub db_base_path: PathBuf,
    pub library_path: PathBuf,
    pub keeping_path: PathBuf,
    pub quarantine_path: PathBuf,
    pub max_workers: usize,
    pub dry_run: bool,
    pub relocate: bool,
    pub keep: bool,
    pub transfer: bool,
    pub recovery: bool,
    pub manual: bool,
    pub instant_delete: bool,
    pub delete_mode: DeleteMode,
    pub cache: bool,
    pub ng_file_name: PatternConfig,
    pub ng_dir_path: PatternConfig,
    pub scrap: ScrapConfig,
    pub image: QualityConfig,
    pub video: QualityConfig,
    pub p_hash: PHashConfig,
    pub statistic: StatisticConfig,
    pub lock: LockConfig,
    pub fs: FsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            ignore_patterns: Vec::new(),
            db_base_path: PathBuf::from("./db"),
            library_path: PathBuf::from("./library"),
            keeping_path: PathBuf::from("./keeping"),
            quarantine_path: PathBuf::from("./quarantine"),
            max_workers: 4,
            dry_run: false,
            relocate: false,
            keep: false,
            transfer: true,
            recovery: false,
            manual: false,
            instant_delete: true,
            delete_mode: DeleteMode::Trash,
            cache: true,
            ng_file_name: PatternConfig::default(),
            ng_dir_path: PatternConfig::default(),
            scrap: ScrapConfig::default(),
            image: QualityConfig {
                min_file_size: 10 * 1024,
                min_resolution: 256 * 256,
                min_long_side: 320,
            },
            video: QualityConfig {
                min_file_size: 1024 * 1024,
                min_resolution: 320 * 240,
                min_long_side: 320,
            },
            p_hash: PHashConfig::default(),
            statistic: StatisticConfig::default(),
            lock: LockConfig::default(),
            fs: FsConfig::default(),
        }
    }
}

/// Load `Config.toml` (optional) layered under `DEDUPPER__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("Config", false)
}

pub fn load_configuration_from(name: &str, required: bool) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(required))
        .add_source(environment())
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// `DEDUPPER__MAX_WORKERS`, `DEDUPPER__P_HASH__THRESHOLD`, ...
fn environment() -> Environment {
    Environment::with_prefix("DEDUPPER")
        .prefix_separator("__")
        .separator("__")
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        let dir_path: &Path = &dir;
        if result.iter().any(|res_dir| dir_path.starts_with(res_dir)) {
            continue;
        }
        result.retain(|res_dir| !res_dir.starts_with(dir_path));
        result.push(dir);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = vec![
            PathBuf::from("/home/user"),
            PathBuf::from("/home/user/photos"),
            PathBuf::from("/var/data"),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&PathBuf::from("/home/user")));
        assert!(result.contains(&PathBuf::from("/var/data")));
    }

    #[test]
    fn test_non_overlapping_parent_after_child() {
        let dirs = vec![PathBuf::from("/a/b"), PathBuf::from("/a")];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result, vec![PathBuf::from("/a")]);
    }

    #[test]
    fn test_non_overlapping_parent_after_several_children() {
        let dirs = vec![
            PathBuf::from("/a/b"),
            PathBuf::from("/a/c"),
            PathBuf::from("/x"),
            PathBuf::from("/a"),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result, vec![PathBuf::from("/x"), PathBuf::from("/a")]);
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        let vars: config::Map<String, String> = [
            ("DEDUPPER__MAX_WORKERS", "8"),
            ("DEDUPPER__P_HASH__THRESHOLD", "7"),
            ("DEDUPPER_MAX_WORKERS", "99"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = Config::builder()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap();
        let app: AppConfig = config.try_deserialize().unwrap();
        assert_eq!(app.max_workers, 8);
        assert_eq!(app.p_hash.threshold, 7);
    }

    #[test]
    fn test_defaults_deserialize_from_empty_source() {
        let config = Config::builder().build().unwrap();
        let app: AppConfig = config.try_deserialize().unwrap();
        assert_eq!(app.max_workers, 4);
        assert_eq!(app.delete_mode, DeleteMode::Trash);
        assert_eq!(app.p_hash.threshold, 11);
    }
}
