use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::catalog::default_exclusions;
use crate::ros::RosFlavor;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_dir: PathBuf,
    pub state_path: PathBuf,
    pub excluded_topics: HashSet<String>,
    pub flavor: RosFlavor,
    pub stop_timeout: Duration,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let base_dir = env::var("BAG_RECORDER_HOME")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::cache_dir()
                    .unwrap_or_else(env::temp_dir)
                    .join("bag_recorder")
            });
        let cwd = env::current_dir().context("failed to resolve working directory")?;
        let state_path = state_path_for(&base_dir, &cwd);
        let excluded_topics = env::var("BAG_RECORDER_EXCLUDE")
            .map(|value| parse_topic_list(&value))
            .unwrap_or_else(|_| default_exclusions());
        let flavor = RosFlavor::from_version(env::var("ROS_VERSION").ok().as_deref());
        let stop_timeout = Duration::from_secs(env_u64("BAG_RECORDER_STOP_TIMEOUT", 5).max(1));

        let config = Self {
            base_dir,
            state_path,
            excluded_topics,
            flavor,
            stop_timeout,
        };
        config.ensure_layout()?;
        Ok(config)
    }

    pub fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("failed to create {}", self.base_dir.display()))?;
        Ok(())
    }
}

/// Each working directory keeps its own remembered selection.
fn state_path_for(base_dir: &Path, cwd: &Path) -> PathBuf {
    let digest = format!("{:x}", Sha256::digest(cwd.to_string_lossy().as_bytes()));
    base_dir.join(format!("{}.json", &digest[..32]))
}

fn parse_topic_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, OnceLock};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::{env_u64, parse_topic_list, state_path_for, AppConfig};
    use crate::catalog::default_exclusions;
    use crate::ros::RosFlavor;

    #[test]
    fn state_path_is_stable_per_directory() {
        let base = Path::new("/tmp/bag_recorder");
        let first = state_path_for(base, Path::new("/home/robot/logs"));
        let second = state_path_for(base, Path::new("/home/robot/logs"));
        let other = state_path_for(base, Path::new("/home/robot/other"));

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.parent(), Some(base));
        let name = first
            .file_name()
            .and_then(|value| value.to_str())
            .expect("state file name should be utf-8");
        assert_eq!(name.len(), 32 + ".json".len());
    }

    #[test]
    fn parse_topic_list_trims_and_skips_blanks() {
        let topics = parse_topic_list(" /rosout , ,/tf_static,");
        assert_eq!(topics.len(), 2);
        assert!(topics.contains("/rosout"));
        assert!(topics.contains("/tf_static"));
    }

    #[test]
    fn env_u64_uses_default_for_invalid_values() {
        let _guard = env_lock().lock().expect("failed to acquire env lock");
        let old = std::env::var("BAG_RECORDER_TEST_ENV_U64").ok();
        std::env::set_var("BAG_RECORDER_TEST_ENV_U64", "not-a-number");

        let parsed = env_u64("BAG_RECORDER_TEST_ENV_U64", 42);
        assert_eq!(parsed, 42);

        restore_env("BAG_RECORDER_TEST_ENV_U64", old);
    }

    #[test]
    fn app_config_load_uses_env_and_creates_layout() {
        let _guard = env_lock().lock().expect("failed to acquire env lock");
        let base = temp_dir("config-load");

        let old_home = std::env::var("BAG_RECORDER_HOME").ok();
        let old_exclude = std::env::var("BAG_RECORDER_EXCLUDE").ok();
        let old_timeout = std::env::var("BAG_RECORDER_STOP_TIMEOUT").ok();
        let old_version = std::env::var("ROS_VERSION").ok();

        std::env::set_var("BAG_RECORDER_HOME", &base);
        std::env::set_var("BAG_RECORDER_EXCLUDE", "/diagnostics");
        std::env::set_var("BAG_RECORDER_STOP_TIMEOUT", "0");
        std::env::set_var("ROS_VERSION", "2");

        let config = AppConfig::load().expect("expected config load to succeed");
        assert_eq!(config.base_dir, base);
        assert_eq!(config.state_path.parent(), Some(base.as_path()));
        assert_eq!(config.excluded_topics.len(), 1);
        assert!(config.excluded_topics.contains("/diagnostics"));
        assert_eq!(config.stop_timeout, Duration::from_secs(1));
        assert_eq!(config.flavor, RosFlavor::ros2());
        assert!(config.base_dir.exists(), "base directory should be created");

        let _ = fs::remove_dir_all(&base);
        restore_env("BAG_RECORDER_HOME", old_home);
        restore_env("BAG_RECORDER_EXCLUDE", old_exclude);
        restore_env("BAG_RECORDER_STOP_TIMEOUT", old_timeout);
        restore_env("ROS_VERSION", old_version);
    }

    #[test]
    fn app_config_defaults_to_ros1_and_builtin_exclusions() {
        let _guard = env_lock().lock().expect("failed to acquire env lock");
        let base = temp_dir("config-defaults");

        let old_home = std::env::var("BAG_RECORDER_HOME").ok();
        let old_exclude = std::env::var("BAG_RECORDER_EXCLUDE").ok();
        let old_timeout = std::env::var("BAG_RECORDER_STOP_TIMEOUT").ok();
        let old_version = std::env::var("ROS_VERSION").ok();

        std::env::set_var("BAG_RECORDER_HOME", &base);
        std::env::remove_var("BAG_RECORDER_EXCLUDE");
        std::env::remove_var("BAG_RECORDER_STOP_TIMEOUT");
        std::env::remove_var("ROS_VERSION");

        let config = AppConfig::load().expect("expected config load to succeed");
        assert_eq!(config.excluded_topics, default_exclusions());
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
        assert_eq!(config.flavor, RosFlavor::ros1());

        let _ = fs::remove_dir_all(&base);
        restore_env("BAG_RECORDER_HOME", old_home);
        restore_env("BAG_RECORDER_EXCLUDE", old_exclude);
        restore_env("BAG_RECORDER_STOP_TIMEOUT", old_timeout);
        restore_env("ROS_VERSION", old_version);
    }

    #[test]
    fn ensure_layout_creates_missing_directories() {
        let base = temp_dir("config-layout").join("nested");
        let cfg = AppConfig {
            base_dir: base.clone(),
            state_path: base.join("state.json"),
            excluded_topics: default_exclusions(),
            flavor: RosFlavor::ros1(),
            stop_timeout: Duration::from_secs(5),
        };

        cfg.ensure_layout()
            .expect("expected ensure_layout to create directories");
        assert!(base.exists(), "base directory should exist");

        if let Some(parent) = base.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn restore_env(key: &str, previous: Option<String>) {
        if let Some(value) = previous {
            std::env::set_var(key, value);
        } else {
            std::env::remove_var(key);
        }
    }

    fn temp_dir(prefix: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock failure")
            .as_nanos();
        std::env::temp_dir().join(format!("record-bag-{prefix}-{nonce}"))
    }
}
