use adorn_core::{PlannerConfig, PosePolicy, Side, SizeFitPolicy, SkinToneValidator};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Batch run configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root directory for run output; each run writes into `<root>/<unix-ms>`.
    pub output_root: PathBuf,
    /// Base directory for relative sticker paths.
    pub asset_dir: PathBuf,
    /// Catalog TOML replacing the embedded default.
    pub catalog_path: Option<PathBuf>,
    /// Maximum image units in flight.
    pub concurrency: usize,
    /// Delay between unit dispatches.
    pub batch_delay: Duration,
    /// Retries for loading an image or its face data.
    pub retries: u32,
    pub yaw_threshold: f32,
    pub positive_yaw_hides: Side,
    /// CIEDE2000 distance above which a scanned pixel is not skin.
    pub skin_distance: f32,
    /// Largest tolerated fraction of non-skin pixels under a sticker.
    pub skin_ratio: f32,
    pub size_fit_ratio: f32,
    pub size_fit_yaw: f32,
    /// Skip the probability draw (`--all-options`).
    pub force_all: bool,
    /// Draw landmark and skin-scan indicators on the output.
    pub indicate: bool,
    /// Base seed; unit `i` plans with `seed + i`.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from `ADORN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let planner = PlannerConfig::default();
        Self {
            output_root: lookup("ADORN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./output/accessorise")),
            asset_dir: lookup("ADORN_ASSET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./assets")),
            catalog_path: lookup("ADORN_CATALOG").map(PathBuf::from),
            concurrency: env_usize(&lookup, "ADORN_CONCURRENCY", 4).max(1),
            batch_delay: Duration::from_millis(env_u64(&lookup, "ADORN_BATCH_DELAY_MS", 1000)),
            retries: env_u32(&lookup, "ADORN_RETRIES", 2),
            yaw_threshold: env_f32(&lookup, "ADORN_YAW_THRESHOLD", planner.pose.yaw_threshold),
            positive_yaw_hides: lookup("ADORN_POSITIVE_YAW_HIDES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(planner.pose.positive_yaw_hides),
            skin_distance: env_f32(&lookup, "ADORN_SKIN_DISTANCE", planner.skin.distance_threshold),
            skin_ratio: env_f32(&lookup, "ADORN_SKIN_RATIO", planner.skin.max_breach_ratio),
            size_fit_ratio: env_f32(&lookup, "ADORN_SIZE_FIT_RATIO", planner.size_fit.max_width_ratio),
            size_fit_yaw: env_f32(&lookup, "ADORN_SIZE_FIT_YAW", planner.size_fit.yaw_threshold),
            force_all: env_flag(&lookup, "ADORN_FORCE_ALL"),
            indicate: env_flag(&lookup, "ADORN_INDICATE"),
            seed: lookup("ADORN_SEED").and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Planner tunables derived from this configuration.
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            force_all: self.force_all,
            pose: PosePolicy {
                yaw_threshold: self.yaw_threshold,
                positive_yaw_hides: self.positive_yaw_hides,
            },
            size_fit: SizeFitPolicy {
                max_width_ratio: self.size_fit_ratio,
                yaw_threshold: self.size_fit_yaw,
            },
            skin: SkinToneValidator {
                distance_threshold: self.skin_distance,
                max_breach_ratio: self.skin_ratio,
            },
            ..PlannerConfig::default()
        }
    }

    /// Output directory for a run started at `ts_millis`.
    pub fn run_dir(&self, ts_millis: i64) -> PathBuf {
        self.output_root.join(ts_millis.to_string())
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        self.catalog_path.as_deref()
    }
}

fn env_f32<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: f32) -> f32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> bool {
    lookup(key).is_some_and(|v| {
        let v = v.trim();
        !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.batch_delay, Duration::from_millis(1000));
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.positive_yaw_hides, Side::Left);
        assert!(!cfg.force_all);
        assert!(cfg.seed.is_none());
        assert_eq!(cfg.planner_config(), PlannerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("ADORN_CONCURRENCY", "8"),
            ("ADORN_YAW_THRESHOLD", "17.5"),
            ("ADORN_POSITIVE_YAW_HIDES", "right"),
            ("ADORN_SKIN_RATIO", "0.2"),
            ("ADORN_FORCE_ALL", "1"),
            ("ADORN_SEED", "42"),
            ("ADORN_CATALOG", "/etc/adorn/catalog.toml"),
        ]);
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.catalog_path(), Some(Path::new("/etc/adorn/catalog.toml")));

        let planner = cfg.planner_config();
        assert!(planner.force_all);
        assert!((planner.pose.yaw_threshold - 17.5).abs() < 1e-6);
        assert_eq!(planner.pose.positive_yaw_hides, Side::Right);
        assert!((planner.skin.max_breach_ratio - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let cfg = config(&[
            ("ADORN_CONCURRENCY", "0"),
            ("ADORN_RETRIES", "lots"),
            ("ADORN_POSITIVE_YAW_HIDES", "up"),
            ("ADORN_INDICATE", "false"),
        ]);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.positive_yaw_hides, Side::Left);
        assert!(!cfg.indicate);
    }

    #[test]
    fn test_out_of_range_retries_fall_back() {
        let cfg = config(&[("ADORN_RETRIES", "4294967297")]);
        assert_eq!(cfg.retries, 2);
        assert_eq!(config(&[("ADORN_RETRIES", "5")]).retries, 5);
    }

    #[test]
    fn test_run_dir_is_timestamped() {
        let cfg = config(&[("ADORN_OUTPUT_DIR", "/tmp/out")]);
        assert_eq!(cfg.run_dir(1_650_000_000_000), PathBuf::from("/tmp/out/1650000000000"));
    }
}
