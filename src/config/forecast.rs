use serde::Deserialize;
use std::path::Path;

/// Service and engine tuning for the forecaster.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_trial_count")]
    pub trial_count: usize,
    #[serde(default = "default_min_feed_height")]
    pub min_feed_height: usize,
    #[serde(default = "default_ability_threshold")]
    pub ability_threshold: u8,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// 0 uses the available hardware parallelism.
    #[serde(default)]
    pub worker_threads: usize,
    /// 0 draws a fresh base seed per computation.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_trial_count() -> usize {
    100
}
fn default_min_feed_height() -> usize {
    12
}
fn default_ability_threshold() -> u8 {
    0
}
fn default_max_iterations() -> u32 {
    1000
}
fn default_debounce_ms() -> u64 {
    150
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            trial_count: default_trial_count(),
            min_feed_height: default_min_feed_height(),
            ability_threshold: default_ability_threshold(),
            max_iterations: default_max_iterations(),
            debounce_ms: default_debounce_ms(),
            worker_threads: 0,
            seed: 0,
            log_level: default_log_level(),
        }
    }
}

impl ForecastConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: ForecastConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Worker count for the trial pool.
    pub fn effective_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.trial_count == 0 {
            errors.push(format!(
                "trial_count must be > 0, got {}. Example: trial_count = 100",
                self.trial_count
            ));
        }

        if self.min_feed_height == 0 {
            errors.push(format!(
                "min_feed_height must be > 0, got {}. Example: min_feed_height = 12",
                self.min_feed_height
            ));
        }

        if self.ability_threshold > 100 {
            errors.push(format!(
                "ability_threshold must be 0-100, got {}. Example: ability_threshold = 0",
                self.ability_threshold
            ));
        }

        if self.max_iterations == 0 {
            errors.push(format!(
                "max_iterations must be > 0, got {}. Example: max_iterations = 1000",
                self.max_iterations
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
