use anyhow::{Context, Result};
use bioage_core::{ScanConfig, ScoringPolicy};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX bundles.
    pub model_dir: PathBuf,
    /// Timeout in seconds for one face analysis.
    pub analysis_timeout_secs: u64,
    /// Frames discarded before a still is kept (auto exposure settling).
    pub warmup_frames: usize,
    /// Optional TOML file overriding the scoring policy.
    pub policy_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `BIOAGE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            camera_device: var("BIOAGE_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir: var("BIOAGE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(bioage_vision::default_model_dir),
            // Zero would time out every analysis; treat it as unset.
            analysis_timeout_secs: Some(parse_or(var("BIOAGE_ANALYSIS_TIMEOUT_SECS"), 10))
                .filter(|&secs| secs > 0)
                .unwrap_or(10),
            warmup_frames: parse_or(var("BIOAGE_WARMUP_FRAMES"), 4),
            policy_file: var("BIOAGE_POLICY_FILE").filter(|v| !v.is_empty()).map(PathBuf::from),
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            analysis_timeout: Duration::from_secs(self.analysis_timeout_secs),
        }
    }

    /// The scoring policy: the policy file if configured, otherwise the default.
    pub fn load_policy(&self) -> Result<ScoringPolicy> {
        match &self.policy_file {
            Some(path) => read_policy(path),
            None => Ok(ScoringPolicy::DEFAULT),
        }
    }
}

fn read_policy(path: &Path) -> Result<ScoringPolicy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    let policy = parse_policy(&text).with_context(|| format!("invalid policy file {}", path.display()))?;
    tracing::info!(path = %path.display(), policy = ?policy.age_policy, "scoring policy loaded");
    Ok(policy)
}

/// Parse and validate a TOML policy. Missing keys keep their defaults.
pub fn parse_policy(text: &str) -> Result<ScoringPolicy> {
    let policy: ScoringPolicy = toml::from_str(text).context("failed to parse TOML")?;
    policy.validate()?;
    Ok(policy)
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
