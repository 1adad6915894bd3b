//! Configuration module
//!
//! Run settings with defaults matching the reference traffic mix,
//! loaded from YAML or JSON and overridable from the environment.

pub mod env;
mod file;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::harness::catalog::CatalogError;
use crate::harness::checks::check_names;
use crate::harness::{Catalog, CheckSettings, Pacer};
use crate::metrics::threshold::{self, default_thresholds};
use crate::metrics::{MetricsSink, Threshold, ThresholdSpec};
use crate::models::TestCase;
use crate::scheduler::{predefined, Scenario};
use crate::summary::DEFAULT_RESULTS_FILE;

pub use env::EnvConfig;
pub use file::ConfigFile;

/// Target used when nothing else is configured
pub const DEFAULT_HOST: &str = "localhost:8081";

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Price service `host:port`
    pub host: String,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Sleep after every iteration, in milliseconds
    pub pacing_ms: u64,

    /// Latency bound and price tolerance
    pub checks: CheckSettings,

    /// Results artifact path
    pub output: String,

    /// Seed for reproducible case selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Scenarios to run
    pub scenarios: Vec<Scenario>,

    /// Threshold expressions keyed by metric
    pub thresholds: ThresholdSpec,

    /// Replaces the built-in reference cases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Vec<TestCase>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            timeout_secs: 60,
            pacing_ms: 100,
            checks: CheckSettings::default(),
            output: DEFAULT_RESULTS_FILE.to_string(),
            seed: None,
            scenarios: predefined(),
            thresholds: default_thresholds(),
            catalog: None,
        }
    }
}

impl AppConfig {
    /// Overlay environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(host) = &env.host {
            self.host = host.clone();
        }
        if let Some(timeout) = env.timeout {
            self.timeout_secs = timeout;
        }
        if let Some(pacing) = env.pacing_ms {
            self.pacing_ms = pacing;
        }
        if let Some(output) = &env.output {
            self.output = output.clone();
        }
        if env.seed.is_some() {
            self.seed = env.seed;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pacer(&self) -> Pacer {
        Pacer::new(Duration::from_millis(self.pacing_ms))
    }

    /// The configured catalog, or the reference cases
    pub fn catalog(&self) -> Result<Catalog, CatalogError> {
        match &self.catalog {
            Some(cases) => Catalog::new(cases.clone()),
            None => Ok(Catalog::reference()),
        }
    }

    /// Parse and check every threshold against the metrics a run produces
    pub fn parsed_thresholds(&self) -> Result<Vec<Threshold>> {
        let thresholds = threshold::parse_all(&self.thresholds)?;
        let empty = MetricsSink::new(check_names()).snapshot_over(Duration::ZERO);
        for t in &thresholds {
            t.validate(&empty)?;
        }
        Ok(thresholds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.host.contains("://") {
            bail!("host must be host:port without a scheme, got '{}'", self.host);
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }

        let checks = &self.checks;
        if !(checks.latency_bound_ms.is_finite() && checks.latency_bound_ms > 0.0) {
            bail!("checks.latency_bound_ms must be a positive number");
        }
        if !(checks.price_tolerance.is_finite() && checks.price_tolerance >= 0.0) {
            bail!("checks.price_tolerance must be a non-negative number");
        }

        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !names.insert(scenario.name.as_str()) {
                bail!("Duplicate scenario name '{}'", scenario.name);
            }
        }

        self.catalog()?;
        self.parsed_thresholds()?;
        Ok(())
    }
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.host, "localhost:8081");
        assert_eq!(config.pacing_ms, 100);
        assert_eq!(config.output, "performance-results.json");
        assert_eq!(config.scenarios.len(), 3);
        assert_eq!(config.thresholds["http_req_duration"], vec!["p(95)<500"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "host: prices.internal:9000\nchecks:\n  latency_bound_ms: 250\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.host, "prices.internal:9000");
        assert_eq!(config.checks.latency_bound_ms, 250.0);
        assert_eq!(config.checks.price_tolerance, 0.01);
        assert_eq!(config.scenarios.len(), 3);
    }

    #[test]
    fn test_apply_env() {
        let mut config = AppConfig::default();
        config.apply_env(&EnvConfig {
            host: Some("10.0.0.5:8081".to_string()),
            pacing_ms: Some(0),
            seed: Some(9),
            ..Default::default()
        });

        assert_eq!(config.host, "10.0.0.5:8081");
        assert_eq!(config.pacing_ms, 0);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.host = "http://localhost:8081".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.checks.price_tolerance = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scenarios.push(config.scenarios[0].clone());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.catalog = Some(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_validation() {
        let mut config = AppConfig::default();
        config
            .thresholds
            .insert("http_reqs".to_string(), vec!["rate>100".to_string()]);
        assert_eq!(config.parsed_thresholds().unwrap().len(), 3);

        config
            .thresholds
            .insert("no_such_metric".to_string(), vec!["avg<1".to_string()]);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.thresholds.insert(
            "check{correct price returned}".to_string(),
            vec!["rate>0.99".to_string()],
        );
        assert!(config.parsed_thresholds().is_ok());
    }

    #[test]
    fn test_custom_catalog() {
        let yaml = r#"
catalog:
  - name: Single
    params:
      applicationDate: "2020-06-14T10:00:00"
      productId: 35455
      brandId: 1
    expectedPrice: 35.5
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(0).unwrap().expected_price, 35.5);
    }
}
