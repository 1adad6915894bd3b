//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PRICE_LOADTEST";

/// Unprefixed host variable honoured for compatibility with k6 scripts
const HOST_FALLBACK: &str = "HOST";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Target from PRICE_LOADTEST_HOST, else HOST
    pub host: Option<String>,
    /// Timeout from PRICE_LOADTEST_TIMEOUT
    pub timeout: Option<u64>,
    /// Pacing from PRICE_LOADTEST_PACING_MS
    pub pacing_ms: Option<u64>,
    /// Results path from PRICE_LOADTEST_OUTPUT
    pub output: Option<String>,
    /// Seed from PRICE_LOADTEST_SEED
    pub seed: Option<u64>,
    /// Config file from PRICE_LOADTEST_CONFIG
    pub config_file: Option<String>,
    /// Verbose from PRICE_LOADTEST_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            host: get_env("HOST").or_else(|| env::var(HOST_FALLBACK).ok()),
            timeout: get_env_parse("TIMEOUT"),
            pacing_ms: get_env_parse("PACING_MS"),
            output: get_env("OUTPUT"),
            seed: get_env_parse("SEED"),
            config_file: get_env("CONFIG"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.host.is_some()
            || self.timeout.is_some()
            || self.pacing_ms.is_some()
            || self.output.is_some()
            || self.seed.is_some()
            || self.config_file.is_some()
            || self.verbose.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {ENV_PREFIX}_HOST:      {:?}", self.host);
        println!("  {ENV_PREFIX}_TIMEOUT:   {:?}", self.timeout);
        println!("  {ENV_PREFIX}_PACING_MS: {:?}", self.pacing_ms);
        println!("  {ENV_PREFIX}_OUTPUT:    {:?}", self.output);
        println!("  {ENV_PREFIX}_SEED:      {:?}", self.seed);
        println!("  {ENV_PREFIX}_CONFIG:    {:?}", self.config_file);
        println!("  {ENV_PREFIX}_VERBOSE:   {:?}", self.verbose);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set any prefixed variable
    pub fn var(mut self, name: &str, value: impl ToString) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_{name}"), value.to_string()));
        self
    }

    /// Set the unprefixed HOST variable
    pub fn plain_host(mut self, host: impl Into<String>) -> Self {
        self.vars.push((HOST_FALLBACK.to_string(), host.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all PRICE_LOADTEST environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_HOST        Price service host:port (falls back to HOST)");
    println!("  {ENV_PREFIX}_TIMEOUT     Request timeout in seconds");
    println!("  {ENV_PREFIX}_PACING_MS   Sleep after each iteration in milliseconds");
    println!("  {ENV_PREFIX}_OUTPUT      Results file path");
    println!("  {ENV_PREFIX}_SEED        Seed for reproducible case selection");
    println!("  {ENV_PREFIX}_CONFIG      Path to configuration file");
    println!("  {ENV_PREFIX}_VERBOSE     Enable verbose output (true/false)");
    println!("  RUST_LOG                   Log filter, overrides --log-level");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_HOST=10.0.0.100:8081");
    println!("  price-loadtest run --scenario normal");
}
