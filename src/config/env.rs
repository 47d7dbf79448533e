//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PTP";

/// Unprefixed variable naming the per-worker database prefix
pub const DB_PREFIX_ENV: &str = "DB_DATABASE_PREFIX";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Project root from PTP_PROJECT_PATH
    pub project_path: Option<String>,
    /// Test directory from PTP_TEST_PATH
    pub test_path: Option<String>,
    /// Worker count from PTP_PROCESSORS
    pub processors: Option<usize>,
    /// Results directory from PTP_OUTPUT_DIR
    pub output_dir: Option<String>,
    /// PHPUnit binary from PTP_PHPUNIT
    pub phpunit_path: Option<String>,
    /// Config file from PTP_CONFIG
    pub config_file: Option<String>,
    /// Verbose from PTP_VERBOSE
    pub verbose: Option<bool>,
    /// Database prefix from PTP_DB_PREFIX, falling back to DB_DATABASE_PREFIX
    pub db_prefix: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            project_path: get_env("PROJECT_PATH"),
            test_path: get_env("TEST_PATH"),
            processors: get_env_parse("PROCESSORS"),
            output_dir: get_env("OUTPUT_DIR"),
            phpunit_path: get_env("PHPUNIT"),
            config_file: get_env("CONFIG"),
            verbose: get_env_bool("VERBOSE"),
            db_prefix: get_env("DB_PREFIX")
                .filter(|p| !p.is_empty())
                .or_else(|| env::var(DB_PREFIX_ENV).ok().filter(|p| !p.is_empty())),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.project_path.is_some()
            || self.test_path.is_some()
            || self.processors.is_some()
            || self.output_dir.is_some()
            || self.phpunit_path.is_some()
            || self.config_file.is_some()
            || self.verbose.is_some()
            || self.db_prefix.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_PROJECT_PATH: {:?}", ENV_PREFIX, self.project_path);
        println!("  {}_TEST_PATH:    {:?}", ENV_PREFIX, self.test_path);
        println!("  {}_PROCESSORS:   {:?}", ENV_PREFIX, self.processors);
        println!("  {}_OUTPUT_DIR:   {:?}", ENV_PREFIX, self.output_dir);
        println!("  {}_PHPUNIT:      {:?}", ENV_PREFIX, self.phpunit_path);
        println!("  {}_CONFIG:       {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_VERBOSE:      {:?}", ENV_PREFIX, self.verbose);
        println!("  {}_DB_PREFIX:    {:?}", ENV_PREFIX, self.db_prefix);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
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

/// Print all recognised environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_PROJECT_PATH   Project root (default: .)");
    println!("  {ENV_PREFIX}_TEST_PATH      Directory scanned for *Test.php files");
    println!("  {ENV_PREFIX}_PROCESSORS     Number of parallel workers");
    println!("  {ENV_PREFIX}_OUTPUT_DIR     Results directory inside the project");
    println!("  {ENV_PREFIX}_PHPUNIT        Path to the PHPUnit binary");
    println!("  {ENV_PREFIX}_CONFIG         Path to configuration file");
    println!("  {ENV_PREFIX}_VERBOSE        Enable verbose output (true/false)");
    println!("  {ENV_PREFIX}_DB_PREFIX      Per-worker database prefix");
    println!("  {DB_PREFIX_ENV}      Same as {ENV_PREFIX}_DB_PREFIX");
    println!();
    println!("Example:");
    println!("  export {DB_PREFIX_ENV}=app_testing");
    println!("  ptp run --processors 8");
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Builder for setting environment variables
    #[derive(Default)]
    pub struct EnvBuilder {
        vars: Vec<(String, String)>,
    }

    impl EnvBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.vars.push((key.into(), value.into()));
            self
        }

        pub fn prefixed(self, name: &str, value: impl Into<String>) -> Self {
            self.var(format!("{ENV_PREFIX}_{name}"), value)
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
    pub struct EnvGuard {
        previous: Vec<(String, Option<String>)>,
    }

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
}
