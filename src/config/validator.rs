// Startup validation for worker configuration.
// Invalid settings fail fast before the first dequeue.

use crate::config::types::{InvokeError, Result};
use crate::config::worker::WorkerConfig;
use crate::judge::registry;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate config at startup. Errors are fatal, warnings are logged.
pub fn validate_config(config: &WorkerConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_limits(config, &mut result);
    validate_connection(config, &mut result);
    validate_paths(config, &mut result);
    validate_language(config, &mut result);

    for warning in &result.warnings {
        log::warn!("config: {}", warning);
    }

    if !result.is_valid() {
        return Err(InvokeError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_limits(config: &WorkerConfig, result: &mut ValidationResult) {
    let non_zero = [
        ("cpu_time_limit_secs", config.cpu_time_limit_secs),
        ("memory_limit_mb", config.memory_limit_mb),
        ("compile_timeout_secs", config.compile_timeout_secs),
        ("execute_timeout_secs", config.execute_timeout_secs),
        ("poll_timeout_secs", config.poll_timeout_secs),
        ("result_ttl_secs", config.result_ttl_secs),
    ];
    for (name, value) in non_zero {
        if value == 0 {
            result.add_error(format!("{} cannot be zero", name));
        }
    }

    if config.memory_limit_mb > 0 && config.memory_limit_mb < 32 {
        result.add_warning(format!(
            "memory_limit_mb {} is very low, most runtimes will fail to start",
            config.memory_limit_mb
        ));
    }

    if config.execute_timeout_secs > 0 && config.cpu_time_limit_secs > config.execute_timeout_secs
    {
        result.add_warning(format!(
            "cpu_time_limit_secs ({}) exceeds execute_timeout_secs ({}); the wall clock will always fire first",
            config.cpu_time_limit_secs, config.execute_timeout_secs
        ));
    }
}

fn validate_connection(config: &WorkerConfig, result: &mut ValidationResult) {
    if config.redis_host.trim().is_empty() {
        result.add_error("redis_host cannot be empty".to_string());
    }
    if config.redis_port == 0 {
        result.add_error("redis_port cannot be zero".to_string());
    }
}

fn validate_paths(config: &WorkerConfig, result: &mut ValidationResult) {
    if !config.sandbox_root.is_absolute() {
        result.add_error(format!(
            "sandbox_root must be an absolute path: {}",
            config.sandbox_root.display()
        ));
    }
}

fn validate_language(config: &WorkerConfig, result: &mut ValidationResult) {
    match config.language.as_deref() {
        None => result.add_error("language must be set for a worker".to_string()),
        Some(language) if registry::adapter_for(language).is_err() => {
            result.add_error(format!(
                "unsupported language '{}'; supported: {}",
                language,
                registry::supported_languages().join(", ")
            ));
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> WorkerConfig {
        WorkerConfig {
            language: Some("python".to_string()),
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let result = validate_config(&valid_config()).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = WorkerConfig {
            memory_limit_mb: 0,
            execute_timeout_secs: 0,
            ..valid_config()
        };
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("memory_limit_mb cannot be zero"));
        assert!(err.contains("execute_timeout_secs cannot be zero"));
    }

    #[test]
    fn test_unknown_language_rejected() {
        let config = WorkerConfig {
            language: Some("cobol".to_string()),
            ..WorkerConfig::default()
        };
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("unsupported language 'cobol'"));
    }

    #[test]
    fn test_missing_language_rejected() {
        assert!(validate_config(&WorkerConfig::default()).is_err());
    }

    #[test]
    fn test_relative_root_rejected() {
        let config = WorkerConfig {
            sandbox_root: "sandbox".into(),
            ..valid_config()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_cpu_above_wall_is_warning_only() {
        let config = WorkerConfig {
            cpu_time_limit_secs: 60,
            ..valid_config()
        };
        let result = validate_config(&config).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }
}
