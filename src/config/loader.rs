use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::{models::WeaverConfig, validation::WeaverConfigValidator};

fn format_for(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Toml,
    }
}

/// Load and validate configuration from a file using the config crate.
/// Supports TOML, YAML and JSON, chosen by extension.
pub fn load_config(config_path: &str) -> Result<WeaverConfig> {
    let config = load_config_unchecked(config_path)?;
    WeaverConfigValidator::validate(&config)
        .with_context(|| format!("Invalid configuration in {config_path}"))?;
    Ok(config)
}

/// Load configuration without validation (used for the validate command)
pub fn load_config_unchecked(config_path: &str) -> Result<WeaverConfig> {
    let path = Path::new(config_path);

    let settings = Config::builder()
        .add_source(File::new(
            path.to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
            format_for(path),
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", path.display()))?;

    let weaver_config: WeaverConfig = settings
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize config from {}", path.display()))?;

    Ok(weaver_config)
}

/// Render a configuration as TOML (used by `weft init`).
pub fn render_toml(config: &WeaverConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration as TOML")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::models::StrategyChoice;

    #[test]
    fn test_load_toml_config() {
        let toml_content = r#"
[proxy]
target_class = false

[proxy.beans.order_service]
strategy = "subtype"

[retry]
default_attempts = 2

[pointcuts]
all_order = "execution(* hello.aop.order..*(..))"

[[aspects]]
name = "logging"
order = 1

[[aspects.advice]]
pointcut = "all_order()"
interceptor = "log"

[[types]]
name = "hello.aop.order.OrderService"

[[types.methods]]
name = "orderItem"
params = ["String"]
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert!(!config.proxy.target_class);
        assert_eq!(
            config.proxy.beans["order_service"].strategy,
            StrategyChoice::Subtype
        );
        assert_eq!(config.retry.default_attempts, 2);
        assert_eq!(config.retry.annotation, "Retry");
        assert_eq!(config.aspects[0].advice[0].interceptor, "log");
        assert_eq!(config.types[0].methods[0].returns, "void");
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml_content = r#"
logging:
  level: debug
aspects:
  - name: retry
    advice:
      - pointcut: "@annotation(Retry)"
        interceptor: retry
types:
  - name: app.ExamRepository
    methods:
      - name: save
        params: [String]
        returns: String
        annotations:
          - name: Retry
            attributes:
              value: 4
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.logging.level, "debug");
        let retry = &config.types[0].methods[0].annotations[0];
        assert_eq!(retry.value().and_then(|v| v.as_u64()), Some(4));
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let json_content = r#"{ "retry": { "default_attempts": 0 } }"#;

        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, "{}", json_content).unwrap();

        let path = temp_file.path().to_str().unwrap();
        assert!(load_config(path).is_err());
        assert!(load_config_unchecked(path).is_ok());
    }

    #[test]
    fn test_sample_round_trips_through_toml() {
        let sample = WeaverConfig::sample();
        let rendered = render_toml(&sample).unwrap();

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", rendered).unwrap();

        let loaded = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.aspects.len(), sample.aspects.len());
        assert_eq!(loaded.pointcuts, sample.pointcuts);
        assert_eq!(loaded.types.len(), 2);
    }
}
