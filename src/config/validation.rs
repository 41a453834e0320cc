use std::collections::{HashMap, HashSet};

use tracing_subscriber::EnvFilter;

use crate::{
    adapters::interceptors::InterceptorFactory,
    config::models::{AspectConfig, WeaverConfig},
    core::{
        pointcut::PointcutLibrary,
        signature::{TypeRegistry, TypeRegistryBuilder},
    },
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid pointcut in {location}: {message}")]
    InvalidPointcut { location: String, message: String },

    #[error("Invalid metadata catalog: {message}")]
    InvalidCatalog { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Weaver configuration validator
pub struct WeaverConfigValidator;

impl WeaverConfigValidator {
    /// Validate the entire configuration, collecting every problem found
    pub fn validate(config: &WeaverConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if EnvFilter::try_new(&config.logging.level).is_err() {
            errors.push(ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: format!("'{}' is not a valid filter directive", config.logging.level),
            });
        }

        if config.retry.default_attempts == 0 {
            errors.push(ValidationError::InvalidField {
                field: "retry.default_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if config.retry.annotation.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "retry.annotation".to_string(),
            });
        }

        let registry = match Self::build_registry(config) {
            Ok(registry) => Some(registry),
            Err(e) => {
                errors.push(e);
                None
            }
        };
        if let Some(registry) = &registry {
            errors.extend(Self::check_retry_annotations(config, registry));
        }

        let mut library = PointcutLibrary::new();
        for (name, expression) in &config.pointcuts {
            if let Err(e) = library.define(name, expression) {
                errors.push(ValidationError::InvalidPointcut {
                    location: format!("pointcuts.{name}"),
                    message: e.to_string(),
                });
            }
        }

        let mut aspect_names = HashSet::new();
        for aspect in &config.aspects {
            if aspect.name.trim().is_empty() {
                errors.push(ValidationError::MissingField {
                    field: "aspects[].name".to_string(),
                });
            } else if !aspect_names.insert(aspect.name.as_str()) {
                errors.push(ValidationError::InvalidField {
                    field: format!("aspects.{}", aspect.name),
                    message: "aspect name used more than once".to_string(),
                });
            }
            errors.extend(Self::validate_aspect(aspect, &library, registry.as_ref()));
        }

        Self::warn_on_shared_orders(&config.aspects);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn build_registry(config: &WeaverConfig) -> ValidationResult<TypeRegistry> {
        TypeRegistryBuilder::default()
            .register_all(config.types.iter().cloned())
            .build()
            .map_err(|e| ValidationError::InvalidCatalog {
                message: e.to_string(),
            })
    }

    /// Every retry annotation carrying a `value` must allow at least one attempt
    fn check_retry_annotations(config: &WeaverConfig, registry: &TypeRegistry) -> Vec<ValidationError> {
        // a zero default budget is reported on its own
        let Ok(retry) = InterceptorFactory::retry(&config.retry, None) else {
            return Vec::new();
        };
        let mut errors = Vec::new();
        for desc in &config.types {
            let Ok(operations) = registry.operations(&desc.name) else {
                continue;
            };
            for signature in operations.iter().filter(|s| s.declaring_type == desc.name) {
                if let Err(e) = retry.policy_for(signature) {
                    errors.push(ValidationError::InvalidField {
                        field: format!("types.{}.{}", desc.name, signature.method_name),
                        message: e.to_string(),
                    });
                }
            }
        }
        errors
    }

    fn validate_aspect(
        aspect: &AspectConfig,
        library: &PointcutLibrary,
        registry: Option<&TypeRegistry>,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if aspect.advice.is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("aspects.{}.advice", aspect.name),
            });
        }

        for (index, advice) in aspect.advice.iter().enumerate() {
            let location = format!("aspects.{}.advice[{index}]", aspect.name);

            if let Err(message) = InterceptorFactory::check(advice) {
                errors.push(ValidationError::InvalidField {
                    field: location.clone(),
                    message,
                });
            }

            if advice.pointcut.trim().is_empty() {
                errors.push(ValidationError::MissingField {
                    field: format!("{location}.pointcut"),
                });
            } else if let Some(registry) = registry
                && let Err(e) = library.compile(&advice.pointcut, registry)
            {
                errors.push(ValidationError::InvalidPointcut {
                    location,
                    message: e.to_string(),
                });
            }
        }
        errors
    }

    /// Aspects sharing an order fall back to registration order among
    /// themselves. Legal, but usually not what was meant.
    fn warn_on_shared_orders(aspects: &[AspectConfig]) {
        let mut by_order: HashMap<i32, Vec<&str>> = HashMap::new();
        for aspect in aspects {
            if let Some(order) = aspect.order {
                by_order.entry(order).or_default().push(&aspect.name);
            }
        }
        for (order, names) in by_order.into_iter().filter(|(_, names)| names.len() > 1) {
            tracing::warn!(
                order,
                aspects = ?names,
                "aspects share an order; they will run in registration order"
            );
        }
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
