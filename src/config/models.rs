//! Configuration data structures for weft.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. They are
//! serde-friendly and carry defaults so that minimal configs stay short. A config file
//! describes the metadata catalog (`types`), named pointcuts, aspects built from the
//! builtin interceptors, and how stand-ins are shaped.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::{advice::AdviceKind, signature::TypeDescriptor};

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retry_annotation() -> String {
    crate::core::retry::DEFAULT_RETRY_ANNOTATION.to_string()
}

fn default_retry_attempts() -> u32 {
    1
}

/// Per-bean dispatch choice.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// Decided from `target_class` and the target's interfaces
    #[default]
    Auto,
    Surface,
    Subtype,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct BeanProxyConfig {
    #[serde(default)]
    pub strategy: StrategyChoice,
}

/// How stand-ins are built.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Prefer subtype-based stand-ins even when the target has interfaces
    #[serde(default = "default_true")]
    pub target_class: bool,
    /// Overrides keyed by bean name
    #[serde(default)]
    pub beans: HashMap<String, BeanProxyConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_class: true,
            beans: HashMap::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `weft=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            include_spans: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Operation annotation carrying the attempt budget as `value`
    #[serde(default = "default_retry_annotation")]
    pub annotation: String,
    /// Budget when the annotation has no `value`
    #[serde(default = "default_retry_attempts")]
    pub default_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            annotation: default_retry_annotation(),
            default_attempts: default_retry_attempts(),
        }
    }
}

/// One advice body bound to a builtin interceptor.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AdviceConfig {
    /// Defaults to `<interceptor>#<index>`
    #[serde(default)]
    pub name: Option<String>,
    /// Defaults to the interceptor's natural kind
    #[serde(default)]
    pub kind: Option<AdviceKind>,
    pub pointcut: String,
    /// `log`, `trace`, `timing` or `retry`
    pub interceptor: String,
    #[serde(default)]
    pub order: Option<i32>,
    /// `timing` only: warn when a call takes longer, e.g. `"250ms"`
    #[serde(default)]
    pub threshold: Option<String>,
    /// `retry` only: fixed budget overriding the annotation
    #[serde(default)]
    pub attempts: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AspectConfig {
    pub name: String,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub advice: Vec<AdviceConfig>,
}

/// Top-level configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct WeaverConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Named pointcuts, referenced as `name()`. Keep names snake_case so
    /// they survive every file format unchanged.
    #[serde(default)]
    pub pointcuts: BTreeMap<String, String>,
    #[serde(default)]
    pub aspects: Vec<AspectConfig>,
    /// Metadata catalog
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

impl WeaverConfig {
    /// A small but complete configuration, used by `weft init`.
    pub fn sample() -> Self {
        use crate::core::signature::{AnnotationRef, MethodDecl};

        let mut pointcuts = BTreeMap::new();
        pointcuts.insert(
            "all_order".to_string(),
            "execution(* hello.aop.order..*(..))".to_string(),
        );
        pointcuts.insert("all_service".to_string(), "execution(* *..*Service.*(..))".to_string());

        Self {
            proxy: ProxyConfig::default(),
            logging: LoggingConfig::default(),
            retry: RetryConfig::default(),
            pointcuts,
            aspects: vec![
                AspectConfig {
                    name: "logging".to_string(),
                    order: Some(2),
                    advice: vec![AdviceConfig {
                        name: Some("doLog".to_string()),
                        kind: None,
                        pointcut: "all_order()".to_string(),
                        interceptor: "log".to_string(),
                        order: None,
                        threshold: None,
                        attempts: None,
                    }],
                },
                AspectConfig {
                    name: "retry".to_string(),
                    order: Some(1),
                    advice: vec![AdviceConfig {
                        name: Some("doRetry".to_string()),
                        kind: None,
                        pointcut: "@annotation(Retry)".to_string(),
                        interceptor: "retry".to_string(),
                        order: None,
                        threshold: None,
                        attempts: None,
                    }],
                },
            ],
            types: vec![
                TypeDescriptor::class("hello.aop.order.OrderRepository").method(
                    MethodDecl::new("save")
                        .param("String")
                        .returns("String")
                        .annotated(AnnotationRef::new("Retry").with("value", 4)),
                ),
                TypeDescriptor::class("hello.aop.order.OrderService")
                    .method(MethodDecl::new("orderItem").param("String")),
            ],
        }
    }
}
