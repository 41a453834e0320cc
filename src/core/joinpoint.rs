//! Per-call data: argument values, failures and the join point itself.
use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    core::{dispatch::StrategyKind, signature::Signature, signature::TypeRegistry},
    ports::target::Target,
};

/// A runtime argument or return value.
///
/// The runtime type of a value may be narrower than the declared parameter
/// type it is passed for; `args(..)` matching looks at [`Value::runtime_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object {
        type_name: String,
        data: serde_json::Value,
    },
}

impl Value {
    pub fn object(type_name: impl Into<String>, data: serde_json::Value) -> Self {
        Value::Object {
            type_name: type_name.into(),
            data,
        }
    }

    /// Registry name of the value's concrete type.
    pub fn runtime_type(&self) -> &str {
        match self {
            Value::Unit => "void",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Object { type_name, .. } => type_name,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                let items = items.iter().map(Value::to_string).collect::<Vec<_>>();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Object { type_name, data } => write!(f, "{type_name}{data}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// An error raised by a target operation or an advice body.
///
/// Failures travel through the chain unchanged. They are cheap to clone so a
/// retrying advice can hold on to the most recent one.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct Failure {
    kind: String,
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Failure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error as the cause.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

/// How the caller sees the stand-in it invoked: bean name, strategy and the
/// types the stand-in can be viewed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyIdentity {
    pub bean_name: String,
    pub strategy: StrategyKind,
    pub target_type: String,
    pub exposed: Vec<String>,
}

impl ProxyIdentity {
    /// Whether the stand-in can be viewed as `type_name`.
    pub fn viewable_as(&self, registry: &TypeRegistry, type_name: &str) -> bool {
        self.exposed
            .iter()
            .any(|exposed| registry.is_assignable(exposed, type_name))
    }
}

/// One concrete call travelling through a chain.
#[derive(Clone)]
pub struct JoinPoint {
    id: Uuid,
    signature: Arc<Signature>,
    args: Vec<Value>,
    target: Arc<dyn Target>,
    this: Arc<ProxyIdentity>,
}

impl JoinPoint {
    pub fn new(
        signature: Arc<Signature>,
        args: Vec<Value>,
        target: Arc<dyn Target>,
        this: Arc<ProxyIdentity>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            signature,
            args,
            target,
            this,
        }
    }

    /// Same call with different arguments. Keeps the invocation id.
    pub fn with_args(&self, args: Vec<Value>) -> Self {
        Self {
            args,
            ..self.clone()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    /// Runtime type of the real receiver.
    pub fn target_type(&self) -> &str {
        self.target.type_name()
    }

    pub fn this(&self) -> &ProxyIdentity {
        &self.this
    }

    pub fn bean_name(&self) -> &str {
        &self.this.bean_name
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("id", &self.id)
            .field("signature", &self.signature.to_string())
            .field("args", &self.args)
            .field("bean", &self.this.bean_name)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution({})", self.signature)
    }
}
