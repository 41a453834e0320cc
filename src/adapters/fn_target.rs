use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    core::{
        joinpoint::{Failure, Value},
        signature::Signature,
    },
    ports::target::Target,
};

type Handler = Arc<dyn Fn(&[Value]) -> Result<Value, Failure> + Send + Sync>;

/// A target assembled from one closure per operation name.
///
/// Overloads share a handler; it receives the arguments and can branch on
/// their count or runtime types.
#[derive(Clone)]
pub struct FnTarget {
    type_name: String,
    handlers: HashMap<String, Handler>,
}

impl FnTarget {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn on<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
        self
    }

    pub fn shared(self) -> Arc<dyn Target> {
        Arc::new(self)
    }
}

impl Target for FnTarget {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn invoke(&self, operation: &Signature, args: &[Value]) -> Result<Value, Failure> {
        match self.handlers.get(&operation.method_name) {
            Some(handler) => handler(args),
            None => Err(Failure::new(
                "UnsupportedOperationException",
                format!("{} has no handler for {}", self.type_name, operation.method_name),
            )),
        }
    }
}

impl fmt::Debug for FnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.handlers.keys().collect();
        methods.sort();
        f.debug_struct("FnTarget")
            .field("type_name", &self.type_name)
            .field("methods", &methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signature::{MethodDecl, TypeDescriptor, TypeRegistry};

    #[test]
    fn test_fn_target_dispatches_by_name() {
        let registry = TypeRegistry::builder()
            .register(
                TypeDescriptor::class("app.Greeter")
                    .method(MethodDecl::new("hello").param("String").returns("String"))
                    .method(MethodDecl::new("bye")),
            )
            .build()
            .unwrap();
        let target = FnTarget::new("app.Greeter").on("hello", |args| {
            Ok(Value::from(format!("hello {}", args[0])))
        });

        let hello = registry.describe("app.Greeter", "hello").unwrap();
        assert_eq!(
            target.invoke(&hello, &[Value::from("kim")]).unwrap(),
            Value::from("hello kim")
        );

        let bye = registry.describe("app.Greeter", "bye").unwrap();
        let failure = target.invoke(&bye, &[]).unwrap_err();
        assert!(failure.is("UnsupportedOperationException"));
    }
}
