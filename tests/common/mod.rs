// Shared fixtures for the integration tests: a small metadata catalog and
// hand-written targets for it.
#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use weft::{
    AnnotationRef, AopError, Failure, MethodDecl, Signature, Target, TypeDescriptor,
    TypeRegistry, Value,
};

pub const MEMBER_SERVICE: &str = "hello.aop.member.MemberService";
pub const MEMBER_SERVICE_IMPL: &str = "hello.aop.member.MemberServiceImpl";
pub const ORDER_REPOSITORY: &str = "hello.aop.order.OrderRepository";
pub const ORDER_SERVICE: &str = "hello.aop.order.OrderService";
pub const EXAM_REPOSITORY: &str = "hello.aop.exam.ExamRepository";
pub const PARENT: &str = "hello.aop.pointcut.Parent";
pub const CHILD: &str = "hello.aop.pointcut.Child";
pub const OBJECT_STORE: &str = "hello.aop.pointcut.ObjectStore";
pub const CALL_SERVICE: &str = "hello.aop.internalcall.CallService";
pub const INTERNAL_SERVICE: &str = "hello.aop.internalcall.InternalService";
pub const SEALED_CLOCK: &str = "hello.aop.infra.SystemClock";

pub fn catalog() -> TypeRegistry {
    TypeRegistry::builder()
        .register(TypeDescriptor::class("IllegalStateException"))
        .register(
            TypeDescriptor::interface(MEMBER_SERVICE)
                .method(MethodDecl::new("hello").param("String").returns("String")),
        )
        .register(
            TypeDescriptor::class(MEMBER_SERVICE_IMPL)
                .extends(MEMBER_SERVICE)
                .annotated(AnnotationRef::new("ClassAop"))
                .method(
                    MethodDecl::new("hello")
                        .param("String")
                        .returns("String")
                        .annotated(AnnotationRef::new("MethodAop").with("value", "test value")),
                )
                .method(MethodDecl::new("internal").param("String").returns("String")),
        )
        .register(
            TypeDescriptor::class(ORDER_REPOSITORY).method(
                MethodDecl::new("save")
                    .param("String")
                    .returns("String")
                    .throws("IllegalStateException"),
            ),
        )
        .register(
            TypeDescriptor::class(ORDER_SERVICE).method(MethodDecl::new("orderItem").param("String")),
        )
        .register(
            TypeDescriptor::class(EXAM_REPOSITORY).method(
                MethodDecl::new("save")
                    .param("String")
                    .returns("String")
                    .annotated(AnnotationRef::new("Retry").with("value", 4)),
            ),
        )
        .register(TypeDescriptor::class(PARENT).method(MethodDecl::new("parentMethod")))
        .register(
            TypeDescriptor::class(CHILD)
                .extends(PARENT)
                .annotated(AnnotationRef::new("ClassAop"))
                .method(MethodDecl::new("childMethod")),
        )
        .register(
            TypeDescriptor::class(OBJECT_STORE)
                .method(MethodDecl::new("store").param("Object").returns("String"))
                .method(MethodDecl::new("describe").returns("String").final_()),
        )
        .register(
            TypeDescriptor::class(CALL_SERVICE)
                .method(MethodDecl::new("external"))
                .method(MethodDecl::new("internal")),
        )
        .register(TypeDescriptor::class(INTERNAL_SERVICE).method(MethodDecl::new("internal")))
        .register(
            TypeDescriptor::class(SEALED_CLOCK)
                .sealed()
                .method(MethodDecl::new("now").returns("long")),
        )
        .build()
        .expect("catalog is well formed")
}

/// Turn an error from a nested stand-in call back into a failure.
pub fn into_failure(err: AopError) -> Failure {
    err.as_failure()
        .cloned()
        .unwrap_or_else(|| Failure::new("IllegalStateException", err.to_string()))
}

fn unknown(type_name: &str, operation: &Signature) -> Failure {
    Failure::new(
        "UnsupportedOperationException",
        format!("{type_name} has no {}", operation.method_name),
    )
}

/// Shared, ordered record of what advice and targets did.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
pub struct MemberServiceImpl {
    pub calls: AtomicUsize,
}

impl Target for MemberServiceImpl {
    fn type_name(&self) -> &str {
        MEMBER_SERVICE_IMPL
    }

    fn invoke(&self, operation: &Signature, _args: &[Value]) -> Result<Value, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match operation.method_name.as_str() {
            "hello" | "internal" => Ok(Value::from("ok")),
            _ => Err(unknown(MEMBER_SERVICE_IMPL, operation)),
        }
    }
}

/// Fails when asked to save `"ex"`.
#[derive(Debug, Default)]
pub struct OrderRepository {
    pub journal: Journal,
}

impl Target for OrderRepository {
    fn type_name(&self) -> &str {
        ORDER_REPOSITORY
    }

    fn invoke(&self, operation: &Signature, args: &[Value]) -> Result<Value, Failure> {
        let item = args.first().and_then(Value::as_str).unwrap_or_default();
        self.journal.record(format!("[repository] save {item}"));
        if item == "ex" {
            return Err(Failure::new("IllegalStateException", "exception occurred"));
        }
        match operation.method_name.as_str() {
            "save" => Ok(Value::from("ok")),
            _ => Err(unknown(ORDER_REPOSITORY, operation)),
        }
    }
}

/// Delegates to the repository through its stand-in.
#[derive(Debug)]
pub struct OrderService {
    pub repository: Arc<weft::Proxy>,
}

impl Target for OrderService {
    fn type_name(&self) -> &str {
        ORDER_SERVICE
    }

    fn invoke(&self, _operation: &Signature, args: &[Value]) -> Result<Value, Failure> {
        self.repository
            .invoke("save", args.to_vec())
            .map_err(into_failure)?;
        Ok(Value::Unit)
    }
}

/// Fails on every fifth call, counting across calls.
#[derive(Debug, Default)]
pub struct ExamRepository {
    pub seq: AtomicUsize,
}

impl Target for ExamRepository {
    fn type_name(&self) -> &str {
        EXAM_REPOSITORY
    }

    fn invoke(&self, _operation: &Signature, args: &[Value]) -> Result<Value, Failure> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        if seq % 5 == 0 {
            return Err(Failure::new(
                "IllegalStateException",
                format!("call {seq} failed"),
            ));
        }
        Ok(args.first().cloned().unwrap_or(Value::Unit))
    }
}

/// Fails its first `failures` calls with `attempt <n>`, then returns `"done"`.
#[derive(Debug)]
pub struct Flaky {
    pub type_name: &'static str,
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl Flaky {
    pub fn new(type_name: &'static str, failures: usize) -> Self {
        Self {
            type_name,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Target for Flaky {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn invoke(&self, _operation: &Signature, _args: &[Value]) -> Result<Value, Failure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(Failure::new("IllegalStateException", format!("attempt {call}")));
        }
        Ok(Value::from("done"))
    }
}

/// Returns the name of the operation it was called with.
#[derive(Debug)]
pub struct Echo(pub &'static str);

impl Target for Echo {
    fn type_name(&self) -> &str {
        self.0
    }

    fn invoke(&self, operation: &Signature, args: &[Value]) -> Result<Value, Failure> {
        match args.first() {
            Some(arg) => Ok(arg.clone()),
            None => Ok(Value::from(operation.method_name.as_str())),
        }
    }
}
