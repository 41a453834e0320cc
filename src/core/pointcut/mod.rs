//! Pointcut expressions: parsing, named definitions, parameter binding and
//! matching.
pub mod binding;
pub mod matcher;
pub mod parser;
pub mod pattern;

use std::{collections::BTreeMap, fmt};

pub use binding::{AdviceParam, Binding, BindingSource, Bindings, Bound};
pub use matcher::{StaticContext, StaticMatch};
pub use parser::PointcutExpr;

use crate::core::{
    error::{AopError, AopResult},
    joinpoint::JoinPoint,
    pointcut::{binding::Binder, parser::ParseError, pattern::ParamElem},
    signature::{Signature, TypeRegistry},
};

/// A compiled pointcut: references inlined and type names checked against
/// the registry.
#[derive(Debug, Clone)]
pub struct Pointcut {
    expression: String,
    root: PointcutExpr,
    dynamic: bool,
    bindings: Vec<Binding>,
}

impl Pointcut {
    /// Compile a standalone expression (no named references available).
    pub fn compile(expression: &str, registry: &TypeRegistry) -> AopResult<Self> {
        PointcutLibrary::default().compile(expression, registry)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn root(&self) -> &PointcutExpr {
        &self.root
    }

    /// Whether some part of the expression needs runtime values.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Advice parameters this pointcut supplies, in binding order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Values for every bound parameter, taken from a call the pointcut
    /// matched.
    pub fn bind(&self, jp: &JoinPoint, registry: &TypeRegistry) -> Bindings {
        if self.bindings.is_empty() {
            return Bindings::default();
        }
        Bindings::resolve(&self.bindings, jp, registry)
    }

    pub fn static_match(&self, ctx: &StaticContext<'_>, registry: &TypeRegistry) -> StaticMatch {
        matcher::evaluate_static(&self.root, ctx, registry)
    }

    /// Per-call evaluation.
    pub fn matches_join_point(&self, jp: &JoinPoint, registry: &TypeRegistry) -> bool {
        matcher::evaluate_dynamic(&self.root, jp, registry)
    }

    /// Signature-only check: true unless the pointcut can be ruled out
    /// without runtime values.
    pub fn matches(&self, signature: &Signature, registry: &TypeRegistry) -> bool {
        self.static_match(&StaticContext::new(signature), registry)
            .could_match()
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Named pointcut definitions that other expressions can refer to as
/// `name()` or `Some.Qualifier.name()`.
#[derive(Debug, Clone, Default)]
pub struct PointcutLibrary {
    definitions: BTreeMap<String, String>,
}

fn invalid(expression: &str, err: ParseError) -> AopError {
    AopError::InvalidPointcut {
        expression: expression.to_string(),
        position: err.position,
        message: err.message,
    }
}

impl PointcutLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named pointcut. The expression must parse; references in
    /// it are resolved lazily so definitions may appear in any order.
    pub fn define(&mut self, name: impl Into<String>, expression: impl Into<String>) -> AopResult<()> {
        let name = name.into();
        let expression = expression.into();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(AopError::invalid_config(format!(
                "invalid pointcut name '{name}'"
            )));
        }
        if self.definitions.contains_key(&name) {
            return Err(AopError::invalid_config(format!(
                "pointcut '{name}' defined twice"
            )));
        }
        parser::parse(&expression).map_err(|e| invalid(&expression, e))?;
        self.definitions.insert(name, expression);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.definitions.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Parse `expression`, inline every reference and check that literal
    /// type names used by `args`, `this` and `target` exist.
    pub fn compile(&self, expression: &str, registry: &TypeRegistry) -> AopResult<Pointcut> {
        self.compile_with_params(expression, &[], registry)
    }

    /// Like [`compile`](Self::compile), for an advice body declaring
    /// `params`. Designators naming a parameter match on its declared type
    /// and bind the value; every parameter must be bound exactly once.
    pub fn compile_with_params(
        &self,
        expression: &str,
        params: &[AdviceParam],
        registry: &TypeRegistry,
    ) -> AopResult<Pointcut> {
        let parsed = parser::parse(expression).map_err(|e| invalid(expression, e))?;
        let inlined = self.inline(parsed, expression, &mut Vec::new())?;
        let mut binder = Binder::new(params, expression)?;
        let root = binder.rewrite(inlined, true)?;
        let bindings = binder.finish()?;
        check_type_names(&root, registry)?;
        Ok(Pointcut {
            expression: expression.to_string(),
            dynamic: root.is_dynamic(),
            root,
            bindings,
        })
    }

    fn inline(
        &self,
        expr: PointcutExpr,
        source: &str,
        stack: &mut Vec<String>,
    ) -> AopResult<PointcutExpr> {
        Ok(match expr {
            PointcutExpr::Reference(name) => {
                if stack.contains(&name) {
                    return Err(AopError::InvalidPointcut {
                        expression: source.to_string(),
                        position: 0,
                        message: format!("cyclic reference through '{name}()'"),
                    });
                }
                let text = self
                    .definitions
                    .get(&name)
                    .ok_or_else(|| AopError::not_found("pointcut", format!("{name}()")))?;
                let parsed = parser::parse(text).map_err(|e| invalid(text, e))?;
                stack.push(name);
                let inlined = self.inline(parsed, text, stack)?;
                stack.pop();
                inlined
            }
            PointcutExpr::And(a, b) => PointcutExpr::And(
                Box::new(self.inline(*a, source, stack)?),
                Box::new(self.inline(*b, source, stack)?),
            ),
            PointcutExpr::Or(a, b) => PointcutExpr::Or(
                Box::new(self.inline(*a, source, stack)?),
                Box::new(self.inline(*b, source, stack)?),
            ),
            PointcutExpr::Not(inner) => {
                PointcutExpr::Not(Box::new(self.inline(*inner, source, stack)?))
            }
            other => other,
        })
    }
}

fn check_type_names(expr: &PointcutExpr, registry: &TypeRegistry) -> AopResult<()> {
    match expr {
        PointcutExpr::Args(params) => {
            for elem in params.elems() {
                if let ParamElem::Type(pattern) = elem
                    && let Some(name) = pattern.literal()
                {
                    registry.resolve(name)?;
                }
            }
            Ok(())
        }
        PointcutExpr::This(name) | PointcutExpr::Target(name) => registry.resolve(name).map(|_| ()),
        PointcutExpr::And(a, b) | PointcutExpr::Or(a, b) => {
            check_type_names(a, registry)?;
            check_type_names(b, registry)
        }
        PointcutExpr::Not(inner) => check_type_names(inner, registry),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signature::{AnnotationRef, MethodDecl, TypeDescriptor};

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .register(
                TypeDescriptor::interface("hello.aop.member.MemberService")
                    .method(MethodDecl::new("hello").param("String").returns("String")),
            )
            .register(
                TypeDescriptor::class("hello.aop.member.MemberServiceImpl")
                    .extends("hello.aop.member.MemberService")
                    .annotated(AnnotationRef::new("ClassAop"))
                    .method(
                        MethodDecl::new("hello")
                            .param("String")
                            .returns("String")
                            .annotated(AnnotationRef::new("MethodAop")),
                    )
                    .method(MethodDecl::new("internal").param("String").returns("String")),
            )
            .build()
            .unwrap()
    }

    fn check(expr: &str, method: &str) -> bool {
        let registry = registry();
        let sig = registry.describe("MemberServiceImpl", method).unwrap();
        Pointcut::compile(expr, &registry).unwrap().matches(&sig, &registry)
    }

    #[test]
    fn test_annotation_designators() {
        assert!(check("@annotation(MethodAop)", "hello"));
        assert!(!check("@annotation(MethodAop)", "internal"));
        assert!(check("@within(ClassAop)", "internal"));
    }

    #[test]
    fn test_args_is_static_when_declared_types_suffice() {
        let registry = registry();
        let sig = registry.describe("MemberServiceImpl", "hello").unwrap();
        let ctx = StaticContext::new(&sig);
        let static_of = |e: &str| Pointcut::compile(e, &registry).unwrap().static_match(&ctx, &registry);

        assert_eq!(static_of("args(String)"), StaticMatch::Always);
        assert_eq!(static_of("args(Object)"), StaticMatch::Always);
        assert_eq!(static_of("args()"), StaticMatch::Never);
        assert_eq!(static_of("args(String, ..)"), StaticMatch::Always);
        assert_eq!(static_of("@target(ClassAop)"), StaticMatch::Maybe);
    }

    #[test]
    fn test_named_references_are_inlined() {
        let registry = registry();
        let mut library = PointcutLibrary::new();
        library.define("allMember", "execution(* hello.aop.member..*(..))").unwrap();
        library.define("helloOnly", "execution(* hello(..))").unwrap();
        library.define("both", "allMember() && helloOnly()").unwrap();

        let pointcut = library
            .compile("hello.aop.Pointcuts.both()", &registry)
            .unwrap();
        let hello = registry.describe("MemberServiceImpl", "hello").unwrap();
        let internal = registry.describe("MemberServiceImpl", "internal").unwrap();
        assert!(pointcut.matches(&hello, &registry));
        assert!(!pointcut.matches(&internal, &registry));
    }

    #[test]
    fn test_unknown_reference_is_not_found() {
        let err = PointcutLibrary::new()
            .compile("missing()", &registry())
            .unwrap_err();
        assert!(matches!(err, AopError::NotFound { kind: "pointcut", .. }));
    }

    #[test]
    fn test_cyclic_reference_is_rejected() {
        let mut library = PointcutLibrary::new();
        library.define("a", "b()").unwrap();
        library.define("b", "a()").unwrap();
        let err = library.compile("a()", &registry()).unwrap_err();
        assert!(matches!(err, AopError::InvalidPointcut { .. }));
    }

    #[test]
    fn test_unknown_args_type_is_not_found() {
        let err = Pointcut::compile("args(NoSuchType)", &registry()).unwrap_err();
        assert!(matches!(err, AopError::NotFound { kind: "type", .. }));
        // wildcard patterns are not resolved
        assert!(Pointcut::compile("args(No*)", &registry()).is_ok());
    }

    #[test]
    fn test_parse_error_becomes_invalid_pointcut() {
        let err = Pointcut::compile("execution(* *(..)", &registry()).unwrap_err();
        assert!(matches!(err, AopError::InvalidPointcut { position: 10, .. }));
    }
}
