//! Static operation metadata.
//!
//! Rust has no runtime reflection, so every type that can be woven is
//! described up front in a [`TypeRegistry`]: its kind, supertypes,
//! type-level annotations, whether it can be extended, and its declared
//! operations. Matching and dispatch only ever consult this table, never the
//! live objects, except for the handful of dynamic designators that need a
//! runtime argument or receiver.
//!
//! Type references may be written either fully qualified
//! (`app.member.MemberService`) or by simple name (`MemberService`) as long
//! as the simple name is unambiguous; the registry canonicalises every
//! reference to its qualified form when it is built.
use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::core::error::{AopError, AopResult};

/// Root of every class and interface hierarchy.
pub const OBJECT: &str = "Object";

/// Types every registry knows about without being told.
const BUILTIN_TYPES: &[(&str, TypeKind, &[&str])] = &[
    (OBJECT, TypeKind::Class, &[]),
    ("Serializable", TypeKind::Interface, &[]),
    ("CharSequence", TypeKind::Interface, &[]),
    ("Comparable", TypeKind::Interface, &[]),
    ("String", TypeKind::Class, &["Serializable", "CharSequence", "Comparable"]),
    ("Collection", TypeKind::Interface, &[]),
    ("List", TypeKind::Interface, &["Collection"]),
    ("void", TypeKind::Primitive, &[]),
    ("boolean", TypeKind::Primitive, &[]),
    ("int", TypeKind::Primitive, &[]),
    ("long", TypeKind::Primitive, &[]),
    ("double", TypeKind::Primitive, &[]),
];

/// Last dot-separated segment of a (possibly) qualified name.
pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Package part of a qualified name (empty for the default package).
pub fn package_of(name: &str) -> &str {
    name.rfind('.').map(|i| &name[..i]).unwrap_or("")
}

/// Compare a reference written by a user against a canonical qualified name.
/// Unqualified references compare against the simple name only.
pub fn name_refers_to(reference: &str, qualified: &str) -> bool {
    reference == qualified || (!reference.contains('.') && simple_name(qualified) == reference)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Primitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Package => "package",
            Visibility::Private => "private",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "package" => Some(Visibility::Package),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An annotation attached to a type or an operation, with its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRef {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl AnnotationRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an attribute (`value` is the conventional single attribute).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        self.attribute("value")
    }

    pub fn is(&self, reference: &str) -> bool {
        name_refers_to(reference, &self.name) || name_refers_to(&self.name, reference)
    }
}

impl fmt::Display for AnnotationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.attributes.is_empty() {
            let attrs = self
                .attributes
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "({attrs})")?;
        }
        Ok(())
    }
}

fn default_return_type() -> String {
    "void".to_string()
}

/// A declared operation as written in the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default = "default_return_type")]
    pub returns: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub annotations: Vec<AnnotationRef>,
    #[serde(default)]
    pub throws: Vec<String>,
    /// Final operations cannot be overridden by a subtype-based stand-in.
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: default_return_type(),
            visibility: Visibility::Public,
            annotations: Vec::new(),
            throws: Vec::new(),
            is_final: false,
        }
    }

    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.params.push(type_name.into());
        self
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.returns = type_name.into();
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn annotated(mut self, annotation: AnnotationRef) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn throws(mut self, type_name: impl Into<String>) -> Self {
        self.throws.push(type_name.into());
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    fn key(&self) -> OperationKey {
        OperationKey {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }
}

/// Everything the registry knows about one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    /// Direct supertypes: at most one class plus any number of interfaces.
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationRef>,
    /// Sealed types cannot be extended, so they cannot get a subtype-based stand-in.
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

impl TypeDescriptor {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            supertypes: Vec::new(),
            annotations: Vec::new(),
            sealed: false,
            methods: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn annotated(mut self, annotation: AnnotationRef) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn has_annotation(&self, reference: &str) -> bool {
        self.annotations.iter().any(|a| a.is(reference))
    }

    fn declares(&self, key: &OperationKey) -> Option<&MethodDecl> {
        self.methods
            .iter()
            .find(|m| m.name == key.name && m.params == key.params)
    }
}

/// Name plus parameter types: identifies an operation within a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub name: String,
    pub params: Vec<String>,
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|p| simple_name(p))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}({params})", self.name)
    }
}

/// Immutable description of one operation as seen through `owner_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// Type where the operation's implementation (or declaration) lives
    pub declaring_type: String,
    pub method_name: String,
    pub parameter_types: Vec<String>,
    pub return_type: String,
    pub annotations: Vec<AnnotationRef>,
    /// Type the signature was described through
    pub owner_type: String,
    pub visibility: Visibility,
    pub throws: Vec<String>,
    pub is_final: bool,
}

impl Signature {
    fn from_decl(owner: &str, declaring: &TypeDescriptor, decl: &MethodDecl) -> Self {
        Self {
            declaring_type: declaring.name.clone(),
            method_name: decl.name.clone(),
            parameter_types: decl.params.clone(),
            return_type: decl.returns.clone(),
            annotations: decl.annotations.clone(),
            owner_type: owner.to_string(),
            visibility: decl.visibility,
            throws: decl.throws.clone(),
            is_final: decl.is_final,
        }
    }

    pub fn key(&self) -> OperationKey {
        OperationKey {
            name: self.method_name.clone(),
            params: self.parameter_types.clone(),
        }
    }

    pub fn annotation(&self, reference: &str) -> Option<&AnnotationRef> {
        self.annotations.iter().find(|a| a.is(reference))
    }

    pub fn has_annotation(&self, reference: &str) -> bool {
        self.annotation(reference).is_some()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}",
            simple_name(&self.return_type),
            self.declaring_type,
            self.key()
        )
    }
}

/// Registration-time metadata table.
///
/// Built once through [`TypeRegistryBuilder`], then shared read-only.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDescriptor>,
    by_simple_name: HashMap<String, Vec<String>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry holding only the builtin types.
    pub fn new() -> Self {
        let mut registry = Self {
            types: BTreeMap::new(),
            by_simple_name: HashMap::new(),
        };
        for (name, kind, supers) in BUILTIN_TYPES {
            let mut desc = TypeDescriptor::new(*name, *kind);
            desc.supertypes = supers.iter().map(|s| s.to_string()).collect();
            desc.sealed = *kind == TypeKind::Primitive || *name == "String";
            registry.insert(desc);
        }
        registry
    }

    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    fn insert(&mut self, desc: TypeDescriptor) {
        self.by_simple_name
            .entry(simple_name(&desc.name).to_string())
            .or_default()
            .push(desc.name.clone());
        self.types.insert(desc.name.clone(), desc);
    }

    pub fn is_builtin(name: &str) -> bool {
        BUILTIN_TYPES.iter().any(|(builtin, _, _)| *builtin == name)
    }

    /// Resolve a qualified or simple name to the canonical qualified name.
    pub fn resolve(&self, name: &str) -> AopResult<&str> {
        if let Some((canonical, _)) = self.types.get_key_value(name) {
            return Ok(canonical.as_str());
        }
        if name.contains('.') {
            return Err(AopError::not_found("type", name));
        }
        match self.by_simple_name.get(name).map(Vec::as_slice) {
            Some([only]) => Ok(only.as_str()),
            Some([]) | None => Err(AopError::not_found("type", name)),
            Some(many) => Err(AopError::invalid_config(format!(
                "type name '{name}' is ambiguous: {}",
                many.join(", ")
            ))),
        }
    }

    pub fn lookup(&self, name: &str) -> AopResult<&TypeDescriptor> {
        let canonical = self.resolve(name)?;
        self.types
            .get(canonical)
            .ok_or_else(|| AopError::not_found("type", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// The type itself followed by its ancestors in method-resolution order:
    /// the superclass chain first, then interfaces breadth-first, then
    /// `Object` for anything that is not a primitive.
    pub fn lineage(&self, name: &str) -> Vec<&TypeDescriptor> {
        let Ok(start) = self.lookup(name) else {
            return Vec::new();
        };

        let mut order = Vec::new();
        let mut seen = HashSet::new();

        // class chain
        let mut current = Some(start);
        while let Some(desc) = current {
            if !seen.insert(desc.name.as_str()) {
                break;
            }
            order.push(desc);
            current = desc
                .supertypes
                .iter()
                .filter_map(|s| self.types.get(s))
                .find(|s| s.kind == TypeKind::Class);
        }

        // interfaces of everything collected so far
        let mut queue: VecDeque<&TypeDescriptor> = order.iter().copied().collect();
        while let Some(desc) = queue.pop_front() {
            for sup in desc.supertypes.iter().filter_map(|s| self.types.get(s)) {
                if sup.kind == TypeKind::Interface && seen.insert(sup.name.as_str()) {
                    order.push(sup);
                    queue.push_back(sup);
                }
            }
        }

        if start.kind != TypeKind::Primitive
            && seen.insert(OBJECT)
            && let Some(object) = self.types.get(OBJECT)
        {
            order.push(object);
        }
        order
    }

    /// Strict ancestors (lineage without the type itself).
    pub fn ancestors(&self, name: &str) -> Vec<&TypeDescriptor> {
        self.lineage(name).into_iter().skip(1).collect()
    }

    /// Whether a value of type `from` can be used where `to` is expected.
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        let (Ok(from), Ok(to)) = (self.resolve(from), self.resolve(to)) else {
            return false;
        };
        from == to || self.lineage(from).iter().any(|d| d.name == to)
    }

    /// User-defined interfaces a type implements, nearest first. An
    /// interface type lists itself first.
    pub fn interfaces_of(&self, name: &str) -> Vec<&TypeDescriptor> {
        self.lineage(name)
            .into_iter()
            .filter(|d| d.is_interface() && !Self::is_builtin(&d.name))
            .collect()
    }

    /// Describe the first operation called `method` visible on `type_name`,
    /// inherited ones included.
    pub fn describe(&self, type_name: &str, method: &str) -> AopResult<Signature> {
        let owner = self.resolve(type_name)?;
        self.lineage(owner)
            .into_iter()
            .find_map(|desc| {
                desc.methods
                    .iter()
                    .find(|m| m.name == method && (desc.name == owner || m.visibility != Visibility::Private))
                    .map(|m| Signature::from_decl(owner, desc, m))
            })
            .ok_or_else(|| AopError::not_found("operation", format!("{owner}.{method}")))
    }

    /// Describe a specific overload.
    pub fn describe_overload(
        &self,
        type_name: &str,
        method: &str,
        params: &[&str],
    ) -> AopResult<Signature> {
        let owner = self.resolve(type_name)?;
        let params = params
            .iter()
            .map(|p| self.resolve(p).map(str::to_string))
            .collect::<AopResult<Vec<_>>>()?;
        let key = OperationKey {
            name: method.to_string(),
            params,
        };
        self.lineage(owner)
            .into_iter()
            .find_map(|desc| {
                desc.declares(&key)
                    .filter(|m| desc.name == owner || m.visibility != Visibility::Private)
                    .map(|m| Signature::from_decl(owner, desc, m))
            })
            .ok_or_else(|| AopError::not_found("operation", format!("{owner}.{key}")))
    }

    /// Every operation visible on `type_name`, most specific declaration first.
    pub fn operations(&self, type_name: &str) -> AopResult<Vec<Signature>> {
        let owner = self.resolve(type_name)?;
        let mut seen = HashSet::new();
        let mut ops = Vec::new();
        for desc in self.lineage(owner) {
            for decl in &desc.methods {
                if desc.name != owner && decl.visibility == Visibility::Private {
                    continue;
                }
                if seen.insert(decl.key()) {
                    ops.push(Signature::from_decl(owner, desc, decl));
                }
            }
        }
        Ok(ops)
    }

    /// Types in the owner's lineage that declare the given operation.
    pub fn declarers_of(&self, owner: &str, key: &OperationKey) -> Vec<&str> {
        self.lineage(owner)
            .into_iter()
            .filter(|desc| desc.declares(key).is_some())
            .map(|desc| desc.name.as_str())
            .collect()
    }
}

/// Collects descriptors and validates them as a whole.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    pending: Vec<TypeDescriptor>,
}

impl TypeRegistryBuilder {
    pub fn register(mut self, desc: TypeDescriptor) -> Self {
        self.pending.push(desc);
        self
    }

    pub fn register_all(mut self, descs: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        self.pending.extend(descs);
        self
    }

    /// Insert everything, canonicalise type references and check the
    /// hierarchy is well formed.
    pub fn build(self) -> AopResult<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        for desc in self.pending {
            if desc.name.trim().is_empty() {
                return Err(AopError::invalid_config("type with empty name"));
            }
            if registry.types.contains_key(&desc.name) {
                return Err(AopError::invalid_config(format!(
                    "type '{}' registered twice",
                    desc.name
                )));
            }
            registry.insert(desc);
        }

        let names: Vec<String> = registry.types.keys().cloned().collect();
        for name in &names {
            let canonical = canonicalise(&registry, &registry.types[name])?;
            registry.types.insert(name.clone(), canonical);
        }

        for name in &names {
            check_hierarchy(&registry, &registry.types[name])?;
        }
        Ok(registry)
    }
}

fn canonicalise(registry: &TypeRegistry, desc: &TypeDescriptor) -> AopResult<TypeDescriptor> {
    let resolve = |n: &String| registry.resolve(n).map(str::to_string);

    let mut out = desc.clone();
    out.supertypes = desc.supertypes.iter().map(resolve).collect::<AopResult<_>>()?;
    // superclass first so the class chain can be walked in order
    out.supertypes.sort_by_key(|s| {
        registry
            .types
            .get(s)
            .map(|d| d.kind != TypeKind::Class)
            .unwrap_or(true)
    });
    for method in &mut out.methods {
        method.params = method.params.iter().map(resolve).collect::<AopResult<_>>()?;
        method.returns = resolve(&method.returns)?;
        method.throws = method.throws.iter().map(resolve).collect::<AopResult<_>>()?;
    }
    Ok(out)
}

fn check_hierarchy(registry: &TypeRegistry, desc: &TypeDescriptor) -> AopResult<()> {
    let supers: Vec<&TypeDescriptor> = desc
        .supertypes
        .iter()
        .filter_map(|s| registry.types.get(s))
        .collect();

    if supers.iter().any(|s| s.kind == TypeKind::Primitive) {
        return Err(AopError::invalid_config(format!(
            "type '{}' cannot extend a primitive",
            desc.name
        )));
    }
    let class_supers = supers.iter().filter(|s| s.kind == TypeKind::Class).count();
    match desc.kind {
        TypeKind::Interface if class_supers > 0 => {
            return Err(AopError::invalid_config(format!(
                "interface '{}' can only extend interfaces",
                desc.name
            )));
        }
        TypeKind::Class if class_supers > 1 => {
            return Err(AopError::invalid_config(format!(
                "class '{}' extends more than one class",
                desc.name
            )));
        }
        _ => {}
    }
    if let Some(sealed) = supers.iter().find(|s| s.sealed) {
        return Err(AopError::invalid_config(format!(
            "type '{}' extends sealed type '{}'",
            desc.name, sealed.name
        )));
    }

    // cycle check: walk all supertypes and make sure we never come back
    let mut stack: Vec<&str> = desc.supertypes.iter().map(String::as_str).collect();
    let mut visited = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == desc.name {
            return Err(AopError::invalid_config(format!(
                "type '{}' inherits from itself",
                desc.name
            )));
        }
        if visited.insert(current)
            && let Some(d) = registry.types.get(current)
        {
            stack.extend(d.supertypes.iter().map(String::as_str));
        }
    }
    Ok(())
}
