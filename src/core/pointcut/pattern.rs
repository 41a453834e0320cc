//! Building blocks of pointcut designators: type patterns, parameter-list
//! patterns and the full `execution(..)` pattern.
//!
//! A type pattern is a dot-separated list of wildcard segments. A single dot
//! separates package levels exactly; a double dot (`..`) stands for zero or
//! more whole segments. A pattern with a single segment is compared against
//! the simple name of a type, anything longer against the qualified name.
use std::fmt;

use crate::{
    core::signature::{Visibility, simple_name},
    utils::wildcard::Wildcard,
};

#[derive(Debug, Clone)]
enum Segment {
    Name(Wildcard),
    /// `..`
    AnyDepth,
}

/// Pattern over (qualified) type names.
#[derive(Debug, Clone)]
pub struct TypePattern {
    source: String,
    segments: Vec<Segment>,
}

impl TypePattern {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty type pattern".to_string());
        }

        let pieces: Vec<&str> = text.split('.').collect();
        let last = pieces.len() - 1;
        let mut segments = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.iter().enumerate() {
            if piece.is_empty() {
                if i == 0 || i == last || matches!(segments.last(), Some(Segment::AnyDepth)) {
                    return Err(format!("misplaced '.' in type pattern '{text}'"));
                }
                segments.push(Segment::AnyDepth);
            } else {
                segments.push(Segment::Name(Wildcard::new(piece)?));
            }
        }

        Ok(Self {
            source: text.to_string(),
            segments,
        })
    }

    /// `*` on its own.
    pub fn is_any(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::Name(w)] if w.is_any())
    }

    /// The type name this pattern spells out, if it has no wildcards at all.
    pub fn literal(&self) -> Option<&str> {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Name(w) if w.is_literal()))
            .then_some(self.source.as_str())
    }

    pub fn matches(&self, type_name: &str) -> bool {
        match self.segments.as_slice() {
            [Segment::Name(w)] => w.matches(simple_name(type_name)),
            segments => {
                let parts: Vec<&str> = type_name.split('.').collect();
                match_segments(segments, &parts)
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn match_segments(pattern: &[Segment], name: &[&str]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=name.len()).any(|skip| match_segments(rest, &name[skip..]))
        }
        Some((Segment::Name(w), rest)) => name
            .split_first()
            .is_some_and(|(head, tail)| w.matches(head) && match_segments(rest, tail)),
    }
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One element of a parameter-list pattern.
#[derive(Debug, Clone)]
pub enum ParamElem {
    /// `*`: exactly one parameter of any type
    Any,
    /// `..`: any number of parameters of any type
    AnyRun,
    Type(TypePattern),
}

/// Pattern over an ordered parameter (or argument) list.
#[derive(Debug, Clone)]
pub struct ParamPattern {
    source: String,
    elems: Vec<ParamElem>,
}

impl ParamPattern {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let mut elems = Vec::new();
        if !text.is_empty() {
            for piece in text.split(',').map(str::trim) {
                let elem = match piece {
                    "" => return Err(format!("empty element in parameter list '({text})'")),
                    ".." => ParamElem::AnyRun,
                    "*" => ParamElem::Any,
                    other => ParamElem::Type(TypePattern::parse(other)?),
                };
                elems.push(elem);
            }
        }
        Ok(Self {
            source: text.to_string(),
            elems,
        })
    }

    pub fn elems(&self) -> &[ParamElem] {
        &self.elems
    }

    /// Match a list of `count` items, deciding typed elements with `accepts`
    /// (called with the element's type pattern and the item index).
    pub fn matches_with<F>(&self, count: usize, accepts: F) -> bool
    where
        F: Fn(&TypePattern, usize) -> bool,
    {
        match_params(&self.elems, 0, count, &accepts)
    }

    /// Exact match against declared parameter types.
    pub fn matches(&self, params: &[String]) -> bool {
        self.matches_with(params.len(), |pattern, i| pattern.matches(&params[i]))
    }

    /// Whether a list of `count` items could match at all.
    pub fn accepts_arity(&self, count: usize) -> bool {
        self.matches_with(count, |_, _| true)
    }

    /// Copy of this pattern with the element at `index` swapped out.
    pub fn replace(&self, index: usize, elem: ParamElem) -> Self {
        let mut elems = self.elems.clone();
        if let Some(slot) = elems.get_mut(index) {
            *slot = elem;
        }
        let source = elems
            .iter()
            .map(|e| match e {
                ParamElem::Any => "*",
                ParamElem::AnyRun => "..",
                ParamElem::Type(pattern) => pattern.as_str(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self { source, elems }
    }
}

fn match_params<F>(elems: &[ParamElem], index: usize, count: usize, accepts: &F) -> bool
where
    F: Fn(&TypePattern, usize) -> bool,
{
    match elems.split_first() {
        None => index == count,
        Some((ParamElem::AnyRun, rest)) => {
            (index..=count).any(|next| match_params(rest, next, count, accepts))
        }
        Some((ParamElem::Any, rest)) => index < count && match_params(rest, index + 1, count, accepts),
        Some((ParamElem::Type(pattern), rest)) => {
            index < count && accepts(pattern, index) && match_params(rest, index + 1, count, accepts)
        }
    }
}

impl fmt::Display for ParamPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.source)
    }
}

/// `[modifier] return-type [declaring-type.]name(params) [throws T, ..]`
#[derive(Debug, Clone)]
pub struct ExecutionPattern {
    pub modifier: Option<Visibility>,
    pub return_type: TypePattern,
    pub declaring_type: Option<TypePattern>,
    pub name: Wildcard,
    pub params: ParamPattern,
    pub throws: Vec<TypePattern>,
}

impl ExecutionPattern {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| "execution pattern needs a parameter list".to_string())?;
        let close = text[open..]
            .find(')')
            .map(|i| open + i)
            .ok_or_else(|| "unclosed parameter list".to_string())?;

        let head: Vec<&str> = text[..open].split_whitespace().collect();
        let (modifier, return_type, qualified_name) = match head.as_slice() {
            [ret, name] => (None, *ret, *name),
            [modifier, ret, name] => {
                let modifier = Visibility::parse(modifier)
                    .ok_or_else(|| format!("unknown modifier '{modifier}'"))?;
                (Some(modifier), *ret, *name)
            }
            _ => {
                return Err(format!(
                    "expected '[modifier] return-type name(params)', got '{}'",
                    text[..open].trim()
                ));
            }
        };

        let (declaring_type, name) = match qualified_name.rfind('.') {
            None => (None, qualified_name),
            Some(dot) => {
                let (type_part, name) = (&qualified_name[..dot], &qualified_name[dot + 1..]);
                // `pkg..name` means any type in pkg or below
                let type_pattern = if type_part.ends_with('.') {
                    TypePattern::parse(&format!("{type_part}.*"))?
                } else {
                    TypePattern::parse(type_part)?
                };
                (Some(type_pattern), name)
            }
        };

        let throws = match text[close + 1..].trim() {
            "" => Vec::new(),
            tail => {
                let list = tail
                    .strip_prefix("throws")
                    .filter(|rest| rest.starts_with(char::is_whitespace))
                    .ok_or_else(|| format!("unexpected '{tail}' after parameter list"))?;
                list.split(',')
                    .map(TypePattern::parse)
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self {
            modifier,
            return_type: TypePattern::parse(return_type)?,
            declaring_type,
            name: Wildcard::new(name)?,
            params: ParamPattern::parse(&text[open + 1..close])?,
            throws,
        })
    }
}

impl fmt::Display for ExecutionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(modifier) = self.modifier {
            write!(f, "{modifier} ")?;
        }
        write!(f, "{} ", self.return_type)?;
        if let Some(declaring) = &self.declaring_type {
            write!(f, "{declaring}.")?;
        }
        write!(f, "{}{}", self.name, self.params)?;
        if !self.throws.is_empty() {
            let throws = self.throws.iter().map(|t| t.as_str()).collect::<Vec<_>>();
            write!(f, " throws {}", throws.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment_matches_simple_name() {
        let p = TypePattern::parse("MemberServiceImpl").unwrap();
        assert!(p.matches("hello.aop.member.MemberServiceImpl"));
        assert!(p.matches("MemberServiceImpl"));
        assert!(!p.matches("hello.aop.member.MemberService"));
    }

    #[test]
    fn test_single_dot_is_exact_package_level() {
        let p = TypePattern::parse("hello.aop.member.*").unwrap();
        assert!(p.matches("hello.aop.member.MemberServiceImpl"));
        let p = TypePattern::parse("hello.aop.*").unwrap();
        assert!(!p.matches("hello.aop.member.MemberServiceImpl"));
    }

    #[test]
    fn test_double_dot_spans_sub_packages() {
        let p = TypePattern::parse("hello.aop..*").unwrap();
        assert!(p.matches("hello.aop.member.MemberServiceImpl"));
        assert!(p.matches("hello.aop.Thing"));
        assert!(!p.matches("hello.other.Thing"));
        let p = TypePattern::parse("hello.aop.member..*").unwrap();
        assert!(p.matches("hello.aop.member.MemberServiceImpl"));
    }

    #[test]
    fn test_misplaced_dots_rejected() {
        assert!(TypePattern::parse("..Thing").is_err());
        assert!(TypePattern::parse("a.").is_err());
        assert!(TypePattern::parse("a...b").is_err());
    }

    #[test]
    fn test_literal() {
        assert_eq!(TypePattern::parse("a.B").unwrap().literal(), Some("a.B"));
        assert_eq!(TypePattern::parse("a.*").unwrap().literal(), None);
        assert_eq!(TypePattern::parse("a..B").unwrap().literal(), None);
    }

    #[test]
    fn test_param_patterns() {
        let one_string = vec!["String".to_string()];
        assert!(ParamPattern::parse("String").unwrap().matches(&one_string));
        assert!(ParamPattern::parse("*").unwrap().matches(&one_string));
        assert!(ParamPattern::parse("..").unwrap().matches(&one_string));
        assert!(ParamPattern::parse("String, ..").unwrap().matches(&one_string));
        assert!(!ParamPattern::parse("").unwrap().matches(&one_string));
        assert!(!ParamPattern::parse("Object").unwrap().matches(&one_string));

        let two = vec!["String".to_string(), "int".to_string()];
        assert!(ParamPattern::parse("String, *").unwrap().matches(&two));
        assert!(ParamPattern::parse("String, ..").unwrap().matches(&two));
        assert!(!ParamPattern::parse("*").unwrap().matches(&two));
        assert!(ParamPattern::parse("..").unwrap().accepts_arity(0));
    }

    #[test]
    fn test_execution_full_form() {
        let p = ExecutionPattern::parse(
            "public String hello.aop.member.MemberServiceImpl.hello(String) throws IllegalStateException",
        )
        .unwrap();
        assert_eq!(p.modifier, Some(Visibility::Public));
        assert_eq!(p.declaring_type.as_ref().unwrap().as_str(), "hello.aop.member.MemberServiceImpl");
        assert_eq!(p.name.as_str(), "hello");
        assert_eq!(p.throws.len(), 1);
    }

    #[test]
    fn test_execution_package_shorthand() {
        let p = ExecutionPattern::parse("* hello.aop..*(..)").unwrap();
        let declaring = p.declaring_type.unwrap();
        assert_eq!(declaring.as_str(), "hello.aop..*");
        assert!(declaring.matches("hello.aop.order.OrderService"));
        assert!(p.name.is_any());
    }

    #[test]
    fn test_execution_rejects_malformed() {
        assert!(ExecutionPattern::parse("* hello").is_err());
        assert!(ExecutionPattern::parse("hello(..)").is_err());
        assert!(ExecutionPattern::parse("weird * hello(..)").is_err());
        assert!(ExecutionPattern::parse("* hello(..) extra").is_err());
    }
}
