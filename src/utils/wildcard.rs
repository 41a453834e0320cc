//! Glob-style wildcard compilation shared by name, type-segment and bean
//! patterns.
//!
//! Only `*` is special: it matches any run of characters that does not cross
//! a package separator (bean patterns excepted). Everything else is matched
//! literally.
use regex::Regex;

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '[' | ']')
}

/// A compiled single-segment wildcard pattern.
#[derive(Debug, Clone)]
pub struct Wildcard {
    source: String,
    kind: WildcardKind,
}

#[derive(Debug, Clone)]
enum WildcardKind {
    /// `*` on its own
    Any,
    /// No `*` at all; compared with `==`
    Literal,
    Regex(Regex),
}

impl Wildcard {
    /// Compile a wildcard. Returns an error message if the pattern contains
    /// characters that can never form part of an identifier.
    pub fn new(pattern: &str) -> Result<Self, String> {
        Self::compile(pattern, is_identifier_char, r"[^.]*")
    }

    /// Compile a bean-name wildcard. Bean names may also contain `-` and
    /// `.`, and `*` matches any run of characters including dots.
    pub fn bean(pattern: &str) -> Result<Self, String> {
        Self::compile(
            pattern,
            |c| is_identifier_char(c) || matches!(c, '-' | '.'),
            ".*",
        )
    }

    fn compile(pattern: &str, allowed: fn(char) -> bool, star: &str) -> Result<Self, String> {
        if pattern.is_empty() {
            return Err("empty name pattern".to_string());
        }
        if let Some(bad) = pattern.chars().find(|c| *c != '*' && !allowed(*c)) {
            return Err(format!("unexpected character '{bad}' in name pattern '{pattern}'"));
        }

        let kind = if pattern == "*" {
            WildcardKind::Any
        } else if !pattern.contains('*') {
            WildcardKind::Literal
        } else {
            let body = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(star);
            let regex = Regex::new(&format!("^{body}$"))
                .map_err(|e| format!("invalid name pattern '{pattern}': {e}"))?;
            WildcardKind::Regex(regex)
        };

        Ok(Self {
            source: pattern.to_string(),
            kind,
        })
    }

    /// Whether this pattern accepts `candidate`.
    pub fn matches(&self, candidate: &str) -> bool {
        match &self.kind {
            WildcardKind::Any => true,
            WildcardKind::Literal => self.source == candidate,
            WildcardKind::Regex(regex) => regex.is_match(candidate),
        }
    }

    /// `true` for the bare `*` pattern.
    pub fn is_any(&self) -> bool {
        matches!(self.kind, WildcardKind::Any)
    }

    /// `true` when the pattern contains no `*`.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, WildcardKind::Literal)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for Wildcard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_matches_everything() {
        let w = Wildcard::new("*").unwrap();
        assert!(w.is_any());
        assert!(w.matches("hello"));
        assert!(w.matches(""));
    }

    #[test]
    fn test_literal_is_exact() {
        let w = Wildcard::new("hello").unwrap();
        assert!(w.is_literal());
        assert!(w.matches("hello"));
        assert!(!w.matches("hello2"));
    }

    #[test]
    fn test_prefix_suffix_and_infix() {
        assert!(Wildcard::new("hel*").unwrap().matches("hello"));
        assert!(Wildcard::new("*el*").unwrap().matches("hello"));
        assert!(Wildcard::new("*Service").unwrap().matches("OrderService"));
        assert!(!Wildcard::new("*Service").unwrap().matches("OrderRepository"));
    }

    #[test]
    fn test_star_does_not_cross_package_separator() {
        let w = Wildcard::new("a*b").unwrap();
        assert!(w.matches("axxb"));
        assert!(!w.matches("ax.xb"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Wildcard::new("").is_err());
        assert!(Wildcard::new("he(llo").is_err());
    }

    #[test]
    fn test_bean_patterns_allow_dashes_and_dots() {
        let w = Wildcard::bean("order-service").unwrap();
        assert!(w.is_literal());
        assert!(w.matches("order-service"));

        let w = Wildcard::bean("order.*").unwrap();
        assert!(w.matches("order.repository.v2"));
        assert!(!w.matches("orders"));

        assert!(Wildcard::new("order-service").is_err());
        assert!(Wildcard::bean("order service").is_err());
    }
}
