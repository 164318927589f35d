//! Bracketed filters used by search expressions.

use std::fmt;

use cfgdoc_types::Node;

use crate::lexer::write_atom;

/// A filter evaluated against a candidate object node.
///
/// Fields are looked up as direct children of the candidate. When the field
/// holds a list, the predicate holds if any element satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `[field='value']`
    Eq { field: String, value: String },
    /// `[field!='value']`
    Ne { field: String, value: String },
    /// `[contains(field,'needle')]`
    Contains { field: String, needle: String },
    /// `[starts-with(field,'prefix')]`
    StartsWith { field: String, prefix: String },
    /// `[field]`
    Exists { field: String },
}

impl Predicate {
    /// Build a function-style predicate from its name and arguments.
    pub(crate) fn function(name: &str, mut args: Vec<String>) -> Result<Self, String> {
        if args.len() != 2 {
            return Err(format!("{name}() takes 2 arguments, got {}", args.len()));
        }
        let second = args.pop().unwrap_or_default();
        let field = args.pop().unwrap_or_default();
        match name {
            "contains" => Ok(Predicate::Contains {
                field,
                needle: second,
            }),
            "starts-with" => Ok(Predicate::StartsWith {
                field,
                prefix: second,
            }),
            other => Err(format!("unknown predicate function {other}()")),
        }
    }

    /// The child field this predicate inspects.
    pub fn field(&self) -> &str {
        match self {
            Predicate::Eq { field, .. }
            | Predicate::Ne { field, .. }
            | Predicate::Contains { field, .. }
            | Predicate::StartsWith { field, .. }
            | Predicate::Exists { field } => field,
        }
    }

    /// Evaluate against a candidate node. Non-object candidates never match.
    pub fn matches(&self, candidate: &Node) -> bool {
        let Some(map) = candidate.as_obj() else {
            return false;
        };
        let value = map.get(self.field());
        match self {
            Predicate::Exists { .. } => value.is_some_and(|v| !v.is_null()),
            Predicate::Eq { value: expected, .. } => any_scalar(value, |s| s == expected),
            Predicate::Ne { value: expected, .. } => !any_scalar(value, |s| s == expected),
            Predicate::Contains { needle, .. } => any_scalar(value, |s| s.contains(needle.as_str())),
            Predicate::StartsWith { prefix, .. } => {
                any_scalar(value, |s| s.starts_with(prefix.as_str()))
            }
        }
    }
}

fn any_scalar(node: Option<&Node>, test: impl Fn(&str) -> bool) -> bool {
    match node {
        Some(Node::List(items)) => items
            .iter()
            .filter_map(Node::scalar_text)
            .any(|s| test(&s)),
        Some(other) => other.scalar_text().is_some_and(|s| test(&s)),
        None => false,
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        match self {
            Predicate::Eq { field, value } => {
                write_atom(f, field)?;
                f.write_str("=")?;
                write_quoted(f, value)?;
            }
            Predicate::Ne { field, value } => {
                write_atom(f, field)?;
                f.write_str("!=")?;
                write_quoted(f, value)?;
            }
            Predicate::Contains { field, needle } => {
                f.write_str("contains(")?;
                write_atom(f, field)?;
                f.write_str(",")?;
                write_quoted(f, needle)?;
                f.write_str(")")?;
            }
            Predicate::StartsWith { field, prefix } => {
                f.write_str("starts-with(")?;
                write_atom(f, field)?;
                f.write_str(",")?;
                write_quoted(f, prefix)?;
                f.write_str(")")?;
            }
            Predicate::Exists { field } => write_atom(f, field)?,
        }
        f.write_str("]")
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(aet: &str) -> Node {
        Node::obj([
            ("aet", Node::from(aet)),
            (
                "aliases",
                Node::List(vec![Node::from("STORESCP"), Node::from("QRSCP")]),
            ),
            ("port", Node::from(104)),
        ])
    }

    #[test]
    fn equality_compares_scalar_text() {
        let dev = device("DCM4CHEE");
        assert!(Predicate::Eq {
            field: "aet".into(),
            value: "DCM4CHEE".into()
        }
        .matches(&dev));
        assert!(Predicate::Eq {
            field: "port".into(),
            value: "104".into()
        }
        .matches(&dev));
        assert!(Predicate::Ne {
            field: "aet".into(),
            value: "OTHER".into()
        }
        .matches(&dev));
    }

    #[test]
    fn list_fields_match_any_element() {
        let dev = device("A");
        assert!(Predicate::Eq {
            field: "aliases".into(),
            value: "QRSCP".into()
        }
        .matches(&dev));
        assert!(Predicate::Contains {
            field: "aliases".into(),
            needle: "STORE".into()
        }
        .matches(&dev));
    }

    #[test]
    fn missing_field_and_scalar_candidates() {
        let dev = device("A");
        assert!(!Predicate::Exists {
            field: "missing".into()
        }
        .matches(&dev));
        assert!(!Predicate::Exists { field: "aet".into() }.matches(&Node::from("aet")));
    }

    #[test]
    fn unknown_function_is_rejected() {
        assert!(Predicate::function("ends-with", vec!["a".into(), "b".into()]).is_err());
        assert!(Predicate::function("contains", vec!["a".into()]).is_err());
    }

    #[test]
    fn display_forms() {
        let p = Predicate::StartsWith {
            field: "title".into(),
            prefix: "it's".into(),
        };
        assert_eq!(p.to_string(), "[starts-with(title,'it''s')]");
    }
}
