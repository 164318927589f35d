//! Wildcard and predicate queries over node trees.
//!
//! A [`SearchExpr`] extends the path syntax with `*` (any child), `**`
//! (any depth, including zero) and bracketed predicates:
//!
//! ```text
//! /devices/*[aet='DCM4CHEE']/connections/0
//! /**[contains(title,'archive')]
//! /devices/*/extensions/*[starts-with(cn,'hl7')]
//! ```
//!
//! Evaluation is a full traversal. Matches are produced lazily in document
//! order (the order object entries and list elements were written); sibling
//! ties are never re-sorted.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cfgdoc_types::{ConfigError, Node, Result};

use crate::lexer::{write_atom, Cursor, Head};
use crate::path::{Path, PathSegment};
use crate::predicate::Predicate;

/// How one step of a search selects children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// A named child of an object.
    Key(String),
    /// A list element by 0-based position.
    Index(usize),
    /// The first child object whose field `key` equals `value`.
    First { key: String, value: String },
    /// Every child of an object or list.
    Any,
    /// The node itself and all of its descendants.
    Descendants,
}

/// A selector plus the predicates every selected node must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub selector: Selector,
    pub predicates: Vec<Predicate>,
}

impl Step {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            predicates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    fn accepts(&self, node: &Node) -> bool {
        self.predicates.iter().all(|p| p.matches(node))
    }
}

/// A parsed search expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SearchExpr {
    steps: Vec<Step>,
}

impl SearchExpr {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut cursor = Cursor::new(text);
        cursor.expect('/')?;
        let mut steps = Vec::new();
        if cursor.at_end() {
            return Ok(Self { steps });
        }
        loop {
            let raw = cursor.segment()?;
            let selector = match raw.head {
                Head::Atom(atom) if !atom.quoted && atom.text.chars().all(|c| c.is_ascii_digit()) => {
                    let i = atom
                        .text
                        .parse::<usize>()
                        .map_err(|e| ConfigError::malformed_path(text, e.to_string()))?;
                    Selector::Index(i)
                }
                Head::Atom(atom) => Selector::Key(atom.text),
                Head::Pair(key, value) => Selector::First {
                    key: key.text,
                    value: value.text,
                },
                Head::Wildcard => Selector::Any,
                Head::Descendants => Selector::Descendants,
            };
            steps.push(Step {
                selector,
                predicates: raw.predicates,
            });
            if cursor.at_end() {
                break;
            }
            cursor.expect('/')?;
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Lazily evaluate against `root`. Each call starts a fresh traversal.
    pub fn evaluate<'a>(&'a self, root: &'a Node) -> Matches<'a> {
        Matches {
            steps: &self.steps,
            stack: vec![Frame {
                node: root,
                path: Path::root(),
                step: 0,
            }],
        }
    }

    /// The expression as a plain path, if it uses no wildcards or brackets.
    pub fn as_path(&self) -> Option<Path> {
        self.steps
            .iter()
            .map(|step| {
                if !step.predicates.is_empty() {
                    return None;
                }
                match &step.selector {
                    Selector::Key(k) => Some(PathSegment::Key(k.clone())),
                    Selector::Index(i) => Some(PathSegment::Index(*i)),
                    Selector::First { key, value } => Some(PathSegment::Predicate {
                        key: key.clone(),
                        value: value.clone(),
                    }),
                    Selector::Any | Selector::Descendants => None,
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(Path::from_segments)
    }
}

impl From<&Path> for SearchExpr {
    fn from(path: &Path) -> Self {
        let steps = path
            .segments()
            .iter()
            .map(|segment| {
                Step::new(match segment {
                    PathSegment::Key(k) => Selector::Key(k.clone()),
                    PathSegment::Index(i) => Selector::Index(*i),
                    PathSegment::Predicate { key, value } => Selector::First {
                        key: key.clone(),
                        value: value.clone(),
                    },
                })
            })
            .collect();
        Self { steps }
    }
}

impl FromStr for SearchExpr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        SearchExpr::parse(s)
    }
}

impl fmt::Display for SearchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            f.write_str("/")?;
            match &step.selector {
                Selector::Key(k) => write_atom(f, k)?,
                Selector::Index(i) => write!(f, "{i}")?,
                Selector::First { key, value } => {
                    write_atom(f, key)?;
                    f.write_str("=")?;
                    write_atom(f, value)?;
                }
                Selector::Any => f.write_str("*")?,
                Selector::Descendants => f.write_str("**")?,
            }
            for predicate in &step.predicates {
                write!(f, "{predicate}")?;
            }
        }
        Ok(())
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch<'a> {
    /// Canonical location of the hit (keys and indices only).
    pub path: Path,
    pub node: &'a Node,
}

struct Frame<'a> {
    node: &'a Node,
    path: Path,
    step: usize,
}

/// Lazy depth-first iterator over search hits.
///
/// Not resumable once dropped; restart by calling
/// [`SearchExpr::evaluate`] again.
pub struct Matches<'a> {
    steps: &'a [Step],
    stack: Vec<Frame<'a>>,
}

impl<'a> Matches<'a> {
    fn children(node: &'a Node, path: &Path) -> Vec<(&'a Node, Path)> {
        match node {
            Node::Obj(map) => map.iter().map(|(k, v)| (v, path.child(k.clone()))).collect(),
            Node::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (v, path.index(i)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl<'a> Iterator for Matches<'a> {
    type Item = SearchMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            if frame.step == self.steps.len() {
                return Some(SearchMatch {
                    path: frame.path,
                    node: frame.node,
                });
            }

            let step = &self.steps[frame.step];
            let mut next: Vec<Frame<'a>> = Vec::new();
            match &step.selector {
                Selector::Key(key) => {
                    if let Some(child) = frame.node.get(key) {
                        if step.accepts(child) {
                            next.push(Frame {
                                node: child,
                                path: frame.path.child(key.clone()),
                                step: frame.step + 1,
                            });
                        }
                    }
                }
                Selector::Index(i) => {
                    if let Some(child) = frame.node.as_list().and_then(|items| items.get(*i)) {
                        if step.accepts(child) {
                            next.push(Frame {
                                node: child,
                                path: frame.path.index(*i),
                                step: frame.step + 1,
                            });
                        }
                    }
                }
                Selector::First { key, value } => {
                    let first = Self::children(frame.node, &frame.path)
                        .into_iter()
                        .find(|(child, _)| {
                            child
                                .get(key)
                                .and_then(Node::scalar_text)
                                .is_some_and(|text| &text == value)
                        });
                    if let Some((child, path)) = first {
                        if step.accepts(child) {
                            next.push(Frame {
                                node: child,
                                path,
                                step: frame.step + 1,
                            });
                        }
                    }
                }
                Selector::Any => {
                    for (child, path) in Self::children(frame.node, &frame.path) {
                        if step.accepts(child) {
                            next.push(Frame {
                                node: child,
                                path,
                                step: frame.step + 1,
                            });
                        }
                    }
                }
                Selector::Descendants => {
                    if step.accepts(frame.node) {
                        next.push(Frame {
                            node: frame.node,
                            path: frame.path.clone(),
                            step: frame.step + 1,
                        });
                    }
                    for (child, path) in Self::children(frame.node, &frame.path) {
                        next.push(Frame {
                            node: child,
                            path,
                            step: frame.step,
                        });
                    }
                }
            }
            // Reverse so the first child in document order is popped first.
            self.stack.extend(next.into_iter().rev());
        }
        None
    }
}

/// Search results over an owned snapshot of a document.
///
/// Storage backends hand these out so callers can iterate without holding a
/// lock. Every call to [`SearchResults::iter`] restarts from scratch.
#[derive(Debug, Clone)]
pub struct SearchResults {
    root: Arc<Node>,
    expr: SearchExpr,
}

impl SearchResults {
    pub fn new(root: Arc<Node>, expr: SearchExpr) -> Self {
        Self { root, expr }
    }

    pub fn iter(&self) -> Matches<'_> {
        self.expr.evaluate(&self.root)
    }

    pub fn expr(&self) -> &SearchExpr {
        &self.expr
    }

    /// Collect matching paths.
    pub fn paths(&self) -> Vec<Path> {
        self.iter().map(|m| m.path).collect()
    }

    /// Collect owned copies of the matching nodes.
    pub fn nodes(&self) -> Vec<Node> {
        self.iter().map(|m| m.node.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a SearchResults {
    type Item = SearchMatch<'a>;
    type IntoIter = Matches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
