use std::fmt;

use cfgdoc_path::Path;
use cfgdoc_types::{Node, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::registry::Registry;

// ---------------------------------------------------------------------------
// ResolverConfig
// ---------------------------------------------------------------------------

/// When stored reference paths are turned into loaded objects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Load each referenced object while binding, one hop deep.
    #[default]
    Eager,
    /// Leave paths in place; callers follow them on demand.
    Lazy,
}

/// What to do with a reference whose target does not exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Fail the bind with `UnresolvedReference`.
    #[default]
    Strict,
    /// Leave the field absent and record a diagnostic.
    Lenient,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub mode: ResolveMode,
    pub policy: ReferencePolicy,
}

impl ResolverConfig {
    pub fn lazy() -> Self {
        Self {
            mode: ResolveMode::Lazy,
            ..Self::default()
        }
    }

    pub fn lenient(mut self) -> Self {
        self.policy = ReferencePolicy::Lenient;
        self
    }
}

// ---------------------------------------------------------------------------
// ReferenceLoader
// ---------------------------------------------------------------------------

/// Source of referenced nodes during eager binding.
pub trait ReferenceLoader {
    /// The node stored at `path`, or `Ok(None)` if there is none.
    fn load(&self, path: &Path) -> Result<Option<Node>>;
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An extension entry whose class is not registered for its base.
    UnknownExtension { tag: String },
    /// A reference dropped under the lenient policy.
    UnresolvedReference { target: String },
}

/// A non-fatal problem found while binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Field location, `/`-separated, relative to the bound object.
    pub location: String,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::UnknownExtension { tag } => {
                write!(f, "{}: dropped unknown extension {tag}", self.location)
            }
            DiagnosticKind::UnresolvedReference { target } => {
                write!(f, "{}: dropped unresolved reference {target}", self.location)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BindContext
// ---------------------------------------------------------------------------

/// State threaded through one decode of a node tree.
pub struct BindContext<'a> {
    registry: &'a Registry,
    loader: Option<&'a dyn ReferenceLoader>,
    resolver: ResolverConfig,
    depth: usize,
    location: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> BindContext<'a> {
    /// A context without a loader: references stay as paths.
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            loader: None,
            resolver: ResolverConfig::default(),
            depth: 0,
            location: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_loader(mut self, loader: &'a dyn ReferenceLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn resolver(&self) -> ResolverConfig {
        self.resolver
    }

    /// The loader to use for a reference at the current depth. Only the
    /// top-level object has its references loaded.
    pub fn eager_loader(&self) -> Option<&'a dyn ReferenceLoader> {
        match self.resolver.mode {
            ResolveMode::Eager if self.depth == 0 => self.loader,
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn report(&mut self, kind: DiagnosticKind) {
        let diagnostic = Diagnostic {
            location: self.location.join("/"),
            kind,
        };
        warn!(diagnostic = %diagnostic, "bind diagnostic");
        self.diagnostics.push(diagnostic);
    }

    /// Run `f` with `segment` appended to the diagnostic location.
    pub(crate) fn within<T>(&mut self, segment: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.location.push(segment.to_string());
        let out = f(self);
        self.location.pop();
        out
    }

    /// Run `f` one reference hop deeper.
    pub(crate) fn hop<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }
}
