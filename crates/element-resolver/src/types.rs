//! Resolution request/response types.

use meander_core_types::PageType;
use meander_scenario::SelectorSet;
use page_adapter::ElementHandle;

/// Strategy that produced a resolution, in chain order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    Virtual,
    Direct,
    FallbackList,
    Text,
    Attribute,
    Geometric,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Virtual => "virtual",
            Strategy::Direct => "direct",
            Strategy::FallbackList => "fallback-list",
            Strategy::Text => "text",
            Strategy::Attribute => "attribute",
            Strategy::Geometric => "geometric",
        }
    }
}

/// What a selector resolved to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolvedTarget {
    Element(ElementHandle),
    /// Synthetic back-navigation target (`browser_back`); the interpreter
    /// maps interaction with it to a history step.
    BrowserBack,
}

/// Successful resolution.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub target: ResolvedTarget,
    pub strategy: Strategy,
    /// Selector after alias expansion, the cache key
    pub expanded: String,
}

impl Resolved {
    pub fn handle(&self) -> Option<&ElementHandle> {
        match &self.target {
            ResolvedTarget::Element(handle) => Some(handle),
            ResolvedTarget::BrowserBack => None,
        }
    }
}

/// Selector-set context for one resolution.
#[derive(Clone, Copy)]
pub struct ResolveCtx<'a> {
    pub set: &'a SelectorSet,
    pub page: Option<&'a PageType>,
}

impl<'a> ResolveCtx<'a> {
    pub fn new(set: &'a SelectorSet, page: Option<&'a PageType>) -> Self {
        Self { set, page }
    }
}

/// Per-call resolution options.
#[derive(Clone, Copy, Debug)]
pub struct ResolveOptions {
    /// Restrict candidates to visible elements
    pub require_visible: bool,
    /// Consult and populate the result cache
    pub use_cache: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            require_visible: false,
            use_cache: true,
        }
    }
}

impl ResolveOptions {
    pub fn visible() -> Self {
        Self {
            require_visible: true,
            ..Self::default()
        }
    }

    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            ..Self::default()
        }
    }
}
