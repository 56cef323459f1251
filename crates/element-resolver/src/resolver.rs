//! The resolution chain.

use std::sync::Arc;

use humanize::Entropy;
use meander_core_types::Point;
use page_adapter::{ElementHandle, ElementInfo, PageAdapter, PageError};
use tracing::{debug, warn};

use crate::strategies::{
    parse_attr_pattern, parse_position, parse_text_pattern, parse_virtual, split_fallback_list,
    VirtualToken,
};
use crate::{ResolveCtx, ResolveError, ResolveOptions, Resolved, ResolvedTarget, SelectorCache, Strategy};

/// Maps declarative selector strings to live elements.
pub struct ElementResolver {
    page: Arc<dyn PageAdapter>,
    entropy: Arc<Entropy>,
    cache: SelectorCache,
}

impl ElementResolver {
    pub fn new(page: Arc<dyn PageAdapter>, entropy: Arc<Entropy>) -> Self {
        Self {
            page,
            entropy,
            cache: SelectorCache::new(),
        }
    }

    /// Drop cached resolutions; called on page transitions.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Resolve to a single element (or the synthetic back target).
    pub async fn resolve(
        &self,
        selector: &str,
        ctx: ResolveCtx<'_>,
        opts: ResolveOptions,
    ) -> Result<Resolved, ResolveError> {
        let expanded = self.expand_alias(selector, ctx)?;

        if let Some(token) = parse_virtual(&expanded) {
            // A recognized token that matches nothing cannot be rescued by
            // the structural strategies; fail here.
            return self
                .resolve_virtual(token, &expanded, opts)
                .await?
                .ok_or_else(|| ResolveError::not_found(&expanded, Strategy::Virtual.name()));
        }

        if opts.use_cache {
            if let Some((handle, strategy)) = self.cache.get(&expanded) {
                if self.page.is_attached(&handle).await {
                    debug!(selector = %expanded, "resolver cache hit");
                    return Ok(Resolved {
                        target: ResolvedTarget::Element(handle),
                        strategy,
                        expanded,
                    });
                }
                debug!(selector = %expanded, "cached element detached, re-resolving");
                self.cache.invalidate(&expanded);
            }
        }

        match self.resolve_fresh(&expanded, opts).await? {
            Some((handle, strategy)) => {
                debug!(
                    selector = %expanded,
                    strategy = strategy.name(),
                    element = %handle,
                    "resolved element"
                );
                if opts.use_cache {
                    self.cache.insert(&expanded, handle.clone(), strategy);
                }
                Ok(Resolved {
                    target: ResolvedTarget::Element(handle),
                    strategy,
                    expanded,
                })
            }
            None => Err(ResolveError::not_found(
                &expanded,
                Strategy::Geometric.name(),
            )),
        }
    }

    /// Resolve to the ordered list of matches from the first strategy that
    /// yields any.
    pub async fn resolve_all(
        &self,
        selector: &str,
        ctx: ResolveCtx<'_>,
        opts: ResolveOptions,
    ) -> Result<Vec<ElementHandle>, ResolveError> {
        let expanded = self.expand_alias(selector, ctx)?;

        if let Some(token) = parse_virtual(&expanded) {
            return match self.resolve_virtual(token, &expanded, opts).await? {
                Some(Resolved {
                    target: ResolvedTarget::Element(handle),
                    ..
                }) => Ok(vec![handle]),
                _ => Ok(Vec::new()),
            };
        }

        let direct = self.query_filtered(&expanded, opts).await;
        if !direct.is_empty() {
            return Ok(direct);
        }

        let parts = split_fallback_list(&expanded);
        if parts.len() > 1 {
            for part in parts {
                let matches = self.query_filtered(part, opts).await;
                if !matches.is_empty() {
                    return Ok(matches);
                }
                if let Some((handle, _)) = self.content_strategies(part, opts).await? {
                    return Ok(vec![handle]);
                }
            }
            return Ok(Vec::new());
        }

        Ok(self
            .content_strategies(&expanded, opts)
            .await?
            .map(|(handle, _)| vec![handle])
            .unwrap_or_default())
    }

    /// Presence check used by action preconditions. Unknown references and
    /// adapter failures count as absent.
    pub async fn exists(&self, selector: &str, ctx: ResolveCtx<'_>) -> bool {
        match self.resolve(selector, ctx, ResolveOptions::uncached()).await {
            Ok(_) => true,
            Err(ResolveError::ElementNotFound { .. }) => false,
            Err(err) => {
                warn!(selector, %err, "presence check failed");
                false
            }
        }
    }

    fn expand_alias(&self, selector: &str, ctx: ResolveCtx<'_>) -> Result<String, ResolveError> {
        match selector.strip_prefix('@') {
            Some(name) => ctx
                .set
                .lookup(name, ctx.page)
                .map(str::to_string)
                .ok_or_else(|| ResolveError::UnknownGlobalSelector(name.to_string())),
            None => Ok(selector.to_string()),
        }
    }

    async fn resolve_fresh(
        &self,
        expanded: &str,
        opts: ResolveOptions,
    ) -> Result<Option<(ElementHandle, Strategy)>, ResolveError> {
        if let Some(handle) = self.query_filtered(expanded, opts).await.into_iter().next() {
            return Ok(Some((handle, Strategy::Direct)));
        }

        let parts = split_fallback_list(expanded);
        if parts.len() > 1 {
            for part in parts {
                if let Some(handle) = self.query_filtered(part, opts).await.into_iter().next() {
                    return Ok(Some((handle, Strategy::FallbackList)));
                }
                if let Some((handle, _)) = self.content_strategies(part, opts).await? {
                    return Ok(Some((handle, Strategy::FallbackList)));
                }
            }
            return Ok(None);
        }

        self.content_strategies(expanded, opts).await
    }

    /// Strategies 5-7: text content, attribute predicate, geometry.
    async fn content_strategies(
        &self,
        selector: &str,
        opts: ResolveOptions,
    ) -> Result<Option<(ElementHandle, Strategy)>, ResolveError> {
        if let Some(content) = parse_text_pattern(selector) {
            return Ok(self
                .match_by_text(content, opts)
                .await?
                .map(|handle| (handle, Strategy::Text)));
        }
        if let Some(pattern) = parse_attr_pattern(selector) {
            let scan = self.scan(opts).await?;
            let found = scan.into_iter().find(|(_, info)| {
                info.attributes.get(pattern.name).is_some_and(|v| {
                    if pattern.substring {
                        v.contains(pattern.value)
                    } else {
                        v == pattern.value
                    }
                })
            });
            return Ok(found.map(|(handle, _)| (handle, Strategy::Attribute)));
        }
        if let Some((x, y, tolerance)) = parse_position(selector) {
            let target = Point::new(x, y);
            let scan = self.scan(opts).await?;
            let found = scan
                .into_iter()
                .filter_map(|(handle, info)| {
                    let d = info.rect.center().distance_to(target);
                    (d <= tolerance).then_some((handle, d))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));
            return Ok(found.map(|(handle, _)| (handle, Strategy::Geometric)));
        }
        Ok(None)
    }

    /// Exact (trimmed) text match preferred; substring as a second pass over
    /// the content-matched set only when no exact match exists.
    async fn match_by_text(
        &self,
        content: &str,
        opts: ResolveOptions,
    ) -> Result<Option<ElementHandle>, ResolveError> {
        let scan = self.scan(opts).await?;
        let mut substring_match = None;
        for (handle, info) in scan {
            if info.text.trim() == content.trim() {
                return Ok(Some(handle));
            }
            if substring_match.is_none() && info.text.contains(content) {
                substring_match = Some(handle);
            }
        }
        Ok(substring_match)
    }

    async fn resolve_virtual(
        &self,
        token: VirtualToken,
        expanded: &str,
        opts: ResolveOptions,
    ) -> Result<Option<Resolved>, ResolveError> {
        let wrap = |handle: ElementHandle| Resolved {
            target: ResolvedTarget::Element(handle),
            strategy: Strategy::Virtual,
            expanded: expanded.to_string(),
        };

        let resolved = match token {
            VirtualToken::BrowserBack => {
                return Ok(Some(Resolved {
                    target: ResolvedTarget::BrowserBack,
                    strategy: Strategy::Virtual,
                    expanded: expanded.to_string(),
                }))
            }
            VirtualToken::Current => self.page.focused_element().await?.map(wrap),
            VirtualToken::Random => {
                let candidates = self.candidates(opts).await?;
                self.entropy.pick(&candidates).cloned().map(wrap)
            }
            VirtualToken::First => self.candidates(opts).await?.into_iter().next().map(wrap),
            VirtualToken::Last => self.candidates(opts).await?.into_iter().last().map(wrap),
            VirtualToken::Nth(n) => self.candidates(opts).await?.into_iter().nth(n).map(wrap),
            VirtualToken::Visible => {
                let mut found = None;
                for handle in self.candidates(opts).await? {
                    if self.info_of(&handle).await.is_some_and(|i| i.is_visible()) {
                        found = Some(wrap(handle));
                        break;
                    }
                }
                found
            }
            VirtualToken::InViewport => {
                let viewport = self.page.viewport().await?;
                let mut found = None;
                for handle in self.candidates(opts).await? {
                    if self
                        .info_of(&handle)
                        .await
                        .is_some_and(|i| i.is_visible() && i.is_in_viewport(&viewport))
                    {
                        found = Some(wrap(handle));
                        break;
                    }
                }
                found
            }
        };
        Ok(resolved)
    }

    /// Interactive candidate set for virtual tokens.
    async fn candidates(&self, opts: ResolveOptions) -> Result<Vec<ElementHandle>, ResolveError> {
        let handles = self.page.interactive_elements().await?;
        if !opts.require_visible {
            return Ok(handles);
        }
        let mut visible = Vec::with_capacity(handles.len());
        for handle in handles {
            if self.info_of(&handle).await.is_some_and(|i| i.is_visible()) {
                visible.push(handle);
            }
        }
        Ok(visible)
    }

    /// Direct structural query with optional visibility filtering. Query
    /// failures are soft misses so the chain can continue.
    async fn query_filtered(&self, selector: &str, opts: ResolveOptions) -> Vec<ElementHandle> {
        let handles = match self.page.query_all(selector).await {
            Ok(handles) => handles,
            Err(PageError::InvalidSelector(_)) => return Vec::new(),
            Err(err) => {
                warn!(selector, %err, "structural query failed");
                return Vec::new();
            }
        };
        if !opts.require_visible {
            return handles;
        }
        let mut visible = Vec::with_capacity(handles.len());
        for handle in handles {
            if self.info_of(&handle).await.is_some_and(|i| i.is_visible()) {
                visible.push(handle);
            }
        }
        visible
    }

    /// Snapshot every element for the content-scan strategies, skipping any
    /// that detach mid-scan.
    async fn scan(
        &self,
        opts: ResolveOptions,
    ) -> Result<Vec<(ElementHandle, ElementInfo)>, ResolveError> {
        let handles = self.page.all_elements().await?;
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(info) = self.info_of(&handle).await {
                if opts.require_visible && !info.is_visible() {
                    continue;
                }
                out.push((handle, info));
            }
        }
        Ok(out)
    }

    async fn info_of(&self, handle: &ElementHandle) -> Option<ElementInfo> {
        self.page.info(handle).await.ok()
    }
}
