//! Selector pattern parsing for the non-structural strategies.

/// Virtual tokens recognized by the resolver.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum VirtualToken {
    Random,
    Visible,
    InViewport,
    First,
    Last,
    /// Zero-based index into the candidate set
    Nth(usize),
    Current,
    BrowserBack,
}

pub(crate) fn parse_virtual(selector: &str) -> Option<VirtualToken> {
    match selector {
        ":random" => Some(VirtualToken::Random),
        ":visible" => Some(VirtualToken::Visible),
        ":inviewport" => Some(VirtualToken::InViewport),
        ":first" => Some(VirtualToken::First),
        ":last" => Some(VirtualToken::Last),
        "current" => Some(VirtualToken::Current),
        "browser_back" => Some(VirtualToken::BrowserBack),
        other => other
            .strip_prefix(":nth(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|n| n.trim().parse::<usize>().ok())
            .map(VirtualToken::Nth),
    }
}

/// `text:"content"` pattern.
pub(crate) fn parse_text_pattern(selector: &str) -> Option<&str> {
    let body = selector.strip_prefix("text:")?.trim();
    body.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
}

/// `[attr="value"]` (exact) or `[attr*="value"]` (substring).
pub(crate) struct AttrPattern<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub substring: bool,
}

pub(crate) fn parse_attr_pattern(selector: &str) -> Option<AttrPattern<'_>> {
    let body = selector.strip_prefix('[')?.strip_suffix(']')?;
    let (lhs, rhs) = body.split_once('=')?;
    let value = rhs.trim().strip_prefix('"')?.strip_suffix('"')?;
    let (name, substring) = match lhs.trim().strip_suffix('*') {
        Some(name) => (name.trim(), true),
        None => (lhs.trim(), false),
    };
    if name.is_empty() {
        return None;
    }
    Some(AttrPattern {
        name,
        value,
        substring,
    })
}

/// `position(x,y[,tolerance])`, default tolerance 10px.
pub(crate) fn parse_position(selector: &str) -> Option<(f64, f64, f64)> {
    let body = selector.strip_prefix("position(")?.strip_suffix(')')?;
    let mut parts = body.split(',').map(str::trim);
    let x = parts.next()?.parse::<f64>().ok()?;
    let y = parts.next()?.parse::<f64>().ok()?;
    let tolerance = match parts.next() {
        Some(t) => t.parse::<f64>().ok()?,
        None => 10.0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((x, y, tolerance))
}

/// Split a comma-separated fallback list at top level, leaving commas inside
/// quotes, brackets and parens alone.
pub(crate) fn split_fallback_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0usize;

    for (i, ch) in selector.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '[' | '(' if !in_quotes => depth += 1,
            ']' | ')' if !in_quotes => depth = depth.saturating_sub(1),
            ',' if !in_quotes && depth == 0 => {
                parts.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(selector[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}
