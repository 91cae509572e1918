use crate::model::{Named, ScanEngine, ScanPolicy};
use comfy_table::{presets::ASCII_FULL, Table};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Selects one resource out of an enumeration.
#[derive(Clone)]
pub enum Matcher {
    /// Case-sensitive substring of the display name.
    NameContains(String),
    /// Exact identifier.
    Id(String),
    Pattern(Regex),
    Custom(Arc<dyn Fn(&dyn Named) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn name_contains(pattern: impl Into<String>) -> Self {
        Matcher::NameContains(pattern.into())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&dyn Named) -> bool + Send + Sync + 'static,
    {
        Matcher::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, item: &dyn Named) -> bool {
        match self {
            Matcher::NameContains(pattern) => item.name().contains(pattern.as_str()),
            Matcher::Id(id) => item.id() == id,
            Matcher::Pattern(regex) => regex.is_match(item.name()),
            Matcher::Custom(predicate) => predicate(item),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::NameContains(pattern) => write!(f, "NameContains({pattern:?})"),
            Matcher::Id(id) => write!(f, "Id({id:?})"),
            Matcher::Pattern(regex) => write!(f, "Pattern({:?})", regex.as_str()),
            Matcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::NameContains(pattern) => write!(f, "name containing '{pattern}'"),
            Matcher::Id(id) => write!(f, "id '{id}'"),
            Matcher::Pattern(regex) => write!(f, "name matching /{}/", regex.as_str()),
            Matcher::Custom(_) => f.write_str("custom predicate"),
        }
    }
}

/// `id:<id>` and `re:<regex>` select those matchers, anything else is a
/// name substring.
impl FromStr for Matcher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("id:") {
            let id = id.trim();
            if id.is_empty() {
                return Err("empty id matcher".to_string());
            }
            return Ok(Matcher::Id(id.to_string()));
        }
        if let Some(pattern) = s.strip_prefix("re:") {
            return Regex::new(pattern)
                .map(Matcher::Pattern)
                .map_err(|err| format!("invalid pattern '{pattern}': {err}"));
        }
        if s.is_empty() {
            return Err("empty name matcher".to_string());
        }
        Ok(Matcher::NameContains(s.to_string()))
    }
}

/// First item in enumeration order accepted by `matcher`.
pub fn resolve<'a, T: Named>(items: &'a [T], matcher: &Matcher) -> Option<&'a T> {
    items.iter().find(|item| matcher.matches(*item))
}

pub fn find_engine_by_name(engines: &[ScanEngine], pattern: &str) -> Option<String> {
    resolve(engines, &Matcher::name_contains(pattern)).map(|engine| engine.id.clone())
}

pub fn find_policy_by_name(policies: &[ScanPolicy], pattern: &str) -> Option<String> {
    resolve(policies, &Matcher::name_contains(pattern)).map(|policy| policy.id.clone())
}

pub fn engine_listing(engines: &[ScanEngine]) -> String {
    let rows = engines
        .iter()
        .enumerate()
        .map(|(index, engine)| {
            vec![
                (index + 1).to_string(),
                engine.name.clone(),
                engine.id.clone(),
                engine.host.clone(),
            ]
        })
        .collect();
    render_listing(&["#", "Name", "Id", "Host"], rows)
}

pub fn policy_listing(policies: &[ScanPolicy]) -> String {
    let rows = policies
        .iter()
        .enumerate()
        .map(|(index, policy)| {
            vec![
                (index + 1).to_string(),
                policy.name.clone(),
                policy.id.clone(),
            ]
        })
        .collect();
    render_listing(&["#", "Name", "Id"], rows)
}

fn render_listing(header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut display = Table::new();
    display.load_preset(ASCII_FULL);
    display.set_header(header.to_vec());
    for row in rows {
        display.add_row(row);
    }
    display.to_string()
}
