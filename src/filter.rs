//! Local filtering and ordering over materialized collections

use crate::domain::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// How a predicate value is compared against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive substring match (names, titles, manufacturers)
    Substring,
    /// Case-insensitive equality (categorical fields)
    Exact,
    /// Case-insensitive equality against any comma-separated component
    AnyOf,
}

impl MatchMode {
    /// `needle` must already be lowercase.
    fn matches(self, haystack: &str, needle: &str) -> bool {
        let haystack = haystack.to_lowercase();
        match self {
            MatchMode::Substring => haystack.contains(needle),
            MatchMode::Exact => haystack.trim() == needle,
            MatchMode::AnyOf => haystack.split(',').any(|part| part.trim() == needle),
        }
    }
}

/// A single local predicate: `field` compared to `value` using `mode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub field: String,
    pub value: String,
    pub mode: MatchMode,
}

impl FieldPredicate {
    pub fn new(field: impl Into<String>, value: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            field: field.into(),
            value: value.into().to_lowercase(),
            mode,
        }
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        match entity.get(&self.field) {
            Some(Value::String(s)) => self.mode.matches(s, &self.value),
            Some(Value::Number(n)) => self.mode.matches(&n.to_string(), &self.value),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("expected 'asc' or 'desc', got '{other}'")),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Engine for applying predicates and ordering to in-memory collections.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::domain::{Entity, ResourceKind};
/// use swapi_query_engine::filter::{FieldPredicate, FilterEngine, MatchMode};
/// use serde_json::json;
///
/// let people = vec![
///     Entity::from_value(ResourceKind::Character, json!({"name": "Leia", "gender": "female"})).unwrap(),
///     Entity::from_value(ResourceKind::Character, json!({"name": "Luke", "gender": "male"})).unwrap(),
/// ];
/// let filtered = FilterEngine::new().apply(
///     people,
///     &[FieldPredicate::new("gender", "Female", MatchMode::Exact)],
///     None,
/// );
/// assert_eq!(filtered.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {}

impl FilterEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Keeps entities matching every predicate, then sorts when requested.
    pub fn apply(
        &self,
        entities: Vec<Entity>,
        predicates: &[FieldPredicate],
        sort: Option<&SortSpec>,
    ) -> Vec<Entity> {
        let mut filtered = entities;

        for predicate in predicates {
            filtered.retain(|e| predicate.matches(e));
        }

        if let Some(spec) = sort {
            self.sort(&mut filtered, spec);
        }

        filtered
    }

    /// Stable sort by `spec.field`.
    ///
    /// Numeric comparison is used when every present value parses as a
    /// number; otherwise values compare case-insensitively as text. Missing
    /// and placeholder values go last in both directions.
    pub fn sort(&self, entities: &mut [Entity], spec: &SortSpec) {
        let keys: Vec<Option<String>> = entities
            .iter()
            .map(|e| sort_text(e.get(&spec.field)))
            .collect();
        let numeric = keys.iter().flatten().all(|k| parse_number(k).is_some());

        let mut order: Vec<(SortKey, usize)> = keys
            .into_iter()
            .enumerate()
            .map(|(idx, key)| {
                let key = match key {
                    None => SortKey::Missing,
                    Some(k) if numeric => SortKey::Number(parse_number(&k).unwrap_or(0.0)),
                    Some(k) => SortKey::Text(k.to_lowercase()),
                };
                (key, idx)
            })
            .collect();

        order.sort_by(|(a, _), (b, _)| compare_keys(a, b, spec.direction));

        let original: Vec<Entity> = entities.to_vec();
        for (slot, (_, idx)) in entities.iter_mut().zip(order) {
            *slot = original[idx].clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
    Missing,
}

fn compare_keys(a: &SortKey, b: &SortKey, direction: SortDirection) -> Ordering {
    let ordering = match (a, b) {
        (SortKey::Missing, SortKey::Missing) => return Ordering::Equal,
        (SortKey::Missing, _) => return Ordering::Greater,
        (_, SortKey::Missing) => return Ordering::Less,
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        // Mixed keys cannot occur within one sort pass.
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
    };
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

const PLACEHOLDERS: &[&str] = &["unknown", "n/a", "none", "indefinite"];

fn sort_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() || PLACEHOLDERS.contains(&text.to_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
