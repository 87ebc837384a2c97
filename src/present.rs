//! Summary projection of entities for responses

use crate::domain::{Cardinality, Entity, ReferenceLink, ResourceKind};
use crate::enrich::EnrichmentSet;
use serde_json::{Map, Value};

const CRAWL_LIMIT: usize = 100;
const ELLIPSIS: &str = "...";
const BOOKKEEPING: &[&str] = &["created", "edited"];

/// Projects an (optionally enriched) entity into its response shape.
///
/// List reference fields are summarized by a `<field>_count`. A list the
/// request asked to expand is kept as is, members that could not be
/// resolved staying links; other lists are dropped. Nested entities keep
/// only the lists their cascade expanded.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use swapi_query_engine::domain::{Entity, ResourceKind};
/// use swapi_query_engine::enrich::EnrichmentSet;
/// use swapi_query_engine::present::present;
///
/// let planet = Entity::from_value(ResourceKind::Planet, json!({
///     "name": "Tatooine",
///     "residents": ["https://swapi.dev/api/people/1/", "https://swapi.dev/api/people/2/"],
///     "created": "2014-12-09T13:50:49.641000Z",
///     "url": "https://swapi.dev/api/planets/1/"
/// })).unwrap();
///
/// let view = present(&planet, &EnrichmentSet::none());
/// assert_eq!(view["residents_count"], 2);
/// assert!(view.get("residents").is_none());
/// assert!(view.get("created").is_none());
///
/// let view = present(&planet, &EnrichmentSet::fields(["residents"]));
/// assert_eq!(view["residents"][1], "https://swapi.dev/api/people/2/");
/// ```
pub fn present(entity: &Entity, requested: &EnrichmentSet) -> Value {
    present_object(entity.kind, &entity.fields, Some(requested))
}

pub fn present_all(entities: &[Entity], requested: &EnrichmentSet) -> Vec<Value> {
    entities
        .iter()
        .map(|entity| present(entity, requested))
        .collect()
}

/// `requested` is `None` below the root entity.
fn present_object(
    kind: ResourceKind,
    fields: &Map<String, Value>,
    requested: Option<&EnrichmentSet>,
) -> Value {
    let mut out = Map::new();

    for reference in kind.reference_fields() {
        if reference.cardinality == Cardinality::List {
            let count = fields
                .get(reference.name)
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            out.insert(format!("{}_count", reference.name), Value::from(count));
        }
    }

    for (name, value) in fields {
        if BOOKKEEPING.contains(&name.as_str()) {
            continue;
        }

        match kind.reference_field(name).map(|r| r.cardinality) {
            Some(Cardinality::List) => {
                let Some(items) = value.as_array() else {
                    continue;
                };
                let keep = match requested {
                    Some(set) => set.includes(name),
                    None => items.iter().any(Value::is_object),
                };
                if keep {
                    out.insert(
                        name.clone(),
                        Value::Array(items.iter().map(present_value).collect()),
                    );
                }
            }
            Some(Cardinality::Single) => {
                out.insert(name.clone(), present_value(value));
            }
            None if kind == ResourceKind::Film && name == "opening_crawl" => {
                let crawl = value.as_str().map(truncate).unwrap_or_default();
                out.insert(name.clone(), Value::String(crawl));
            }
            None => {
                out.insert(name.clone(), value.clone());
            }
        }
    }

    Value::Object(out)
}

/// Nested objects are identified by their own `url`.
fn present_value(value: &Value) -> Value {
    match value {
        Value::Object(fields) => match fields
            .get("url")
            .and_then(Value::as_str)
            .and_then(ReferenceLink::parse)
        {
            Some(link) => present_object(link.kind, fields, None),
            None => value.clone(),
        },
        other => other.clone(),
    }
}

/// Cuts `text` to at most 100 characters, the last three being `...`.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= CRAWL_LIMIT {
        return text.to_string();
    }
    let kept: String = text.chars().take(CRAWL_LIMIT - ELLIPSIS.len()).collect();
    format!("{kept}{ELLIPSIS}")
}
