//! Typed queries and their validation from raw request parameters

use crate::domain::ResourceKind;
use crate::enrich::EnrichmentSet;
use crate::error::ValidationError;
use crate::filter::{FieldPredicate, SortDirection, SortSpec};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Window size when neither the request nor the configuration sets one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Entities per upstream page. SWAPI does not let clients change it.
pub const UPSTREAM_PAGE_SIZE: usize = 10;

const MAX_TEXT_LEN: usize = 100;
const MAX_PAGE_SIZE: usize = 100;
const GENDERS: &[&str] = &["male", "female", "hermaphrodite", "n/a", "none"];

/// A validated query against one resource collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub kind: ResourceKind,
    /// Pushed to the upstream `search` parameter
    pub search: Option<String>,
    /// Applied locally, conjunctively
    pub predicates: Vec<FieldPredicate>,
    pub sort: Option<SortSpec>,
    #[serde(skip)]
    pub enrichment: EnrichmentSet,
    pub page: u32,
    pub page_size: usize,
}

impl Query {
    pub fn builder(kind: ResourceKind) -> QueryBuilder {
        QueryBuilder::new(kind)
    }

    /// Whether answering this query needs work the upstream cannot do.
    pub fn needs_local_processing(&self) -> bool {
        !self.predicates.is_empty() || self.sort.is_some()
    }

    /// Builds a query from query-string style parameters.
    ///
    /// `page` is required. Any filterable field of `kind` is accepted as a
    /// filter, `include_<field>` toggles enrichment of a reference field and
    /// `include_all` enables every reference field. Unknown parameters are
    /// rejected. Films are ordered by `release_date` unless `sort_by` says
    /// otherwise.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use swapi_query_engine::domain::ResourceKind;
    /// use swapi_query_engine::query::Query;
    ///
    /// let params = BTreeMap::from([
    ///     ("page".to_string(), "2".to_string()),
    ///     ("gender".to_string(), "Female".to_string()),
    ///     ("include_homeworld".to_string(), "true".to_string()),
    /// ]);
    /// let query = Query::from_params(ResourceKind::Character, &params).unwrap();
    /// assert_eq!(query.page, 2);
    /// assert_eq!(query.predicates[0].value, "female");
    /// ```
    pub fn from_params(
        kind: ResourceKind,
        params: &BTreeMap<String, String>,
    ) -> Result<Query, ValidationError> {
        let mut errors = ValidationError::default();
        let mut builder = QueryBuilder::new(kind);

        match params.get("page") {
            None => errors.push("page", "Field is required"),
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(page) => builder = builder.page(page),
                Err(_) => errors.push("page", format!("Expected a positive integer, got '{raw}'")),
            },
        }

        for (key, raw) in params {
            match key.as_str() {
                "page" => {}
                "page_size" => match raw.trim().parse::<usize>() {
                    Ok(size) => builder = builder.page_size(size),
                    Err(_) => errors.push(key, format!("Expected a positive integer, got '{raw}'")),
                },
                "search" => builder = builder.search(raw),
                "sort_by" => builder = builder.sort_by(raw),
                "order" => match raw.parse::<SortDirection>() {
                    Ok(direction) => builder = builder.order(direction),
                    Err(message) => errors.push(key, message),
                },
                "include_all" => match parse_flag(raw) {
                    Some(flag) => builder = builder.include_all(flag),
                    None => errors.push(key, format!("Expected true or false, got '{raw}'")),
                },
                other => {
                    if let Some(field) = other.strip_prefix("include_") {
                        match parse_flag(raw) {
                            Some(true) => builder = builder.include(field),
                            Some(false) if kind.reference_field(field).is_some() => {}
                            Some(false) => errors.push(
                                key,
                                format!("'{field}' is not a reference field of {kind}"),
                            ),
                            None => {
                                errors.push(key, format!("Expected true or false, got '{raw}'"))
                            }
                        }
                    } else if kind.match_mode(other).is_some() {
                        builder = builder.filter(other, raw);
                    } else {
                        errors.push(key, "Unknown parameter");
                    }
                }
            }
        }

        if kind == ResourceKind::Film && !params.contains_key("sort_by") {
            builder = builder.sort_by("release_date");
        }

        builder.finish(errors)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Builder for [`Query`] values; validation happens in [`QueryBuilder::build`].
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::domain::ResourceKind;
/// use swapi_query_engine::filter::SortDirection;
/// use swapi_query_engine::query::QueryBuilder;
///
/// let query = QueryBuilder::new(ResourceKind::Planet)
///     .filter("climate", "temperate")
///     .sort_by("population")
///     .order(SortDirection::Desc)
///     .include("residents")
///     .page(1)
///     .build()
///     .unwrap();
/// assert!(query.needs_local_processing());
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    kind: ResourceKind,
    search: Option<String>,
    filters: Vec<(String, String)>,
    sort_by: Option<String>,
    order: Option<SortDirection>,
    include: BTreeSet<String>,
    include_all: bool,
    page: u32,
    page_size: usize,
}

impl QueryBuilder {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            search: None,
            filters: Vec::new(),
            sort_by: None,
            order: None,
            include: BTreeSet::new(),
            include_all: false,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn search(mut self, term: &str) -> Self {
        self.search = Some(term.to_string());
        self
    }

    /// Adds a local filter; the match mode comes from the field.
    pub fn filter(mut self, field: &str, value: &str) -> Self {
        self.filters.push((field.to_string(), value.to_string()));
        self
    }

    pub fn sort_by(mut self, field: &str) -> Self {
        self.sort_by = Some(field.to_string());
        self
    }

    pub fn order(mut self, direction: SortDirection) -> Self {
        self.order = Some(direction);
        self
    }

    pub fn include(mut self, field: &str) -> Self {
        self.include.insert(field.to_string());
        self
    }

    pub fn include_all(mut self, include_all: bool) -> Self {
        self.include_all = include_all;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn build(self) -> Result<Query, ValidationError> {
        self.finish(ValidationError::default())
    }

    fn finish(self, mut errors: ValidationError) -> Result<Query, ValidationError> {
        let kind = self.kind;

        if self.page < 1 {
            errors.push("page", "Must be at least 1");
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            errors.push("page_size", format!("Must be between 1 and {MAX_PAGE_SIZE}"));
        }

        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(term) = &search
            && term.chars().count() > MAX_TEXT_LEN
        {
            errors.push("search", format!("Must be at most {MAX_TEXT_LEN} characters"));
        }

        let mut predicates = Vec::with_capacity(self.filters.len());
        for (field, value) in self.filters {
            let Some(mode) = kind.match_mode(&field) else {
                errors.push(&field, format!("Not a filterable field of {kind}"));
                continue;
            };
            let value = value.trim().to_lowercase();
            if value.is_empty() {
                errors.push(&field, "Must not be empty");
            } else if value.chars().count() > MAX_TEXT_LEN {
                errors.push(&field, format!("Must be at most {MAX_TEXT_LEN} characters"));
            } else if field == "gender" && !GENDERS.contains(&value.as_str()) {
                errors.push(
                    &field,
                    format!("Unknown value '{value}', expected one of {}", GENDERS.join(", ")),
                );
            } else {
                predicates.push(FieldPredicate::new(field, value, mode));
            }
        }

        let sort = match (self.sort_by, self.order) {
            (Some(field), order) => {
                if kind.sortable_fields().contains(&field.as_str()) {
                    Some(SortSpec::new(field, order.unwrap_or_default()))
                } else {
                    errors.push(
                        "sort_by",
                        format!(
                            "Unknown sort field '{field}', expected one of {}",
                            kind.sortable_fields().join(", ")
                        ),
                    );
                    None
                }
            }
            (None, Some(_)) => {
                errors.push("order", "Requires sort_by");
                None
            }
            (None, None) => None,
        };

        for field in &self.include {
            if kind.reference_field(field).is_none() {
                errors.push(
                    format!("include_{field}"),
                    format!("'{field}' is not a reference field of {kind}"),
                );
            }
        }
        let enrichment = if self.include_all {
            EnrichmentSet::All
        } else {
            EnrichmentSet::Fields(self.include)
        };

        errors.into_result(Query {
            kind,
            search,
            predicates,
            sort,
            enrichment,
            page: self.page,
            page_size: self.page_size,
        })
    }
}
