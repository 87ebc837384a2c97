//! Domain types: resource kinds, reference links, entities and pages

use crate::filter::MatchMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The six upstream resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Film,
    Character,
    Planet,
    Starship,
    Species,
    Vehicle,
}

/// Whether a reference field holds one link or an ordered list of links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    List,
}

/// A field of an entity that holds reference links to another kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    pub name: &'static str,
    pub cardinality: Cardinality,
    pub target: ResourceKind,
}

const fn single(name: &'static str, target: ResourceKind) -> ReferenceField {
    ReferenceField {
        name,
        cardinality: Cardinality::Single,
        target,
    }
}

const fn list(name: &'static str, target: ResourceKind) -> ReferenceField {
    ReferenceField {
        name,
        cardinality: Cardinality::List,
        target,
    }
}

use ResourceKind::*;

const FILM_REFS: &[ReferenceField] = &[
    list("characters", Character),
    list("planets", Planet),
    list("starships", Starship),
    list("vehicles", Vehicle),
    list("species", Species),
];
const CHARACTER_REFS: &[ReferenceField] = &[
    single("homeworld", Planet),
    list("films", Film),
    list("species", Species),
    list("vehicles", Vehicle),
    list("starships", Starship),
];
const PLANET_REFS: &[ReferenceField] = &[list("residents", Character), list("films", Film)];
const STARSHIP_REFS: &[ReferenceField] = &[list("pilots", Character), list("films", Film)];
const VEHICLE_REFS: &[ReferenceField] = &[list("pilots", Character), list("films", Film)];
const SPECIES_REFS: &[ReferenceField] = &[
    single("homeworld", Planet),
    list("people", Character),
    list("films", Film),
];

const FILM_FILTERS: &[(&str, MatchMode)] = &[
    ("title", MatchMode::Substring),
    ("director", MatchMode::Substring),
    ("producer", MatchMode::Substring),
];
const CHARACTER_FILTERS: &[(&str, MatchMode)] = &[
    ("name", MatchMode::Substring),
    ("gender", MatchMode::Exact),
    ("eye_color", MatchMode::AnyOf),
    ("hair_color", MatchMode::AnyOf),
    ("skin_color", MatchMode::AnyOf),
];
const PLANET_FILTERS: &[(&str, MatchMode)] = &[
    ("name", MatchMode::Substring),
    ("climate", MatchMode::AnyOf),
    ("terrain", MatchMode::AnyOf),
];
const STARSHIP_FILTERS: &[(&str, MatchMode)] = &[
    ("name", MatchMode::Substring),
    ("model", MatchMode::Substring),
    ("manufacturer", MatchMode::Substring),
    ("starship_class", MatchMode::Exact),
];
const VEHICLE_FILTERS: &[(&str, MatchMode)] = &[
    ("name", MatchMode::Substring),
    ("model", MatchMode::Substring),
    ("manufacturer", MatchMode::Substring),
    ("vehicle_class", MatchMode::Exact),
];
const SPECIES_FILTERS: &[(&str, MatchMode)] = &[
    ("name", MatchMode::Substring),
    ("classification", MatchMode::Exact),
    ("designation", MatchMode::Exact),
    ("language", MatchMode::Substring),
];

const FILM_SORTS: &[&str] = &["title", "episode_id", "release_date", "director", "producer"];
const CHARACTER_SORTS: &[&str] = &["name", "height", "mass", "birth_year", "gender"];
const PLANET_SORTS: &[&str] = &[
    "name",
    "diameter",
    "rotation_period",
    "orbital_period",
    "population",
    "surface_water",
];
const CRAFT_SORTS: &[&str] = &[
    "name",
    "model",
    "cost_in_credits",
    "length",
    "crew",
    "passengers",
    "cargo_capacity",
    "max_atmosphering_speed",
];
const STARSHIP_SORTS: &[&str] = &[
    "name",
    "model",
    "cost_in_credits",
    "length",
    "crew",
    "passengers",
    "cargo_capacity",
    "max_atmosphering_speed",
    "hyperdrive_rating",
    "MGLT",
];
const SPECIES_SORTS: &[&str] = &["name", "classification", "average_height", "average_lifespan"];

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [Film, Character, Planet, Starship, Species, Vehicle];

    /// Path segment of the upstream collection.
    pub fn segment(self) -> &'static str {
        match self {
            Film => "films",
            Character => "people",
            Planet => "planets",
            Starship => "starships",
            Species => "species",
            Vehicle => "vehicles",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.segment() == segment)
    }

    /// The text field the upstream `search` parameter matches against.
    pub fn primary_field(self) -> &'static str {
        match self {
            Film => "title",
            _ => "name",
        }
    }

    pub fn reference_fields(self) -> &'static [ReferenceField] {
        match self {
            Film => FILM_REFS,
            Character => CHARACTER_REFS,
            Planet => PLANET_REFS,
            Starship => STARSHIP_REFS,
            Species => SPECIES_REFS,
            Vehicle => VEHICLE_REFS,
        }
    }

    pub fn reference_field(self, name: &str) -> Option<&'static ReferenceField> {
        self.reference_fields().iter().find(|f| f.name == name)
    }

    /// Fields expanded implicitly once an entity of this kind is itself
    /// expanded by enrichment.
    pub fn cascade_fields(self) -> &'static [&'static str] {
        match self {
            Character | Species => &["homeworld"],
            Film | Planet | Starship | Vehicle => &[],
        }
    }

    pub fn filter_fields(self) -> &'static [(&'static str, MatchMode)] {
        match self {
            Film => FILM_FILTERS,
            Character => CHARACTER_FILTERS,
            Planet => PLANET_FILTERS,
            Starship => STARSHIP_FILTERS,
            Species => SPECIES_FILTERS,
            Vehicle => VEHICLE_FILTERS,
        }
    }

    pub fn match_mode(self, field: &str) -> Option<MatchMode> {
        self.filter_fields()
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, mode)| *mode)
    }

    pub fn sortable_fields(self) -> &'static [&'static str] {
        match self {
            Film => FILM_SORTS,
            Character => CHARACTER_SORTS,
            Planet => PLANET_SORTS,
            Starship => STARSHIP_SORTS,
            Species => SPECIES_SORTS,
            Vehicle => CRAFT_SORTS,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Film => "films",
            Character => "characters",
            Planet => "planets",
            Starship => "starships",
            Species => "species",
            Vehicle => "vehicles",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "film" | "films" => Ok(Film),
            "character" | "characters" | "people" | "person" => Ok(Character),
            "planet" | "planets" => Ok(Planet),
            "starship" | "starships" => Ok(Starship),
            "species" => Ok(Species),
            "vehicle" | "vehicles" => Ok(Vehicle),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// A resolvable pointer to an upstream entity.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::domain::{ReferenceLink, ResourceKind};
///
/// let link = ReferenceLink::parse("https://swapi.dev/api/people/1/").unwrap();
/// assert_eq!(link.kind, ResourceKind::Character);
/// assert_eq!(link.id, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceLink {
    pub kind: ResourceKind,
    pub id: u32,
}

impl ReferenceLink {
    pub fn new(kind: ResourceKind, id: u32) -> Self {
        Self { kind, id }
    }

    /// Parses `.../<segment>/<id>/` upstream URLs.
    pub fn parse(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
        let [.., segment, id] = segments.as_slice() else {
            return None;
        };
        Some(Self {
            kind: ResourceKind::from_segment(segment)?,
            id: id.parse().ok()?,
        })
    }

    /// Path relative to the upstream base URL.
    pub fn path(&self) -> String {
        format!("{}/{}/", self.kind.segment(), self.id)
    }
}

impl fmt::Display for ReferenceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.segment(), self.id)
    }
}

/// An upstream record: a JSON object of scalar fields and reference links.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: ResourceKind,
    pub fields: Map<String, Value>,
}

impl Entity {
    pub fn new(kind: ResourceKind, fields: Map<String, Value>) -> Self {
        Self { kind, fields }
    }

    /// Wraps a JSON value when it is an object, `None` otherwise.
    pub fn from_value(kind: ResourceKind, value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { kind, fields }),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn url(&self) -> Option<&str> {
        self.str_field("url")
    }

    pub fn link(&self) -> Option<ReferenceLink> {
        self.url().and_then(ReferenceLink::parse)
    }

    /// Display name: `title` for films, `name` for everything else.
    pub fn label(&self) -> Option<&str> {
        self.str_field(self.kind.primary_field())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Serialize for Entity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// One upstream page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub kind: ResourceKind,
    pub index: u32,
    /// Total size of the upstream collection (after upstream search)
    pub count: usize,
    pub entities: Vec<Entity>,
    pub has_next: bool,
}

impl Page {
    /// Number of upstream pages implied by this page's size and the total.
    pub fn page_count(&self) -> u32 {
        let per_page = self.entities.len();
        if per_page == 0 || self.count == 0 {
            return 1;
        }
        self.count.div_ceil(per_page) as u32
    }
}
