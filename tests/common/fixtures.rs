//! Test fixtures: a small, deterministic galaxy served by the mock upstream

use serde_json::{Value, json};

pub const CHARACTER_COUNT: u32 = 82;
pub const PLANET_COUNT: u32 = 10;
pub const FILM_COUNT: u32 = 6;

/// Ids 4, 8, ..., 80
pub const FEMALE_COUNT: usize = 20;
/// Ids congruent to 1 or 2 modulo 4
pub const MALE_COUNT: usize = 42;

const FILM_TITLES: [&str; 6] = [
    "A New Hope",
    "The Empire Strikes Back",
    "Return of the Jedi",
    "The Phantom Menace",
    "Attack of the Clones",
    "Revenge of the Sith",
];
const RELEASE_DATES: [&str; 6] = [
    "1977-05-25",
    "1980-05-17",
    "1983-05-25",
    "1999-05-19",
    "2002-05-16",
    "2005-05-19",
];

pub fn gender_of(id: u32) -> &'static str {
    match id % 4 {
        0 => "female",
        1 | 2 => "male",
        _ => "n/a",
    }
}

pub fn homeworld_of(character: u32) -> u32 {
    (character - 1) % PLANET_COUNT + 1
}

pub fn character(base: &str, id: u32) -> Value {
    let films: Vec<String> = (1..=FILM_COUNT)
        .filter(|film| id % film == 0)
        .map(|film| format!("{base}films/{film}/"))
        .collect();
    let mass = if id % 10 == 0 {
        "unknown".to_string()
    } else {
        (40 + id % 50).to_string()
    };
    let eye_color = if id % 2 == 0 { "blue" } else { "brown, yellow" };

    json!({
        "name": format!("Character {id:02}"),
        "height": (100 + id).to_string(),
        "mass": mass,
        "birth_year": format!("{id}BBY"),
        "gender": gender_of(id),
        "eye_color": eye_color,
        "hair_color": "black",
        "skin_color": "fair",
        "homeworld": format!("{base}planets/{}/", homeworld_of(id)),
        "films": films,
        "species": [],
        "vehicles": [],
        "starships": [],
        "created": "2014-12-09T13:50:51.644000Z",
        "edited": "2014-12-20T21:17:56.891000Z",
        "url": format!("{base}people/{id}/")
    })
}

pub fn planet(base: &str, id: u32) -> Value {
    let residents: Vec<String> = (1..=CHARACTER_COUNT)
        .filter(|character| homeworld_of(*character) == id)
        .map(|character| format!("{base}people/{character}/"))
        .collect();
    let climate = match id % 3 {
        0 => "arid",
        1 => "temperate, tropical",
        _ => "frozen",
    };
    let population = if id == PLANET_COUNT {
        "unknown".to_string()
    } else {
        (id * 1_000_000).to_string()
    };

    json!({
        "name": format!("Planet {id:02}"),
        "climate": climate,
        "terrain": "grasslands, mountains",
        "diameter": (1000 * id).to_string(),
        "population": population,
        "residents": residents,
        "films": [format!("{base}films/1/")],
        "created": "2014-12-09T13:50:49.641000Z",
        "edited": "2014-12-20T20:58:18.411000Z",
        "url": format!("{base}planets/{id}/")
    })
}

pub fn film(base: &str, id: u32) -> Value {
    let index = (id - 1) as usize;
    let characters: Vec<String> = (1..=CHARACTER_COUNT)
        .filter(|character| character % id == 0)
        .take(5)
        .map(|character| format!("{base}people/{character}/"))
        .collect();
    let director = if id == 2 { "Irvin Kershner" } else { "George Lucas" };
    let episode_id = [4, 5, 6, 1, 2, 3][index];

    json!({
        "title": FILM_TITLES[index],
        "episode_id": episode_id,
        "opening_crawl": "It is a period of civil war. Rebel spaceships, striking from a hidden base, have won their first victory against the evil Galactic Empire.",
        "director": director,
        "producer": "Gary Kurtz, Rick McCallum",
        "release_date": RELEASE_DATES[index],
        "characters": characters,
        "planets": [format!("{base}planets/1/")],
        "starships": [],
        "vehicles": [],
        "species": [],
        "created": "2014-12-10T14:23:31.880000Z",
        "edited": "2014-12-20T19:49:45.256000Z",
        "url": format!("{base}films/{id}/")
    })
}

pub fn characters(base: &str) -> Vec<Value> {
    (1..=CHARACTER_COUNT).map(|id| character(base, id)).collect()
}

pub fn planets(base: &str) -> Vec<Value> {
    (1..=PLANET_COUNT).map(|id| planet(base, id)).collect()
}

pub fn films(base: &str) -> Vec<Value> {
    (1..=FILM_COUNT).map(|id| film(base, id)).collect()
}
