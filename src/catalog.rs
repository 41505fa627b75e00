//! Fixed reference data: the MPA rating scale and the genre catalog.

use crate::model::{Genre, MpaRating};

const MPA_RATINGS: &[(u64, &str)] = &[(1, "G"), (2, "PG"), (3, "PG-13"), (4, "R"), (5, "NC-17")];

const GENRES: &[(u64, &str)] = &[
    (1, "Comedy"),
    (2, "Drama"),
    (3, "Animation"),
    (4, "Thriller"),
    (5, "Documentary"),
    (6, "Action"),
];

pub fn mpa_ratings() -> Vec<MpaRating> {
    MPA_RATINGS
        .iter()
        .map(|&(id, name)| MpaRating {
            id,
            name: name.to_owned(),
        })
        .collect()
}

pub fn mpa_rating(id: u64) -> Option<MpaRating> {
    mpa_ratings().into_iter().find(|rating| rating.id == id)
}

pub fn genres() -> Vec<Genre> {
    GENRES
        .iter()
        .map(|&(id, name)| Genre {
            id,
            name: name.to_owned(),
        })
        .collect()
}

pub fn genre(id: u64) -> Option<Genre> {
    genres().into_iter().find(|genre| genre.id == id)
}
