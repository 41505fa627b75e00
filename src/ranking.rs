use crate::database::Storage;
use crate::error::{Error, Result};
use crate::model::Film;
use log::debug;
use std::cmp::Reverse;
use std::convert::TryFrom;
use std::sync::Arc;

/// Orders films by popularity: most liked first, ties by ascending id.
pub struct PopularityRanker<S> {
    storage: Arc<S>,
}

impl<S: Storage> PopularityRanker<S> {
    pub fn new(storage: Arc<S>) -> PopularityRanker<S> {
        PopularityRanker { storage }
    }

    /// The `count` most popular films, computed from the likes recorded at
    /// call time.
    pub fn get_popular(&self, count: i64) -> Result<Vec<Film>> {
        if count <= 0 {
            return Err(Error::Validation(format!(
                "count of popular films must be positive, got {}",
                count
            )));
        }
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        let mut films = self.storage.get_films_with_like_counts()?;
        films.sort_by_key(|(film, likes)| (Reverse(*likes), film.id));
        films.truncate(count);
        debug!(
            "Top {} films by likes: {:?}",
            count,
            films
                .iter()
                .map(|(film, likes)| (film.id, *likes))
                .collect::<Vec<_>>()
        );
        Ok(films.into_iter().map(|(film, _)| film).collect())
    }
}
