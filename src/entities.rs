//! Entity store: creation, update, lookup and deletion of users and films,
//! plus read access to the reference catalogs.

use crate::database::Storage;
use crate::error::{Error, Result};
use crate::model::*;
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MAX_DESCRIPTION_LEN: usize = 200;

pub fn earliest_release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1895, 12, 28).unwrap_or(NaiveDate::MIN)
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn validate_user(mut user: User) -> Result<User> {
    if user.email.trim().is_empty() || !user.email.contains('@') {
        return Err(Error::Validation(format!("invalid email {:?}", user.email)));
    }
    if user.login.is_empty() || user.login.chars().any(char::is_whitespace) {
        return Err(Error::Validation(
            "login must be non-empty and contain no whitespace".to_owned(),
        ));
    }
    if user.birthday > today() {
        return Err(Error::Validation(format!(
            "birthday {} is in the future",
            user.birthday
        )));
    }
    if user.name.trim().is_empty() {
        user.name = user.login.clone();
        info!("Using login as name of user {:?}", user.login);
    }
    Ok(user)
}

pub struct EntityStore<S> {
    storage: Arc<S>,
}

impl<S: Storage> EntityStore<S> {
    pub fn new(storage: Arc<S>) -> EntityStore<S> {
        EntityStore { storage }
    }

    pub fn create_user(&self, user: User) -> Result<User> {
        let user = self.storage.add_user(validate_user(user)?)?;
        info!("Added user {}: {:?}", user.id, user.login);
        Ok(user)
    }

    pub fn update_user(&self, user: User) -> Result<User> {
        let id = user.id;
        let user = self
            .storage
            .update_user(validate_user(user)?)?
            .ok_or_else(|| Error::user_not_found(id))?;
        info!("Updated user {}", id);
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.storage
            .get_user(id)?
            .ok_or_else(|| Error::user_not_found(id))
    }

    pub fn get_users(&self) -> Result<Vec<User>> {
        self.storage.get_users()
    }

    /// Deletes the user. Its friendships and likes go with it.
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        if !self.storage.remove_user(id)? {
            warn!("Cannot delete user {}: not found", id);
            return Err(Error::user_not_found(id));
        }
        info!("Deleted user {} with its friendships and likes", id);
        Ok(())
    }

    pub fn create_film(&self, film: Film) -> Result<Film> {
        let film = self.storage.add_film(self.validate_film(film)?)?;
        info!("Added film {}: {:?}", film.id, film.name);
        Ok(film)
    }

    pub fn update_film(&self, film: Film) -> Result<Film> {
        let id = film.id;
        let film = self
            .storage
            .update_film(self.validate_film(film)?)?
            .ok_or_else(|| Error::film_not_found(id))?;
        info!("Updated film {}", id);
        Ok(film)
    }

    pub fn get_film(&self, id: FilmId) -> Result<Film> {
        self.storage
            .get_film(id)?
            .ok_or_else(|| Error::film_not_found(id))
    }

    pub fn get_films(&self) -> Result<Vec<Film>> {
        self.storage.get_films()
    }

    /// Deletes the film. Its likes go with it.
    pub fn delete_film(&self, id: FilmId) -> Result<()> {
        if !self.storage.remove_film(id)? {
            warn!("Cannot delete film {}: not found", id);
            return Err(Error::film_not_found(id));
        }
        info!("Deleted film {} with its likes", id);
        Ok(())
    }

    pub fn get_mpa_ratings(&self) -> Result<Vec<MpaRating>> {
        self.storage.get_mpa_ratings()
    }

    pub fn get_mpa_rating(&self, id: u64) -> Result<MpaRating> {
        self.storage
            .get_mpa_rating(id)?
            .ok_or_else(|| Error::NotFound(format!("MPA rating {}", id)))
    }

    pub fn get_genres(&self) -> Result<Vec<Genre>> {
        self.storage.get_genres()
    }

    pub fn get_genre(&self, id: u64) -> Result<Genre> {
        self.storage
            .get_genre(id)?
            .ok_or_else(|| Error::NotFound(format!("genre {}", id)))
    }

    /// Checks the film's fields and replaces its rating and genres with the
    /// catalog entries they reference.
    fn validate_film(&self, mut film: Film) -> Result<Film> {
        if film.name.trim().is_empty() {
            return Err(Error::Validation("film name must not be blank".to_owned()));
        }
        if film.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(Error::Validation(format!(
                "description is longer than {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if film.release_date < earliest_release_date() {
            return Err(Error::Validation(format!(
                "release date {} is before {}",
                film.release_date,
                earliest_release_date()
            )));
        }
        if film.duration < 0 {
            return Err(Error::Validation("duration must not be negative".to_owned()));
        }
        film.mpa = self
            .storage
            .get_mpa_rating(film.mpa.id)?
            .ok_or_else(|| Error::Validation(format!("unknown MPA rating {}", film.mpa.id)))?;
        let mut genres = BTreeMap::new();
        for genre in &film.genres {
            let genre = self
                .storage
                .get_genre(genre.id)?
                .ok_or_else(|| Error::Validation(format!("unknown genre {}", genre.id)))?;
            genres.insert(genre.id, genre);
        }
        film.genres = genres.into_iter().map(|(_, genre)| genre).collect();
        Ok(film)
    }
}
