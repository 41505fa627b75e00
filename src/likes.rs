use crate::database::Storage;
use crate::error::{Error, Result};
use crate::model::*;
use log::{info, warn};
use std::sync::Arc;

/// Records which users like which films. A user likes a film at most once.
pub struct LikeEngine<S> {
    storage: Arc<S>,
}

impl<S: Storage> LikeEngine<S> {
    pub fn new(storage: Arc<S>) -> LikeEngine<S> {
        LikeEngine { storage }
    }

    fn require_film(&self, id: FilmId) -> Result<Film> {
        self.storage.get_film(id)?.ok_or_else(|| {
            warn!("Film {} not found", id);
            Error::film_not_found(id)
        })
    }

    fn require_user(&self, id: UserId) -> Result<User> {
        self.storage.get_user(id)?.ok_or_else(|| {
            warn!("User {} not found", id);
            Error::user_not_found(id)
        })
    }

    pub fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        self.require_film(film_id)?;
        self.require_user(user_id)?;
        if self.storage.add_like(film_id, user_id)? {
            info!("User {} liked film {}", user_id, film_id);
        } else {
            warn!("User {} already likes film {}", user_id, film_id);
        }
        Ok(())
    }

    pub fn delete_like(&self, film_id: FilmId, user_id: UserId) -> Result<()> {
        self.require_film(film_id)?;
        self.require_user(user_id)?;
        if !self.storage.remove_like(film_id, user_id)? {
            warn!("User {} does not like film {}", user_id, film_id);
            return Err(Error::LikeNotFound { film_id, user_id });
        }
        info!("Removed like of user {} from film {}", user_id, film_id);
        Ok(())
    }

    pub fn like_count(&self, film_id: FilmId) -> Result<usize> {
        self.require_film(film_id)?;
        Ok(self.storage.get_likes(film_id)?.len())
    }

    /// Users who like the film, ordered by id.
    pub fn likes_of(&self, film_id: FilmId) -> Result<Vec<User>> {
        self.require_film(film_id)?;
        let mut users = Vec::new();
        for id in self.storage.get_likes(film_id)? {
            if let Some(user) = self.storage.get_user(id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Films the user likes, ordered by id.
    pub fn liked_films(&self, user_id: UserId) -> Result<Vec<Film>> {
        self.require_user(user_id)?;
        let mut films = Vec::new();
        for id in self.storage.get_liked_films(user_id)? {
            if let Some(film) = self.storage.get_film(id)? {
                films.push(film);
            }
        }
        Ok(films)
    }
}
