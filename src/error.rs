use crate::model::{FilmId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("no friendship between users {user_id} and {friend_id}")]
    FriendshipNotFound { user_id: UserId, friend_id: UserId },

    #[error("user {user_id} does not like film {film_id}")]
    LikeNotFound { film_id: FilmId, user_id: UserId },

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn user_not_found(id: UserId) -> Error {
        Error::NotFound(format!("user {}", id))
    }

    pub fn film_not_found(id: FilmId) -> Error {
        Error::NotFound(format!("film {}", id))
    }

    /// Unlinking a relation that does not exist. An expected outcome, not a
    /// client error.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Error::FriendshipNotFound { .. } | Error::LikeNotFound { .. }
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::Internal(format!("lock poisoned: {}", err))
    }
}
