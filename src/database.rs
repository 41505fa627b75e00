use crate::catalog;
use crate::error::{Error, Result};
use crate::model::*;
use std::collections::BTreeSet;

mod memory;
mod sled_db;

pub use memory::MemoryDb;
pub use sled_db::SledDb;

// Big-endian so that sled iterates keys in identifier order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<u64> {
    use std::convert::TryInto;
    let bytes = id
        .as_ref()
        .try_into()
        .map_err(|_| Error::Internal(format!("malformed id key of {} bytes", id.as_ref().len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn pair_key(first: u64, second: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(first));
    key[8..].copy_from_slice(&serialize_id(second));
    key
}

pub trait UserDb {
    /// Stores the user under a freshly assigned id, ignoring `user.id`.
    fn add_user(&self, user: User) -> Result<User>;
    /// Replaces the user stored under `user.id`. `None` if there is none.
    fn update_user(&self, user: User) -> Result<Option<User>>;
    fn get_user(&self, id: UserId) -> Result<Option<User>>;
    fn get_users(&self) -> Result<Vec<User>>;
    /// Removes the user together with every friendship and like touching it.
    fn remove_user(&self, id: UserId) -> Result<bool>;
}

pub trait FilmDb {
    fn add_film(&self, film: Film) -> Result<Film>;
    fn update_film(&self, film: Film) -> Result<Option<Film>>;
    fn get_film(&self, id: FilmId) -> Result<Option<Film>>;
    fn get_films(&self) -> Result<Vec<Film>>;
    /// Removes the film together with every like it received.
    fn remove_film(&self, id: FilmId) -> Result<bool>;
}

pub trait FriendDb {
    /// The edge between the two users, in whichever direction it was
    /// requested.
    fn get_friendship(&self, a: UserId, b: UserId) -> Result<Option<Friendship>>;
    /// Every edge the user takes part in, as requester or target.
    fn get_friendships(&self, user_id: UserId) -> Result<Vec<Friendship>>;
    /// Writes the edge, replacing any edge of the same pair. Fails with
    /// `NotFound` if either user does not exist.
    fn put_friendship(&self, friendship: Friendship) -> Result<()>;
    fn remove_friendship(&self, a: UserId, b: UserId) -> Result<bool>;
}

pub trait LikeDb {
    /// `false` if the like already existed. Fails with `NotFound` if the film
    /// or the user does not exist.
    fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<bool>;
    fn remove_like(&self, film_id: FilmId, user_id: UserId) -> Result<bool>;
    fn get_likes(&self, film_id: FilmId) -> Result<BTreeSet<UserId>>;
    fn get_liked_films(&self, user_id: UserId) -> Result<BTreeSet<FilmId>>;
    /// Every film with the number of users liking it.
    fn get_films_with_like_counts(&self) -> Result<Vec<(Film, usize)>>;
}

/// Read-only reference data. The catalogs are fixed, so every backend
/// serves the same ones.
pub trait CatalogDb {
    fn get_mpa_ratings(&self) -> Result<Vec<MpaRating>> {
        Ok(catalog::mpa_ratings())
    }

    fn get_mpa_rating(&self, id: u64) -> Result<Option<MpaRating>> {
        Ok(catalog::mpa_rating(id))
    }

    fn get_genres(&self) -> Result<Vec<Genre>> {
        Ok(catalog::genres())
    }

    fn get_genre(&self, id: u64) -> Result<Option<Genre>> {
        Ok(catalog::genre(id))
    }
}

pub trait Storage: UserDb + FilmDb + FriendDb + LikeDb + CatalogDb + Send + Sync {}

impl<T: UserDb + FilmDb + FriendDb + LikeDb + CatalogDb + Send + Sync> Storage for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::thread;

    fn user(login: &str) -> User {
        User {
            id: 0,
            email: format!("{}@example.com", login),
            login: login.to_owned(),
            name: login.to_owned(),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 10).unwrap(),
        }
    }

    fn film(name: &str) -> Film {
        Film {
            id: 0,
            name: name.to_owned(),
            description: String::new(),
            release_date: NaiveDate::from_ymd_opt(1994, 10, 14).unwrap(),
            duration: 154,
            mpa: catalog::mpa_rating(4).unwrap(),
            genres: vec![],
        }
    }

    fn backends() -> Vec<(&'static str, Box<dyn Storage>)> {
        vec![
            ("memory", Box::new(MemoryDb::new())),
            ("sled", Box::new(SledDb::temporary().unwrap())),
        ]
    }

    #[test]
    fn id_keys() {
        assert_eq!(deserialize_id(serialize_id(42)).unwrap(), 42);
        assert!(deserialize_id([1u8, 2, 3]).is_err());
        assert!(pair_key(1, 2) < pair_key(2, 1));
        assert!(serialize_id(255) < serialize_id(256));
    }

    #[test]
    fn ids_are_never_reused() {
        for (name, db) in backends() {
            let a = db.add_user(user("a")).unwrap();
            let b = db.add_user(user("b")).unwrap();
            assert_eq!((a.id, b.id), (1, 2), "{}", name);
            assert!(db.remove_user(b.id).unwrap());
            let c = db.add_user(user("c")).unwrap();
            assert_eq!(c.id, 3, "{}", name);

            let f = db.add_film(film("f")).unwrap();
            assert_eq!(f.id, 1, "{}", name);
        }
    }

    #[test]
    fn update_and_get() {
        for (name, db) in backends() {
            let mut a = db.add_user(user("a")).unwrap();
            a.login = "renamed".to_owned();
            assert_eq!(db.update_user(a.clone()).unwrap(), Some(a.clone()), "{}", name);
            assert_eq!(db.get_user(a.id).unwrap(), Some(a.clone()), "{}", name);
            let mut ghost = a.clone();
            ghost.id = 99;
            assert_eq!(db.update_user(ghost).unwrap(), None, "{}", name);
            assert_eq!(db.get_user(99).unwrap(), None, "{}", name);
            assert_eq!(db.get_users().unwrap(), vec![a], "{}", name);
            assert!(!db.remove_user(99).unwrap(), "{}", name);
        }
    }

    #[test]
    fn friendship_edges() {
        for (name, db) in backends() {
            let a = db.add_user(user("a")).unwrap().id;
            let b = db.add_user(user("b")).unwrap().id;
            db.put_friendship(Friendship::pending(a, b)).unwrap();
            assert_eq!(
                db.get_friendship(b, a).unwrap(),
                Some(Friendship::pending(a, b)),
                "{}",
                name
            );
            assert_eq!(db.get_friendships(b).unwrap().len(), 1, "{}", name);

            // Replacing the pair's edge keeps at most one per pair.
            db.put_friendship(Friendship {
                requester: b,
                target: a,
                status: FriendshipStatus::Confirmed,
            })
            .unwrap();
            assert_eq!(db.get_friendships(a).unwrap().len(), 1, "{}", name);
            assert!(db.get_friendship(a, b).unwrap().unwrap().is_confirmed());

            assert!(db.remove_friendship(a, b).unwrap(), "{}", name);
            assert!(!db.remove_friendship(b, a).unwrap(), "{}", name);
            assert!(db.get_friendships(a).unwrap().is_empty(), "{}", name);

            match db.put_friendship(Friendship::pending(a, 99)) {
                Err(Error::NotFound(_)) => (),
                other => panic!("{}: {:?}", name, other),
            }
        }
    }

    #[test]
    fn likes() {
        for (name, db) in backends() {
            let u = db.add_user(user("u")).unwrap().id;
            let f = db.add_film(film("f")).unwrap().id;
            assert!(db.add_like(f, u).unwrap(), "{}", name);
            assert!(!db.add_like(f, u).unwrap(), "{}", name);
            assert_eq!(db.get_likes(f).unwrap().len(), 1, "{}", name);
            assert!(db.get_liked_films(u).unwrap().contains(&f), "{}", name);
            assert_eq!(db.get_films_with_like_counts().unwrap()[0].1, 1, "{}", name);
            assert!(db.remove_like(f, u).unwrap(), "{}", name);
            assert!(!db.remove_like(f, u).unwrap(), "{}", name);
            assert!(db.get_likes(f).unwrap().is_empty(), "{}", name);
            assert!(db.add_like(99, u).is_err(), "{}", name);
            assert!(db.add_like(f, 99).is_err(), "{}", name);
        }
    }

    #[test]
    fn removing_entities_cascades() {
        for (name, db) in backends() {
            let a = db.add_user(user("a")).unwrap().id;
            let b = db.add_user(user("b")).unwrap().id;
            let f = db.add_film(film("f")).unwrap().id;
            let g = db.add_film(film("g")).unwrap().id;
            db.put_friendship(Friendship::pending(a, b)).unwrap();
            db.add_like(f, a).unwrap();
            db.add_like(f, b).unwrap();
            db.add_like(g, b).unwrap();

            assert!(db.remove_user(a).unwrap(), "{}", name);
            assert!(db.get_friendships(b).unwrap().is_empty(), "{}", name);
            assert_eq!(db.get_friendship(a, b).unwrap(), None, "{}", name);
            assert_eq!(
                db.get_likes(f).unwrap().into_iter().collect::<Vec<_>>(),
                vec![b],
                "{}",
                name
            );

            assert!(db.remove_film(f).unwrap(), "{}", name);
            assert_eq!(
                db.get_liked_films(b).unwrap().into_iter().collect::<Vec<_>>(),
                vec![g],
                "{}",
                name
            );
            assert!(db.get_likes(f).unwrap().is_empty(), "{}", name);
        }
    }

    #[test]
    fn like_counts_never_see_half_a_cascade() {
        for (name, db) in backends() {
            let db: Arc<dyn Storage> = Arc::from(db);
            let f = db.add_film(film("f")).unwrap().id;
            let g = db.add_film(film("g")).unwrap().id;
            let users: Vec<UserId> = (0..1000)
                .map(|i| {
                    let u = db.add_user(user(&format!("u{}", i))).unwrap().id;
                    db.add_like(f, u).unwrap();
                    db.add_like(g, u).unwrap();
                    u
                })
                .collect();

            let remover = {
                let db = db.clone();
                thread::spawn(move || {
                    for u in users {
                        db.remove_user(u).unwrap();
                    }
                })
            };
            loop {
                let done = remover.is_finished();
                let counts = db.get_films_with_like_counts().unwrap();
                assert_eq!(counts[0].1, counts[1].1, "{}: {:?}", name, counts);
                if done {
                    assert_eq!(counts[0].1, 0, "{}", name);
                    break;
                }
            }
            remover.join().unwrap();
        }
    }

    #[test]
    fn catalogs() {
        for (name, db) in backends() {
            assert_eq!(db.get_mpa_ratings().unwrap().len(), 5, "{}", name);
            assert_eq!(db.get_genre(6).unwrap().unwrap().name, "Action", "{}", name);
            assert_eq!(db.get_mpa_rating(9).unwrap(), None, "{}", name);
        }
    }
}
