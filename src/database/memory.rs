use super::{CatalogDb, FilmDb, FriendDb, LikeDb, UserDb};
use crate::error::{Error, Result};
use crate::model::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

/// Tables of the in-process backend. Laid out like the sled trees so both
/// backends keep the same relation indexes.
#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    films: BTreeMap<FilmId, Film>,
    last_user_id: UserId,
    last_film_id: FilmId,
    /// (requester, target) -> status
    friendships: BTreeMap<(UserId, UserId), FriendshipStatus>,
    friend_links: BTreeMap<UserId, BTreeSet<UserId>>,
    film_likes: BTreeMap<FilmId, BTreeSet<UserId>>,
    user_likes: BTreeMap<UserId, BTreeSet<FilmId>>,
}

/// Removes `value` from the set under `key`, dropping the set once empty.
fn detach(index: &mut BTreeMap<u64, BTreeSet<u64>>, key: u64, value: u64) -> bool {
    let removed = match index.get_mut(&key) {
        Some(set) => set.remove(&value),
        None => return false,
    };
    if index.get(&key).map_or(false, BTreeSet::is_empty) {
        index.remove(&key);
    }
    removed
}

impl Tables {
    fn friendship(&self, a: UserId, b: UserId) -> Option<Friendship> {
        if let Some(&status) = self.friendships.get(&(a, b)) {
            return Some(Friendship {
                requester: a,
                target: b,
                status,
            });
        }
        self.friendships.get(&(b, a)).map(|&status| Friendship {
            requester: b,
            target: a,
            status,
        })
    }

    fn unlink(&mut self, a: UserId, b: UserId) -> bool {
        let removed =
            self.friendships.remove(&(a, b)).is_some() | self.friendships.remove(&(b, a)).is_some();
        for &(from, to) in &[(a, b), (b, a)] {
            detach(&mut self.friend_links, from, to);
        }
        removed
    }
}

/// Backend keeping everything in process memory. One lock guards all tables,
/// so cascading deletes are never observed half done.
#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
}

impl MemoryDb {
    pub fn new() -> MemoryDb {
        MemoryDb::default()
    }
}

impl UserDb for MemoryDb {
    fn add_user(&self, mut user: User) -> Result<User> {
        let mut tables = self.tables.write()?;
        tables.last_user_id += 1;
        user.id = tables.last_user_id;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update_user(&self, user: User) -> Result<Option<User>> {
        let mut tables = self.tables.write()?;
        Ok(tables.users.get_mut(&user.id).map(|stored| {
            *stored = user.clone();
            user
        }))
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read()?.users.get(&id).cloned())
    }

    fn get_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read()?.users.values().cloned().collect())
    }

    fn remove_user(&self, id: UserId) -> Result<bool> {
        let mut tables = self.tables.write()?;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        let counterparts = tables.friend_links.get(&id).cloned().unwrap_or_default();
        for other in counterparts {
            tables.unlink(id, other);
        }
        for film_id in tables.user_likes.remove(&id).unwrap_or_default() {
            detach(&mut tables.film_likes, film_id, id);
        }
        Ok(true)
    }
}

impl FilmDb for MemoryDb {
    fn add_film(&self, mut film: Film) -> Result<Film> {
        let mut tables = self.tables.write()?;
        tables.last_film_id += 1;
        film.id = tables.last_film_id;
        tables.films.insert(film.id, film.clone());
        Ok(film)
    }

    fn update_film(&self, film: Film) -> Result<Option<Film>> {
        let mut tables = self.tables.write()?;
        Ok(tables.films.get_mut(&film.id).map(|stored| {
            *stored = film.clone();
            film
        }))
    }

    fn get_film(&self, id: FilmId) -> Result<Option<Film>> {
        Ok(self.tables.read()?.films.get(&id).cloned())
    }

    fn get_films(&self) -> Result<Vec<Film>> {
        Ok(self.tables.read()?.films.values().cloned().collect())
    }

    fn remove_film(&self, id: FilmId) -> Result<bool> {
        let mut tables = self.tables.write()?;
        if tables.films.remove(&id).is_none() {
            return Ok(false);
        }
        for user_id in tables.film_likes.remove(&id).unwrap_or_default() {
            detach(&mut tables.user_likes, user_id, id);
        }
        Ok(true)
    }
}

impl FriendDb for MemoryDb {
    fn get_friendship(&self, a: UserId, b: UserId) -> Result<Option<Friendship>> {
        Ok(self.tables.read()?.friendship(a, b))
    }

    fn get_friendships(&self, user_id: UserId) -> Result<Vec<Friendship>> {
        let tables = self.tables.read()?;
        Ok(tables
            .friend_links
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|&other| tables.friendship(user_id, other))
            .collect())
    }

    fn put_friendship(&self, friendship: Friendship) -> Result<()> {
        let mut tables = self.tables.write()?;
        for &id in &[friendship.requester, friendship.target] {
            if !tables.users.contains_key(&id) {
                return Err(Error::user_not_found(id));
            }
        }
        let Friendship {
            requester,
            target,
            status,
        } = friendship;
        tables.friendships.remove(&(target, requester));
        tables.friendships.insert((requester, target), status);
        tables.friend_links.entry(requester).or_default().insert(target);
        tables.friend_links.entry(target).or_default().insert(requester);
        Ok(())
    }

    fn remove_friendship(&self, a: UserId, b: UserId) -> Result<bool> {
        Ok(self.tables.write()?.unlink(a, b))
    }
}

impl LikeDb for MemoryDb {
    fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<bool> {
        let mut tables = self.tables.write()?;
        if !tables.films.contains_key(&film_id) {
            return Err(Error::film_not_found(film_id));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(Error::user_not_found(user_id));
        }
        if tables
            .film_likes
            .get(&film_id)
            .map_or(false, |users| users.contains(&user_id))
        {
            return Ok(false);
        }
        tables.film_likes.entry(film_id).or_default().insert(user_id);
        tables.user_likes.entry(user_id).or_default().insert(film_id);
        Ok(true)
    }

    fn remove_like(&self, film_id: FilmId, user_id: UserId) -> Result<bool> {
        let mut tables = self.tables.write()?;
        let removed = detach(&mut tables.film_likes, film_id, user_id);
        detach(&mut tables.user_likes, user_id, film_id);
        Ok(removed)
    }

    fn get_likes(&self, film_id: FilmId) -> Result<BTreeSet<UserId>> {
        Ok(self
            .tables
            .read()?
            .film_likes
            .get(&film_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_liked_films(&self, user_id: UserId) -> Result<BTreeSet<FilmId>> {
        Ok(self
            .tables
            .read()?
            .user_likes
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_films_with_like_counts(&self) -> Result<Vec<(Film, usize)>> {
        let tables = self.tables.read()?;
        Ok(tables
            .films
            .values()
            .map(|film| {
                let likes = tables.film_likes.get(&film.id).map_or(0, |users| users.len());
                (film.clone(), likes)
            })
            .collect())
    }
}

impl CatalogDb for MemoryDb {}
