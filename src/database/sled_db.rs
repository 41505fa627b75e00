use super::{deserialize_id, pair_key, serialize_id, CatalogDb, FilmDb, FriendDb, LikeDb, UserDb};
use crate::error::{Error, Result};
use crate::model::*;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::Transactional;
use std::collections::BTreeSet;
use std::path::Path;

const USERS: &[u8] = b"users";
const FILMS: &[u8] = b"films";
const META: &[u8] = b"meta";
const FRIENDSHIPS: &[u8] = b"friendships";
const FRIEND_LINKS: &[u8] = b"friend_links";
const FILM_LIKES: &[u8] = b"film_likes";
const USER_LIKES: &[u8] = b"user_likes";

const LAST_USER_ID: &[u8] = b"last_user_id";
const LAST_FILM_ID: &[u8] = b"last_film_id";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Lifts a crate result into a transaction, aborting it on error.
fn tx<T>(result: Result<T>) -> ConflictableTransactionResult<T, Error> {
    result.map_err(ConflictableTransactionError::Abort)
}

fn from_transaction(err: TransactionError<Error>) -> Error {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => Error::Storage(err),
    }
}

fn next_id(meta: &TransactionalTree, key: &[u8]) -> ConflictableTransactionResult<u64, Error> {
    let last = match meta.get(key)? {
        Some(last) => tx(deserialize_id(last))?,
        None => 0,
    };
    let id = last + 1;
    meta.insert(key, &serialize_id(id)[..])?;
    Ok(id)
}

fn read_set(
    tree: &TransactionalTree,
    id: u64,
) -> ConflictableTransactionResult<BTreeSet<u64>, Error> {
    match tree.get(&serialize_id(id)[..])? {
        Some(data) => tx(decode(&data)),
        None => Ok(BTreeSet::new()),
    }
}

fn write_set(
    tree: &TransactionalTree,
    id: u64,
    set: &BTreeSet<u64>,
) -> ConflictableTransactionResult<(), Error> {
    if set.is_empty() {
        tree.remove(&serialize_id(id)[..])?;
    } else {
        tree.insert(&serialize_id(id)[..], tx(encode(set))?)?;
    }
    Ok(())
}

fn exists(tree: &TransactionalTree, id: u64) -> ConflictableTransactionResult<bool, Error> {
    Ok(tree.get(&serialize_id(id)[..])?.is_some())
}

fn edge(
    friendships: &TransactionalTree,
    a: UserId,
    b: UserId,
) -> ConflictableTransactionResult<Option<Friendship>, Error> {
    for &(requester, target) in &[(a, b), (b, a)] {
        if let Some(status) = friendships.get(&pair_key(requester, target)[..])? {
            return Ok(Some(Friendship {
                requester,
                target,
                status: tx(decode(&status))?,
            }));
        }
    }
    Ok(None)
}

fn unlink(
    friendships: &TransactionalTree,
    friend_links: &TransactionalTree,
    a: UserId,
    b: UserId,
) -> ConflictableTransactionResult<bool, Error> {
    let removed = friendships.remove(&pair_key(a, b)[..])?.is_some()
        | friendships.remove(&pair_key(b, a)[..])?.is_some();
    for &(from, to) in &[(a, b), (b, a)] {
        let mut links = read_set(friend_links, from)?;
        if links.remove(&to) {
            write_set(friend_links, from, &links)?;
        }
    }
    Ok(removed)
}

/// Durable backend on top of sled. Values are bincode encoded; every
/// mutation touching more than one tree runs in a single transaction.
///
/// `get_users` and `get_films` iterate a tree without a snapshot, so a
/// listing may or may not include an entity added or removed meanwhile.
pub struct SledDb {
    db: sled::Db,
    users: sled::Tree,
    films: sled::Tree,
    meta: sled::Tree,
    friendships: sled::Tree,
    friend_links: sled::Tree,
    film_likes: sled::Tree,
    user_likes: sled::Tree,
}

impl SledDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SledDb> {
        SledDb::with_db(sled::open(path)?)
    }

    pub fn temporary() -> Result<SledDb> {
        SledDb::with_db(sled::Config::new().temporary(true).open()?)
    }

    pub fn with_db(db: sled::Db) -> Result<SledDb> {
        Ok(SledDb {
            users: db.open_tree(USERS)?,
            films: db.open_tree(FILMS)?,
            meta: db.open_tree(META)?,
            friendships: db.open_tree(FRIENDSHIPS)?,
            friend_links: db.open_tree(FRIEND_LINKS)?,
            film_likes: db.open_tree(FILM_LIKES)?,
            user_likes: db.open_tree(USER_LIKES)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn get_set(&self, tree: &sled::Tree, id: u64) -> Result<BTreeSet<u64>> {
        match tree.get(serialize_id(id))? {
            Some(data) => decode(&data),
            None => Ok(BTreeSet::new()),
        }
    }
}

impl UserDb for SledDb {
    fn add_user(&self, user: User) -> Result<User> {
        (&self.users, &self.meta)
            .transaction(|(users, meta)| {
                let id = next_id(meta, LAST_USER_ID)?;
                let user = User { id, ..user.clone() };
                users.insert(&serialize_id(id)[..], tx(encode(&user))?)?;
                Ok(user)
            })
            .map_err(from_transaction)
    }

    fn update_user(&self, user: User) -> Result<Option<User>> {
        let data = encode(&user)?;
        self.users
            .transaction(|users| {
                if !exists(users, user.id)? {
                    return Ok(None);
                }
                users.insert(&serialize_id(user.id)[..], data.clone())?;
                Ok(Some(user.clone()))
            })
            .map_err(from_transaction)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.users
            .get(serialize_id(id))?
            .map(|data| decode(&data))
            .transpose()
    }

    fn get_users(&self) -> Result<Vec<User>> {
        self.users
            .iter()
            .values()
            .map(|data| decode(&data?))
            .collect()
    }

    fn remove_user(&self, id: UserId) -> Result<bool> {
        (
            &self.users,
            &self.friendships,
            &self.friend_links,
            &self.film_likes,
            &self.user_likes,
        )
            .transaction(|(users, friendships, friend_links, film_likes, user_likes)| {
                if users.remove(&serialize_id(id)[..])?.is_none() {
                    return Ok(false);
                }
                for other in read_set(friend_links, id)? {
                    unlink(friendships, friend_links, id, other)?;
                }
                for film_id in read_set(user_likes, id)? {
                    let mut likers = read_set(film_likes, film_id)?;
                    likers.remove(&id);
                    write_set(film_likes, film_id, &likers)?;
                }
                user_likes.remove(&serialize_id(id)[..])?;
                Ok(true)
            })
            .map_err(from_transaction)
    }
}

impl FilmDb for SledDb {
    fn add_film(&self, film: Film) -> Result<Film> {
        (&self.films, &self.meta)
            .transaction(|(films, meta)| {
                let id = next_id(meta, LAST_FILM_ID)?;
                let film = Film { id, ..film.clone() };
                films.insert(&serialize_id(id)[..], tx(encode(&film))?)?;
                Ok(film)
            })
            .map_err(from_transaction)
    }

    fn update_film(&self, film: Film) -> Result<Option<Film>> {
        let data = encode(&film)?;
        self.films
            .transaction(|films| {
                if !exists(films, film.id)? {
                    return Ok(None);
                }
                films.insert(&serialize_id(film.id)[..], data.clone())?;
                Ok(Some(film.clone()))
            })
            .map_err(from_transaction)
    }

    fn get_film(&self, id: FilmId) -> Result<Option<Film>> {
        self.films
            .get(serialize_id(id))?
            .map(|data| decode(&data))
            .transpose()
    }

    fn get_films(&self) -> Result<Vec<Film>> {
        self.films
            .iter()
            .values()
            .map(|data| decode(&data?))
            .collect()
    }

    fn remove_film(&self, id: FilmId) -> Result<bool> {
        (&self.films, &self.film_likes, &self.user_likes)
            .transaction(|(films, film_likes, user_likes)| {
                if films.remove(&serialize_id(id)[..])?.is_none() {
                    return Ok(false);
                }
                for user_id in read_set(film_likes, id)? {
                    let mut liked = read_set(user_likes, user_id)?;
                    liked.remove(&id);
                    write_set(user_likes, user_id, &liked)?;
                }
                film_likes.remove(&serialize_id(id)[..])?;
                Ok(true)
            })
            .map_err(from_transaction)
    }
}

impl FriendDb for SledDb {
    fn get_friendship(&self, a: UserId, b: UserId) -> Result<Option<Friendship>> {
        self.friendships
            .transaction(|friendships| edge(friendships, a, b))
            .map_err(from_transaction)
    }

    fn get_friendships(&self, user_id: UserId) -> Result<Vec<Friendship>> {
        (&self.friendships, &self.friend_links)
            .transaction(|(friendships, friend_links)| {
                let mut edges = Vec::new();
                for other in read_set(friend_links, user_id)? {
                    if let Some(friendship) = edge(friendships, user_id, other)? {
                        edges.push(friendship);
                    }
                }
                Ok(edges)
            })
            .map_err(from_transaction)
    }

    fn put_friendship(&self, friendship: Friendship) -> Result<()> {
        let status = encode(&friendship.status)?;
        let Friendship {
            requester, target, ..
        } = friendship;
        (&self.users, &self.friendships, &self.friend_links)
            .transaction(|(users, friendships, friend_links)| {
                for &id in &[requester, target] {
                    if !exists(users, id)? {
                        return Err(ConflictableTransactionError::Abort(Error::user_not_found(id)));
                    }
                }
                friendships.remove(&pair_key(target, requester)[..])?;
                friendships.insert(&pair_key(requester, target)[..], status.clone())?;
                for &(from, to) in &[(requester, target), (target, requester)] {
                    let mut links = read_set(friend_links, from)?;
                    if links.insert(to) {
                        write_set(friend_links, from, &links)?;
                    }
                }
                Ok(())
            })
            .map_err(from_transaction)
    }

    fn remove_friendship(&self, a: UserId, b: UserId) -> Result<bool> {
        (&self.friendships, &self.friend_links)
            .transaction(|(friendships, friend_links)| unlink(friendships, friend_links, a, b))
            .map_err(from_transaction)
    }
}

impl LikeDb for SledDb {
    fn add_like(&self, film_id: FilmId, user_id: UserId) -> Result<bool> {
        (&self.films, &self.users, &self.film_likes, &self.user_likes)
            .transaction(|(films, users, film_likes, user_likes)| {
                if !exists(films, film_id)? {
                    return Err(ConflictableTransactionError::Abort(Error::film_not_found(
                        film_id,
                    )));
                }
                if !exists(users, user_id)? {
                    return Err(ConflictableTransactionError::Abort(Error::user_not_found(
                        user_id,
                    )));
                }
                let mut likers = read_set(film_likes, film_id)?;
                if !likers.insert(user_id) {
                    return Ok(false);
                }
                write_set(film_likes, film_id, &likers)?;
                let mut liked = read_set(user_likes, user_id)?;
                liked.insert(film_id);
                write_set(user_likes, user_id, &liked)?;
                Ok(true)
            })
            .map_err(from_transaction)
    }

    fn remove_like(&self, film_id: FilmId, user_id: UserId) -> Result<bool> {
        (&self.film_likes, &self.user_likes)
            .transaction(|(film_likes, user_likes)| {
                let mut likers = read_set(film_likes, film_id)?;
                let removed = likers.remove(&user_id);
                if removed {
                    write_set(film_likes, film_id, &likers)?;
                }
                let mut liked = read_set(user_likes, user_id)?;
                if liked.remove(&film_id) {
                    write_set(user_likes, user_id, &liked)?;
                }
                Ok(removed)
            })
            .map_err(from_transaction)
    }

    fn get_likes(&self, film_id: FilmId) -> Result<BTreeSet<UserId>> {
        self.get_set(&self.film_likes, film_id)
    }

    fn get_liked_films(&self, user_id: UserId) -> Result<BTreeSet<FilmId>> {
        self.get_set(&self.user_likes, user_id)
    }

    fn get_films_with_like_counts(&self) -> Result<Vec<(Film, usize)>> {
        let films = self.get_films()?;
        // All counts come from one transaction, so a cascade purging a user
        // from several films is seen either entirely or not at all.
        let counts = self
            .film_likes
            .transaction(|film_likes| {
                films
                    .iter()
                    .map(|film| read_set(film_likes, film.id).map(|likes| likes.len()))
                    .collect::<ConflictableTransactionResult<Vec<_>, Error>>()
            })
            .map_err(from_transaction)?;
        Ok(films.into_iter().zip(counts).collect())
    }
}

impl CatalogDb for SledDb {}
