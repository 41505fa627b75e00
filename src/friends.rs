//! Friendship graph over users.
//!
//! Friendship follows a request/confirm lifecycle. `add_friend(a, b)` records
//! a pending request from `a` to `b`, which `a` already lists as a friend. The
//! request becomes mutual once `b` confirms it or asks for the friendship
//! back. Removing a friendship unlinks both sides.

use crate::database::Storage;
use crate::error::{Error, Result};
use crate::model::*;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

pub struct FriendGraph<S> {
    storage: Arc<S>,
    // Serializes the read-modify-write sequences on friendship edges.
    write_lock: Mutex<()>,
}

impl<S: Storage> FriendGraph<S> {
    pub fn new(storage: Arc<S>) -> FriendGraph<S> {
        FriendGraph {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn require_user(&self, id: UserId) -> Result<User> {
        self.storage.get_user(id)?.ok_or_else(|| {
            warn!("User {} not found", id);
            Error::user_not_found(id)
        })
    }

    fn require_pair(&self, user_id: UserId, friend_id: UserId) -> Result<()> {
        self.require_user(user_id)?;
        self.require_user(friend_id)?;
        if user_id == friend_id {
            warn!("User {} cannot befriend themselves", user_id);
            return Err(Error::Validation(
                "a user cannot be their own friend".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn add_friend(&self, user_id: UserId, friend_id: UserId) -> Result<()> {
        let _guard = self.write_lock.lock()?;
        self.require_pair(user_id, friend_id)?;
        match self.storage.get_friendship(user_id, friend_id)? {
            None => {
                self.storage
                    .put_friendship(Friendship::pending(user_id, friend_id))?;
                info!("User {} sent a friend request to {}", user_id, friend_id);
            }
            Some(edge) if edge.is_confirmed() || edge.requester == user_id => {
                warn!("User {} is already friends with {}", user_id, friend_id);
            }
            Some(edge) => {
                self.storage.put_friendship(Friendship {
                    status: FriendshipStatus::Confirmed,
                    ..edge
                })?;
                info!(
                    "Users {} and {} asked each other, friendship confirmed",
                    user_id, friend_id
                );
            }
        }
        Ok(())
    }

    /// Accepts the pending request `friend_id` sent to `user_id`.
    pub fn confirm_friendship(&self, user_id: UserId, friend_id: UserId) -> Result<()> {
        let _guard = self.write_lock.lock()?;
        self.require_pair(user_id, friend_id)?;
        match self.storage.get_friendship(user_id, friend_id)? {
            Some(edge) if edge.is_confirmed() => {
                debug!("Friendship of {} and {} already confirmed", user_id, friend_id);
                Ok(())
            }
            Some(edge) if edge.requester == friend_id => {
                self.storage.put_friendship(Friendship {
                    status: FriendshipStatus::Confirmed,
                    ..edge
                })?;
                info!("User {} confirmed friendship with {}", user_id, friend_id);
                Ok(())
            }
            _ => {
                warn!(
                    "User {} has no friend request from {} to confirm",
                    user_id, friend_id
                );
                Err(Error::Validation(format!(
                    "no pending friend request from user {} to user {}",
                    friend_id, user_id
                )))
            }
        }
    }

    pub fn delete_friend(&self, user_id: UserId, friend_id: UserId) -> Result<()> {
        let _guard = self.write_lock.lock()?;
        self.require_user(user_id)?;
        self.require_user(friend_id)?;
        if !self.storage.remove_friendship(user_id, friend_id)? {
            warn!(
                "No friendship between users {} and {} to delete",
                user_id, friend_id
            );
            return Err(Error::FriendshipNotFound { user_id, friend_id });
        }
        info!("User {} removed {} from friends", user_id, friend_id);
        Ok(())
    }

    /// Ids the user lists as friends.
    fn friend_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>> {
        Ok(self
            .storage
            .get_friendships(user_id)?
            .into_iter()
            .filter(|edge| edge.is_visible_to(user_id))
            .map(|edge| edge.counterpart(user_id))
            .collect())
    }

    fn resolve(&self, ids: BTreeSet<UserId>) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            match self.storage.get_user(id)? {
                Some(user) => users.push(user),
                None => warn!("Friend {} no longer exists, skipping", id),
            }
        }
        Ok(users)
    }

    /// Friends of the user, ordered by id.
    pub fn get_friends(&self, user_id: UserId) -> Result<Vec<User>> {
        self.require_user(user_id)?;
        self.resolve(self.friend_ids(user_id)?)
    }

    pub fn get_common_friends(&self, user_id: UserId, other_id: UserId) -> Result<Vec<User>> {
        self.require_user(user_id)?;
        self.require_user(other_id)?;
        let ours = self.friend_ids(user_id)?;
        let theirs = self.friend_ids(other_id)?;
        self.resolve(ours.intersection(&theirs).copied().collect())
    }
}
