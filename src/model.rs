use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

pub type UserId = u64;
pub type FilmId = u64;

/// Reads an explicit JSON `null` as an empty string. Binary formats always
/// carry the plain string.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    if deserializer.is_human_readable() {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    } else {
        String::deserialize(deserializer)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[serde(default)]
    pub id: UserId,
    pub email: String,
    pub login: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    pub birthday: NaiveDate,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    #[serde(default)]
    pub id: FilmId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: i32,
    pub mpa: MpaRating,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

/// Entry of the fixed MPA rating scale. Clients may send only the id, the
/// name is filled in from the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MpaRating {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Genre {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipStatus {
    Pending,
    Confirmed,
}

/// A friendship edge. At most one exists per unordered pair of users.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Friendship {
    pub requester: UserId,
    pub target: UserId,
    pub status: FriendshipStatus,
}

impl Friendship {
    pub fn pending(requester: UserId, target: UserId) -> Friendship {
        Friendship {
            requester,
            target,
            status: FriendshipStatus::Pending,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == FriendshipStatus::Confirmed
    }

    pub fn counterpart(&self, user_id: UserId) -> UserId {
        if self.requester == user_id {
            self.target
        } else {
            self.requester
        }
    }

    /// Whether `user_id` lists the counterpart as a friend: requesters see
    /// their own requests, targets only once confirmed.
    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        self.requester == user_id || (self.target == user_id && self.is_confirmed())
    }
}
