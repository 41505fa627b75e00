pub mod api;
pub mod catalog;
pub mod config;
pub mod database;
pub mod entities;
pub mod error;
pub mod friends;
pub mod likes;
pub mod model;
pub mod ranking;

use database::Storage;
use entities::EntityStore;
use friends::FriendGraph;
use likes::LikeEngine;
use ranking::PopularityRanker;
use std::sync::Arc;

/// The relationship and ranking engine over one shared storage backend.
pub struct Cinegraph<S> {
    pub entities: EntityStore<S>,
    pub friends: FriendGraph<S>,
    pub likes: LikeEngine<S>,
    pub ranker: PopularityRanker<S>,
}

impl<S: Storage> Cinegraph<S> {
    pub fn new(storage: S) -> Cinegraph<S> {
        let storage = Arc::new(storage);
        Cinegraph {
            entities: EntityStore::new(storage.clone()),
            friends: FriendGraph::new(storage.clone()),
            likes: LikeEngine::new(storage.clone()),
            ranker: PopularityRanker::new(storage),
        }
    }
}
