// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::google::OAuthVerifier;
use crate::auth::session::SessionKeys;
use crate::common::config::AppConfig;
use crate::itineraries::ItineraryStore;
use crate::users::UserStore;

/// Application state containing database pool, stores, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub sessions: SessionKeys,
    pub users: UserStore,
    pub itineraries: ItineraryStore,
    pub oauth: Arc<dyn OAuthVerifier>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig, oauth: Arc<dyn OAuthVerifier>) -> Self {
        let sessions = SessionKeys::from_config(&config);
        let locks = crate::common::RelationLocks::new();
        let users = UserStore::new(db.clone(), locks.clone()).with_hash_cost(config.bcrypt_cost);
        let itineraries = ItineraryStore::new(db.clone(), locks);

        Self {
            db,
            config,
            sessions,
            users,
            itineraries,
            oauth,
        }
    }
}
