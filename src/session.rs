//! Local proof-of-login with a fixed lifetime.
//!
//! The record gates dashboard access only. It is never sent anywhere, so the
//! token needs to be unique, not unguessable.

use crate::clock::Clock;
use crate::model::SessionUser;
use crate::store::{KvStore, StoreResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub const SESSION_KEY: &str = "session";
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    pub login_time: DateTime<Utc>,
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires
    }
}

pub struct SessionManager<'a> {
    store: &'a KvStore,
    clock: &'a dyn Clock,
}

impl<'a> SessionManager<'a> {
    pub fn new(store: &'a KvStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn create(&self, user: SessionUser) -> StoreResult<Session> {
        let now = self.clock.now();
        let session = Session {
            user,
            login_time: now,
            token: generate_token(),
            expires: now + Duration::days(SESSION_TTL_DAYS),
        };
        self.store.set(SESSION_KEY, &session)?;
        info!(user_id = %session.user.user_id, role = session.user.role.as_str(), "session created");
        Ok(session)
    }

    pub fn get(&self) -> StoreResult<Option<Session>> {
        self.store.get(SESSION_KEY)
    }

    pub fn is_valid(&self) -> StoreResult<bool> {
        self.is_valid_at(self.clock.now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.get()?.map(|s| s.is_valid_at(now)).unwrap_or(false))
    }

    /// The stored session if it has not expired.
    pub fn current(&self) -> StoreResult<Option<Session>> {
        let now = self.clock.now();
        Ok(self.get()?.filter(|s| s.is_valid_at(now)))
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.store.remove(SESSION_KEY)?;
        info!("session cleared");
        Ok(())
    }
}

fn generate_token() -> String {
    format!("zames_{}", Uuid::new_v4().simple())
}
