//! In-memory identity store for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::auth::user_store::{IdentityStore, StoreError, StoreFuture};
use crate::db::schema::UserRecord;
use crate::types::UserId;

/// Identity store backed by a map, counting every read.
#[derive(Default)]
pub struct MemoryIdentityStore {
    users: HashMap<UserId, UserRecord>,
    reads: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user named `user-<id>`.
    pub fn with_user(mut self, id: i64) -> Self {
        self.users.insert(UserId::new(id), sample_user(id));
        self
    }

    pub fn with_users(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        for id in ids {
            self.users.insert(UserId::new(id), sample_user(id));
        }
        self
    }

    /// Make every subsequent read fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn find_user(&self, id: UserId) -> StoreFuture<'_, Option<UserRecord>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            // yield so concurrent requests interleave
            tokio::task::yield_now().await;
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(self.users.get(&id).cloned())
        })
    }
}

pub fn sample_user(id: i64) -> UserRecord {
    UserRecord {
        id,
        username: format!("user-{}", id),
        email: format!("user-{}@example.com", id),
        password_hash: String::new(),
        bio: None,
        image: None,
        created_at: None,
    }
}
