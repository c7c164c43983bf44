//! Live per-user sessions.
//!
//! The registry holds one session per user with an open conversation. Events
//! for the same user serialize on the session mutex; unrelated users never
//! contend. Idle sessions are evicted by a periodic sweep with a
//! configurable threshold.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::types::UserId;

use super::state::ConversationState;

/// One user's open conversation.
#[derive(Debug)]
pub struct Session {
    pub state: ConversationState,
    last_activity: Instant,
}

impl Session {
    fn new(state: ConversationState) -> Self {
        Self {
            state,
            last_activity: Instant::now(),
        }
    }

    /// Mark the session as active now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Registry of open sessions keyed by user.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's session, creating one in `initial` state if none is open.
    pub async fn get_or_create(
        &self,
        user: UserId,
        initial: ConversationState,
    ) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&user) {
                return session.clone();
            }
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(initial))))
            .clone()
    }

    pub async fn get(&self, user: UserId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&user).cloned()
    }

    /// Drop the user's session (completion or cancellation).
    pub async fn remove(&self, user: UserId) {
        self.sessions.write().await.remove(&user);
    }

    pub async fn open_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions idle longer than `max_idle`. Returns how many were
    /// evicted. Sessions currently locked by an in-flight event are skipped
    /// and picked up by a later sweep.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut stale = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (user, session) in sessions.iter() {
                if let Ok(session) = session.try_lock() {
                    if session.idle_for() >= max_idle {
                        stale.push(*user);
                    }
                }
            }
        }
        if stale.is_empty() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        let mut evicted = 0;
        for user in stale {
            // Re-check under the write lock: the session may have become
            // active between the scan and now.
            let still_idle = match sessions.get(&user) {
                Some(session) => match session.try_lock() {
                    Ok(session) => session.idle_for() >= max_idle,
                    Err(_) => false,
                },
                None => false,
            };
            if still_idle {
                sessions.remove(&user);
                evicted += 1;
            }
        }
        evicted
    }
}
