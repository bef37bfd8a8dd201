//! WebSocket Session Management

use std::time::{Duration, Instant};

/// Per-connection state owned by the socket task
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub user_id: i64,
    pub last_activity: Instant,
}

impl SessionState {
    pub fn new(session_id: String, user_id: i64) -> Self {
        Self {
            session_id,
            user_id,
            last_activity: Instant::now(),
        }
    }

    /// Record client traffic.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_alive(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() < idle_timeout
    }
}
