// Domain models for the watch-progress reconciliation core

use serde::{Deserialize, Serialize};

/// User id under which entries are keyed while no session exists.
pub const LOCAL_USER_ID: &str = "local";

/// Platform sentinel for observations that do not carry one.
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// One raw progress report from page instrumentation. Untrusted; everything
/// except `title` is optional, and a missing `title` means the observation
/// gets dropped rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Observation {
    pub title: String,
    pub episode: Option<String>,
    pub time: Option<f64>,
    pub duration: Option<f64>,
    pub cover: Option<String>,
    pub url: Option<String>,
    pub platform: Option<String>,
}

/// Normalized watch state for one (user, platform, title). Doubles as the
/// wire shape shipped to the backend sync endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub title: String,
    pub episode: String,
    pub time: f64,
    pub duration: f64,
    pub liked: bool,
    pub cover: String,
    pub url: String,
    pub platform: String,
    /// Milliseconds since epoch, stamped at ingestion.
    pub last_updated: i64,
}

/// Composite identity for one progress record, case-sensitive.
pub fn progress_key(user_id: &str, platform: &str, title: &str) -> String {
    format!("{user_id}:{platform}:{title}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user_id: String,
}

/// Bearer credential pair for the backend. Token and user id are set and
/// cleared together; partial auth state is unrepresentable.
#[derive(Debug, Default)]
pub struct AuthSession {
    credentials: Option<Credentials>,
}

impl AuthSession {
    pub fn set(&mut self, token: impl Into<String>, user_id: impl Into<String>) {
        self.credentials = Some(Credentials {
            token: token.into(),
            user_id: user_id.into(),
        });
    }

    pub fn clear(&mut self) {
        self.credentials = None;
    }

    pub fn get(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.token.as_str())
    }

    /// The id entries are keyed under: the session's user when
    /// authenticated, the local default otherwise.
    pub fn user_id(&self) -> &str {
        self.credentials
            .as_ref()
            .map(|c| c.user_id.as_str())
            .unwrap_or(LOCAL_USER_ID)
    }
}
