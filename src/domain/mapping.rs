// Normalization of raw observations and row/domain conversions

use entities::progress;

use super::models::{Observation, ProgressEntry, UNKNOWN_PLATFORM, progress_key};

/// An observation that passed validation, paired with the key it will be
/// stored under. `liked` is always false here; the caller merges the prior
/// stored flag before writing.
#[derive(Debug, Clone)]
pub struct NormalizedObservation {
    pub key: String,
    pub entry: ProgressEntry,
}

/// Turn a raw observation into a storable entry, making every default
/// explicit. Returns `None` when the title is missing, which callers treat
/// as "drop", not as an error.
pub fn normalize(obs: &Observation, user_id: &str, now_ms: i64) -> Option<NormalizedObservation> {
    if obs.title.trim().is_empty() {
        return None;
    }
    let platform = match obs.platform.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => UNKNOWN_PLATFORM,
    };
    let key = progress_key(user_id, platform, &obs.title);
    let entry = ProgressEntry {
        title: obs.title.clone(),
        episode: obs.episode.clone().unwrap_or_default(),
        time: sanitize_seconds(obs.time),
        duration: sanitize_seconds(obs.duration),
        liked: false,
        cover: obs.cover.clone().unwrap_or_default(),
        url: obs.url.clone().unwrap_or_default(),
        platform: platform.to_string(),
        last_updated: now_ms,
    };
    Some(NormalizedObservation { key, entry })
}

/// Playback positions must be finite and non-negative; anything else becomes
/// an explicit zero instead of propagating garbage into the store.
fn sanitize_seconds(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}

/// Everything before the first `#`; resume matching ignores URL fragments.
pub fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

pub fn entry_from_row(row: progress::Model) -> ProgressEntry {
    ProgressEntry {
        title: row.title,
        episode: row.episode,
        time: row.time,
        duration: row.duration,
        liked: row.liked,
        cover: row.cover,
        url: row.url,
        platform: row.platform,
        last_updated: row.last_updated,
    }
}
