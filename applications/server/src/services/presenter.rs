/// Presentation service - response view assembly and relative-time labels
use crate::services::loader::LoadedProfiles;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Rendered roster: row count, the latency label, and one view row per
/// stored profile in load order.
#[derive(Debug, Clone, Serialize)]
pub struct ProfilesView {
    pub count: usize,
    pub elapsed_label: String,
    pub profiles: Vec<ProfileView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub joined: String,
    pub image: String,
}

/// Assemble the response view for a finished load.
pub fn present(loaded: &LoadedProfiles, now: DateTime<Utc>) -> ProfilesView {
    let profiles = loaded
        .profiles
        .iter()
        .map(|profile| ProfileView {
            name: profile.name.clone(),
            email: profile.email.clone(),
            joined: time_ago(profile.created_at, now),
            image: profile.image.clone(),
        })
        .collect();

    ProfilesView {
        count: loaded.profiles.len(),
        elapsed_label: format!(
            "Fetched {} users in {}ms",
            loaded.profiles.len(),
            loaded.elapsed.as_millis()
        ),
        profiles,
    }
}

/// Compact relative-time label for a join timestamp: `just now` under a
/// minute, then `5m ago`, `3h ago`, `2d ago`, `1w ago`, `4mo ago`,
/// `2y ago` by floor division. Future timestamps clamp to `just now`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let seconds = (now - then).num_seconds().max(0);
    if seconds < MINUTE {
        return "just now".to_string();
    }

    let (value, unit) = if seconds >= YEAR {
        (seconds / YEAR, "y")
    } else if seconds >= MONTH {
        (seconds / MONTH, "mo")
    } else if seconds >= WEEK {
        (seconds / WEEK, "w")
    } else if seconds >= DAY {
        (seconds / DAY, "d")
    } else if seconds >= HOUR {
        (seconds / HOUR, "h")
    } else {
        (seconds / MINUTE, "m")
    };

    format!("{value}{unit} ago")
}
