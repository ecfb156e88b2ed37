use chrono::{DateTime, Duration, Months, Utc};
use tracing::{debug, instrument};

use crate::config::{PbisConfig, MAX_FALLBACK_WINDOW_YEARS};

use super::drawing::draw_winners;
use super::levels::{flatten_students, students_leveling_up, team_levels, teams_leveling_up};
use super::models::{CollectionDate, CollectionPreview, CollectionSnapshot};
use super::random::RandomSource;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Runs both calculators over a snapshot. Nothing is persisted.
#[instrument(skip_all, fields(teams = snapshot.ta_teachers.len()))]
pub fn calculate_preview(
    snapshot: &CollectionSnapshot,
    config: &PbisConfig,
    now: DateTime<Utc>,
    rng: &mut dyn RandomSource,
) -> CollectionPreview {
    let students = flatten_students(&snapshot.ta_teachers);
    let ta_team_levels = team_levels(&snapshot.ta_teachers, config);
    let ta_teams_leveling_up = teams_leveling_up(&ta_team_levels);
    let students_leveling_up = students_leveling_up(&students, config);
    let random_drawing_winners =
        draw_winners(&students, &snapshot.pbis_collection_dates, config, rng);

    let days_since_last_collection = days_since_last_collection(&snapshot.pbis_collection_dates, now);
    let has_recent_collection =
        days_since_last_collection.is_some_and(|days| days < config.recent_collection_days);

    debug!(
        students = students.len(),
        teams_leveling_up = ta_teams_leveling_up.len(),
        students_leveling_up = students_leveling_up.len(),
        drawing_winners = random_drawing_winners.len(),
        has_recent_collection,
        "Collection preview calculated"
    );

    CollectionPreview {
        preview_id: String::new(),
        total_cards: snapshot.pbis_cards_count,
        ta_team_levels,
        ta_teams_leveling_up,
        students_leveling_up,
        random_drawing_winners,
        has_recent_collection,
        days_since_last_collection,
    }
}

pub fn latest_collection(history: &[CollectionDate]) -> Option<&CollectionDate> {
    history.iter().max_by_key(|collection| collection.collection_date)
}

/// Whole days since the latest collection, rounded up
pub fn days_since_last_collection(history: &[CollectionDate], now: DateTime<Utc>) -> Option<i64> {
    let latest = latest_collection(history)?;
    let elapsed = (now - latest.collection_date).num_seconds().abs();
    Some((elapsed + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY)
}

/// Cards are counted from the latest collection, or from the fallback window when there is none
pub fn collection_window_start(
    history: &[CollectionDate],
    now: DateTime<Utc>,
    config: &PbisConfig,
) -> DateTime<Utc> {
    if let Some(latest) = latest_collection(history) {
        return latest.collection_date;
    }
    let years = config
        .fallback_window_years
        .clamp(0, MAX_FALLBACK_WINDOW_YEARS) as u32;
    now.checked_sub_months(Months::new(years * 12))
        .unwrap_or_else(|| now - Duration::days(365 * i64::from(years)))
}
