use std::collections::HashSet;

use tracing::debug;

use crate::config::PbisConfig;

use super::models::{CollectionDate, DrawingWinner, TaStudent};
use super::random::RandomSource;

/// Students who won the drawing in any of the `window` latest collections
pub fn recent_drawing_winner_ids(history: &[CollectionDate], window: usize) -> HashSet<String> {
    let mut latest_first: Vec<&CollectionDate> = history.iter().collect();
    latest_first.sort_by(|a, b| b.collection_date.cmp(&a.collection_date));

    latest_first
        .into_iter()
        .take(window)
        .flat_map(|collection| collection.random_drawing_winners.iter())
        .map(|win| win.student.id.clone())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Students holding cards this period who are not sitting out, one entry per id
pub fn eligible_students<'a>(
    students: &[&'a TaStudent],
    excluded: &HashSet<String>,
) -> Vec<&'a TaStudent> {
    let mut seen = HashSet::new();
    let mut eligible = Vec::new();
    for &student in students {
        if student.student_pbis_cards_count == 0 || excluded.contains(&student.id) {
            continue;
        }
        if seen.insert(student.id.as_str()) {
            eligible.push(student);
        }
    }
    eligible
}

/// One ticket per card held
pub fn ticket_total(pool: &[&TaStudent]) -> u64 {
    pool.iter()
        .map(|student| u64::from(student.student_pbis_cards_count))
        .sum()
}

/// Index of the student holding ticket number `ticket`, counting through the pool in order
fn ticket_holder(pool: &[&TaStudent], mut ticket: u64) -> Option<usize> {
    pool.iter().position(|student| {
        let held = u64::from(student.student_pbis_cards_count);
        if ticket < held {
            true
        } else {
            ticket -= held;
            false
        }
    })
}

/// Weighted drawing without replacement.
///
/// Each round picks one ticket uniformly from the students not yet drawn,
/// so a student's odds are proportional to their cards. Tickets are never
/// materialized; the pick walks cumulative card counts. Stops early once
/// the pool runs dry.
pub fn draw_winners(
    students: &[&TaStudent],
    history: &[CollectionDate],
    config: &PbisConfig,
    rng: &mut dyn RandomSource,
) -> Vec<DrawingWinner> {
    if !config.random_drawing_enabled {
        debug!("Random drawing disabled, skipping");
        return Vec::new();
    }

    let excluded = recent_drawing_winner_ids(history, config.collections_without_repeat_winners);
    let eligible = eligible_students(students, &excluded);
    let tickets = ticket_total(&eligible);

    let mut pool = eligible.clone();
    let mut drawn: Vec<&TaStudent> = Vec::new();
    for _ in 0..config.weekly_winner_count {
        let remaining = ticket_total(&pool);
        if remaining == 0 {
            break;
        }
        let Some(index) = ticket_holder(&pool, rng.next_below(remaining)) else {
            break;
        };
        drawn.push(pool.remove(index));
    }

    debug!(
        excluded = excluded.len(),
        eligible = eligible.len(),
        tickets,
        winners = drawn.len(),
        "Random drawing complete"
    );

    drawn
        .into_iter()
        .map(|student| DrawingWinner {
            id: student.id.clone(),
            name: student.name.clone(),
            ticket_count: student.student_pbis_cards_count,
        })
        .collect()
}
