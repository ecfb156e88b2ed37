use std::collections::HashSet;

use super::models::{CollectionDate, StaffMember};
use super::random::RandomSource;

/// Staff who have never won a staff drawing
pub fn available_staff<'a>(
    staff: &'a [StaffMember],
    history: &[CollectionDate],
) -> Vec<&'a StaffMember> {
    let previous_winners: HashSet<&str> = history
        .iter()
        .flat_map(|collection| collection.staff_random_winners.iter())
        .map(|winner| winner.id.as_str())
        .collect();

    staff
        .iter()
        .filter(|member| !previous_winners.contains(member.id.as_str()))
        .collect()
}

/// Uniform pick of up to `count` distinct staff members
pub fn pick_staff_winners(
    available: &[&StaffMember],
    count: usize,
    rng: &mut dyn RandomSource,
) -> Vec<StaffMember> {
    let mut pool: Vec<&StaffMember> = available.to_vec();
    let mut winners = Vec::with_capacity(count.min(pool.len()));
    while winners.len() < count && !pool.is_empty() {
        let index = rng.next_index(pool.len());
        winners.push(pool.swap_remove(index).clone());
    }
    winners
}
