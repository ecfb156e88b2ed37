use crate::config::{LevelOverflow, PbisConfig};

use super::models::{StudentLevelUp, TaStudent, TaTeacher, TeamLevel};

/// Individual level for a lifetime card total.
///
/// Levels are 0-indexed positions in the threshold ladder: the first rung
/// whose cutoff is at least `total - 1`. Totals past the last rung follow
/// the configured [`LevelOverflow`] policy; `None` means no level is defined.
pub fn individual_level(total_cards: u32, config: &PbisConfig) -> Option<u32> {
    let ladder = &config.personal_level_thresholds;
    let floor = total_cards.saturating_sub(1);

    match ladder.iter().position(|&cutoff| cutoff >= floor) {
        Some(index) => Some(index as u32),
        None => match config.level_overflow {
            LevelOverflow::ClampToHighest => ladder.len().checked_sub(1).map(|i| i as u32),
            LevelOverflow::Exclude => None,
        },
    }
}

/// Every student on every team, in roster order
pub fn flatten_students(teams: &[TaTeacher]) -> Vec<&TaStudent> {
    teams.iter().flat_map(|team| team.ta_students.iter()).collect()
}

/// Carries each team's average forward with this period's cards and derives its level
pub fn team_levels(teams: &[TaTeacher], config: &PbisConfig) -> Vec<TeamLevel> {
    teams.iter().map(|team| team_level(team, config)).collect()
}

fn team_level(team: &TaTeacher, config: &PbisConfig) -> TeamLevel {
    let period_cards: u64 = team
        .ta_students
        .iter()
        .map(|student| u64::from(student.student_pbis_cards_count))
        .sum();
    let denominator = team.ta_students.len().max(1) as f64;
    let new_average =
        period_cards as f64 / denominator + team.ta_team_average_pbis_cards_per_student;

    let points_per_level = f64::from(config.cards_per_ta_level.max(1));
    let new_level = (new_average / points_per_level).floor().max(0.0) as u32;

    TeamLevel {
        id: team.id.clone(),
        name: team.name.clone(),
        email: team.email.clone(),
        previous_level: team.ta_team_pbis_level,
        new_level,
        ta_team_pbis_level_change: i64::from(new_level) - i64::from(team.ta_team_pbis_level),
        new_cards_per_student: new_average,
        student_count: team.ta_students.len(),
    }
}

/// Teams whose level went up this period
pub fn teams_leveling_up(levels: &[TeamLevel]) -> Vec<TeamLevel> {
    levels.iter().filter(|team| team.leveled_up()).cloned().collect()
}

/// Students who crossed at least one rung since their stored level
pub fn students_leveling_up(students: &[&TaStudent], config: &PbisConfig) -> Vec<StudentLevelUp> {
    students
        .iter()
        .filter(|student| student.total_pbis_cards > 0)
        .filter_map(|student| {
            let new_level = individual_level(student.total_pbis_cards, config)?;
            let level_change = i64::from(new_level) - i64::from(student.individual_pbis_level);
            (level_change > 0).then(|| StudentLevelUp {
                id: student.id.clone(),
                name: student.name.clone(),
                total_pbis_cards: student.total_pbis_cards,
                previous_level: student.individual_pbis_level,
                new_level,
                level_change,
            })
        })
        .collect()
}
