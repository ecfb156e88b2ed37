use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::PbisError;
use super::models::{CollectionPreview, DrawingWinner, StudentLevelUp, TeamLevel};

/// Create-collection mutation input. Winner sets travel as JSON strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollection {
    pub name: String,
    pub collection_date: DateTime<Utc>,
    pub collected_cards: String,
    pub random_drawing_winners: String,
    pub personal_level_winners: String,
    pub ta_team_levels: String,
    pub ta_team_new_level_winners: String,
}

impl NewCollection {
    pub fn from_preview(
        preview: &CollectionPreview,
        collection_date: DateTime<Utc>,
    ) -> Result<Self, PbisError> {
        Ok(Self {
            name: format!("PBIS Collection {}", collection_date.format("%Y-%m-%d")),
            collection_date,
            collected_cards: preview.total_cards.to_string(),
            random_drawing_winners: serde_json::to_string(&preview.random_drawing_winners)?,
            personal_level_winners: serde_json::to_string(&preview.students_leveling_up)?,
            ta_team_levels: serde_json::to_string(&preview.ta_team_levels)?,
            ta_team_new_level_winners: serde_json::to_string(&preview.ta_teams_leveling_up)?,
        })
    }

    pub fn decode_random_drawing_winners(&self) -> Result<Vec<DrawingWinner>, PbisError> {
        Ok(serde_json::from_str(&self.random_drawing_winners)?)
    }

    pub fn decode_personal_level_winners(&self) -> Result<Vec<StudentLevelUp>, PbisError> {
        Ok(serde_json::from_str(&self.personal_level_winners)?)
    }

    pub fn decode_ta_team_levels(&self) -> Result<Vec<TeamLevel>, PbisError> {
        Ok(serde_json::from_str(&self.ta_team_levels)?)
    }

    pub fn decode_ta_team_new_level_winners(&self) -> Result<Vec<TeamLevel>, PbisError> {
        Ok(serde_json::from_str(&self.ta_team_new_level_winners)?)
    }
}

/// A stored level field the backend must refresh after a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecalculationTarget {
    Student { id: String, individual_pbis_level: u32 },
    TaTeam {
        id: String,
        ta_team_pbis_level: u32,
        average_pbis_cards_per_student: i64,
    },
}

impl RecalculationTarget {
    pub fn id(&self) -> &str {
        match self {
            RecalculationTarget::Student { id, .. } => id,
            RecalculationTarget::TaTeam { id, .. } => id,
        }
    }
}

impl fmt::Display for RecalculationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecalculationTarget::Student { id, .. } => write!(f, "student {}", id),
            RecalculationTarget::TaTeam { id, .. } => write!(f, "ta team {}", id),
        }
    }
}

/// Every team (its average carries forward each week) and every student who leveled up
pub fn recalculation_targets(preview: &CollectionPreview) -> Vec<RecalculationTarget> {
    let teams = preview
        .ta_team_levels
        .iter()
        .map(|team| RecalculationTarget::TaTeam {
            id: team.id.clone(),
            ta_team_pbis_level: team.new_level,
            average_pbis_cards_per_student: team.new_cards_per_student.round() as i64,
        });
    let students = preview
        .students_leveling_up
        .iter()
        .map(|student| RecalculationTarget::Student {
            id: student.id.clone(),
            individual_pbis_level: student.new_level,
        });
    teams.chain(students).collect()
}
