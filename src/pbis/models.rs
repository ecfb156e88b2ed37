use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A guardian attached to a student account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Guardian {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaStudent {
    pub id: String,
    pub name: String,
    /// Cards given since the last collection
    #[serde(deserialize_with = "lenient_count")]
    pub student_pbis_cards_count: u32,
    #[serde(rename = "totalPBISCards", deserialize_with = "lenient_count")]
    pub total_pbis_cards: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub individual_pbis_level: u32,
    pub email: Option<String>,
    #[serde(rename = "parent", deserialize_with = "lenient_list")]
    pub parents: Vec<Guardian>,
}

/// A TA teacher and the team of students they advise
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaTeacher {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    pub ta_team_pbis_level: u32,
    #[serde(deserialize_with = "lenient_average")]
    pub ta_team_average_pbis_cards_per_student: f64,
    #[serde(deserialize_with = "lenient_list")]
    pub ta_students: Vec<TaStudent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeacherRef {
    pub name: String,
}

/// Contact details of someone recorded as a winner on a collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WinnerContact {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    #[serde(rename = "parent", deserialize_with = "lenient_list")]
    pub parents: Vec<Guardian>,
    pub ta_teacher: Option<TeacherRef>,
    pub individual_pbis_level: Option<u32>,
    pub ta_team_pbis_level: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RandomDrawingWin {
    pub id: String,
    pub student: WinnerContact,
}

/// One weekly collection run as recorded by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionDate {
    pub id: String,
    pub collection_date: DateTime<Utc>,
    pub collected_cards: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub random_drawing_winners: Vec<RandomDrawingWin>,
    #[serde(deserialize_with = "lenient_list")]
    pub personal_level_winners: Vec<WinnerContact>,
    #[serde(deserialize_with = "lenient_list")]
    pub ta_new_level_winners: Vec<WinnerContact>,
    #[serde(deserialize_with = "lenient_list")]
    pub staff_random_winners: Vec<WinnerContact>,
}

/// Everything a collection run reads from the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionSnapshot {
    #[serde(deserialize_with = "lenient_list")]
    pub pbis_collection_dates: Vec<CollectionDate>,
    #[serde(deserialize_with = "lenient_total")]
    pub pbis_cards_count: u64,
    #[serde(deserialize_with = "lenient_list")]
    pub ta_teachers: Vec<TaTeacher>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A TA team's standing after this period's cards are averaged in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamLevel {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub previous_level: u32,
    pub new_level: u32,
    pub ta_team_pbis_level_change: i64,
    pub new_cards_per_student: f64,
    pub student_count: usize,
}

impl TeamLevel {
    pub fn leveled_up(&self) -> bool {
        self.ta_team_pbis_level_change > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLevelUp {
    pub id: String,
    pub name: String,
    pub total_pbis_cards: u32,
    pub previous_level: u32,
    pub new_level: u32,
    pub level_change: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingWinner {
    pub id: String,
    pub name: String,
    pub ticket_count: u32,
}

/// What the operator reviews before confirming a run. Nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPreview {
    /// Stamped when the preview is staged; confirming must quote it back
    #[serde(default)]
    pub preview_id: String,
    pub total_cards: u64,
    pub ta_team_levels: Vec<TeamLevel>,
    pub ta_teams_leveling_up: Vec<TeamLevel>,
    pub students_leveling_up: Vec<StudentLevelUp>,
    pub random_drawing_winners: Vec<DrawingWinner>,
    pub has_recent_collection: bool,
    pub days_since_last_collection: Option<i64>,
}

impl CollectionPreview {
    pub fn is_empty(&self) -> bool {
        self.ta_teams_leveling_up.is_empty()
            && self.students_leveling_up.is_empty()
            && self.random_drawing_winners.is_empty()
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.min(u32::MAX as f64) as u32)
        .unwrap_or_default())
}

fn lenient_total<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v as u64)
        .unwrap_or_default())
}

fn lenient_average<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite()).unwrap_or_default())
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
