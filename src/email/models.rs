use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::pbis::models::Guardian;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WinnerKind {
    Personal,
    TaTeam,
    Staff,
    RandomDrawing,
}

impl WinnerKind {
    /// Personal and drawing winners are students with guardians on file
    pub fn is_student(&self) -> bool {
        matches!(self, WinnerKind::Personal | WinnerKind::RandomDrawing)
    }
}

/// Anyone recorded as a winner on a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub guardians: Vec<Guardian>,
    pub kind: WinnerKind,
    pub level: Option<u32>,
    pub ta_teacher: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to_address: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailOptions {
    pub from_address: String,
    pub email_guardians: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailFailure {
    pub to_address: String,
    pub error: String,
}

/// Outcome of a notification pass; failures never stop the pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailReport {
    pub total: usize,
    pub sent: usize,
    pub failures: Vec<EmailFailure>,
}

impl EmailReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.sent == self.total
    }
}
