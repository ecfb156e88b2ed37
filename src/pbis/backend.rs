use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::errors::PbisError;
use super::models::{
    CollectionDate, CollectionSnapshot, RandomDrawingWin, StaffMember, TaTeacher, TeacherRef,
    WinnerContact,
};
use super::payload::{NewCollection, RecalculationTarget};

/// The school backend the collection run reads from and writes to
#[async_trait]
pub trait PbisBackend: Send + Sync {
    async fn collection_dates(&self) -> Result<Vec<CollectionDate>, PbisError>;
    /// Teams, rosters and card counts for cards given after `since`
    async fn collection_snapshot(
        &self,
        since: DateTime<Utc>,
    ) -> Result<CollectionSnapshot, PbisError>;
    /// Returns the id of the new collection record
    async fn create_collection(&self, collection: &NewCollection) -> Result<String, PbisError>;
    async fn recalculate(&self, target: &RecalculationTarget) -> Result<(), PbisError>;
    async fn revalidate(&self, path: &str) -> Result<(), PbisError>;
    async fn staff_members(&self) -> Result<Vec<StaffMember>, PbisError>;
    async fn add_staff_winner(&self, collection_id: &str, staff_id: &str)
        -> Result<(), PbisError>;
}

/// Initial contents for [`InMemoryPbisBackend`], usually loaded from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSeed {
    pub ta_teachers: Vec<TaTeacher>,
    pub staff: Vec<StaffMember>,
    pub pbis_collection_dates: Vec<CollectionDate>,
}

#[derive(Debug, Default)]
struct BackendData {
    teachers: Vec<TaTeacher>,
    staff: Vec<StaffMember>,
    collections: Vec<CollectionDate>,
    recalculations: Vec<RecalculationTarget>,
    revalidated_paths: Vec<String>,
}

/// In-memory backend for development and tests.
///
/// Period card counts stand in for "cards given since the last collection"
/// and are zeroed when a collection is created.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPbisBackend {
    data: Arc<RwLock<BackendData>>,
}

impl InMemoryPbisBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: BackendSeed) -> Self {
        Self {
            data: Arc::new(RwLock::new(BackendData {
                teachers: seed.ta_teachers,
                staff: seed.staff,
                collections: seed.pbis_collection_dates,
                ..BackendData::default()
            })),
        }
    }

    pub async fn teachers(&self) -> Vec<TaTeacher> {
        self.data.read().await.teachers.clone()
    }

    pub async fn collection_count(&self) -> usize {
        self.data.read().await.collections.len()
    }

    pub async fn recalculations(&self) -> Vec<RecalculationTarget> {
        self.data.read().await.recalculations.clone()
    }

    pub async fn revalidated_paths(&self) -> Vec<String> {
        self.data.read().await.revalidated_paths.clone()
    }
}

fn student_contact(teachers: &[TaTeacher], student_id: &str, name: &str) -> WinnerContact {
    teachers
        .iter()
        .find_map(|teacher| {
            teacher
                .ta_students
                .iter()
                .find(|student| student.id == student_id)
                .map(|student| WinnerContact {
                    id: student.id.clone(),
                    name: student.name.clone(),
                    email: student.email.clone(),
                    parents: student.parents.clone(),
                    ta_teacher: Some(TeacherRef {
                        name: teacher.name.clone(),
                    }),
                    ..WinnerContact::default()
                })
        })
        .unwrap_or_else(|| WinnerContact {
            id: student_id.to_string(),
            name: name.to_string(),
            ..WinnerContact::default()
        })
}

fn teacher_contact(teachers: &[TaTeacher], teacher_id: &str, name: &str) -> WinnerContact {
    WinnerContact {
        id: teacher_id.to_string(),
        name: name.to_string(),
        email: teachers
            .iter()
            .find(|teacher| teacher.id == teacher_id)
            .and_then(|teacher| teacher.email.clone()),
        ..WinnerContact::default()
    }
}

#[async_trait]
impl PbisBackend for InMemoryPbisBackend {
    #[instrument(skip(self))]
    async fn collection_dates(&self) -> Result<Vec<CollectionDate>, PbisError> {
        let data = self.data.read().await;
        let mut collections = data.collections.clone();
        collections.sort_by(|a, b| b.collection_date.cmp(&a.collection_date));
        Ok(collections)
    }

    #[instrument(skip(self))]
    async fn collection_snapshot(
        &self,
        since: DateTime<Utc>,
    ) -> Result<CollectionSnapshot, PbisError> {
        let data = self.data.read().await;
        let pbis_cards_count = data
            .teachers
            .iter()
            .flat_map(|teacher| teacher.ta_students.iter())
            .map(|student| u64::from(student.student_pbis_cards_count))
            .sum();

        let mut pbis_collection_dates = data.collections.clone();
        pbis_collection_dates.sort_by(|a, b| b.collection_date.cmp(&a.collection_date));

        debug!(
            %since,
            teachers = data.teachers.len(),
            pbis_cards_count,
            "Serving collection snapshot from memory"
        );

        Ok(CollectionSnapshot {
            pbis_collection_dates,
            pbis_cards_count,
            ta_teachers: data.teachers.clone(),
        })
    }

    #[instrument(skip(self, collection), fields(name = %collection.name))]
    async fn create_collection(&self, collection: &NewCollection) -> Result<String, PbisError> {
        let drawing = collection.decode_random_drawing_winners()?;
        let personal = collection.decode_personal_level_winners()?;
        let teams = collection.decode_ta_team_new_level_winners()?;

        let mut data = self.data.write().await;
        let id = uuid::Uuid::new_v4().to_string();

        let record = CollectionDate {
            id: id.clone(),
            collection_date: collection.collection_date,
            collected_cards: Some(collection.collected_cards.clone()),
            random_drawing_winners: drawing
                .iter()
                .map(|winner| RandomDrawingWin {
                    id: uuid::Uuid::new_v4().to_string(),
                    student: student_contact(&data.teachers, &winner.id, &winner.name),
                })
                .collect(),
            personal_level_winners: personal
                .iter()
                .map(|winner| WinnerContact {
                    individual_pbis_level: Some(winner.new_level),
                    ..student_contact(&data.teachers, &winner.id, &winner.name)
                })
                .collect(),
            ta_new_level_winners: teams
                .iter()
                .map(|team| WinnerContact {
                    ta_team_pbis_level: Some(team.new_level),
                    ..teacher_contact(&data.teachers, &team.id, &team.name)
                })
                .collect(),
            staff_random_winners: Vec::new(),
        };

        data.collections.push(record);
        for student in data
            .teachers
            .iter_mut()
            .flat_map(|teacher| teacher.ta_students.iter_mut())
        {
            student.student_pbis_cards_count = 0;
        }

        info!(collection_id = %id, "Collection created in memory");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn recalculate(&self, target: &RecalculationTarget) -> Result<(), PbisError> {
        let mut data = self.data.write().await;
        match target {
            RecalculationTarget::Student {
                id,
                individual_pbis_level,
            } => {
                let student = data
                    .teachers
                    .iter_mut()
                    .flat_map(|teacher| teacher.ta_students.iter_mut())
                    .find(|student| &student.id == id);
                match student {
                    Some(student) => student.individual_pbis_level = *individual_pbis_level,
                    None => {
                        warn!(student_id = %id, "Student not found for recalculation");
                        return Err(PbisError::Backend(format!("student {} not found", id)));
                    }
                }
            }
            RecalculationTarget::TaTeam {
                id,
                ta_team_pbis_level,
                average_pbis_cards_per_student,
            } => match data.teachers.iter_mut().find(|teacher| &teacher.id == id) {
                Some(teacher) => {
                    teacher.ta_team_pbis_level = *ta_team_pbis_level;
                    teacher.ta_team_average_pbis_cards_per_student =
                        *average_pbis_cards_per_student as f64;
                }
                None => {
                    warn!(teacher_id = %id, "TA teacher not found for recalculation");
                    return Err(PbisError::Backend(format!("ta teacher {} not found", id)));
                }
            },
        }
        data.recalculations.push(target.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revalidate(&self, path: &str) -> Result<(), PbisError> {
        self.data
            .write()
            .await
            .revalidated_paths
            .push(path.to_string());
        Ok(())
    }

    async fn staff_members(&self) -> Result<Vec<StaffMember>, PbisError> {
        Ok(self.data.read().await.staff.clone())
    }

    #[instrument(skip(self))]
    async fn add_staff_winner(
        &self,
        collection_id: &str,
        staff_id: &str,
    ) -> Result<(), PbisError> {
        let mut data = self.data.write().await;
        let member = data
            .staff
            .iter()
            .find(|member| member.id == staff_id)
            .cloned()
            .ok_or_else(|| PbisError::Backend(format!("staff member {} not found", staff_id)))?;
        let collection = data
            .collections
            .iter_mut()
            .find(|collection| collection.id == collection_id)
            .ok_or_else(|| PbisError::Backend(format!("collection {} not found", collection_id)))?;

        collection.staff_random_winners.push(WinnerContact {
            id: member.id,
            name: member.name,
            email: member.email,
            ..WinnerContact::default()
        });
        Ok(())
    }
}
