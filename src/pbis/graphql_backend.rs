use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::graphql::{GraphqlClient, GraphqlError};

use super::backend::PbisBackend;
use super::errors::PbisError;
use super::models::{CollectionDate, CollectionSnapshot, StaffMember};
use super::payload::{NewCollection, RecalculationTarget};

const COLLECTION_FIELDS: &str = r#"
    id
    collectionDate
    collectedCards
    randomDrawingWinners {
      id
      student {
        id
        name
        email
        parent { id name email }
        taTeacher { name }
      }
    }
    personalLevelWinners {
      id
      name
      email
      individualPbisLevel
      parent { id name email }
    }
    taNewLevelWinners { id name email taTeamPbisLevel }
    staffRandomWinners { id name email }
"#;

fn collection_dates_query() -> String {
    format!(
        "query PBIS_COLLECTION_DATES {{ pbisCollectionDates(orderBy: {{ collectionDate: desc }}) {{ {} }} }}",
        COLLECTION_FIELDS
    )
}

fn snapshot_query() -> String {
    format!(
        r#"query PBIS_COLLECTION_DATA($date: DateTime!) {{
  pbisCollectionDates(orderBy: {{ collectionDate: desc }}) {{ {} }}
  pbisCardsCount(where: {{ dateGiven: {{ gt: $date }} }})
  taTeachers: users(
    where: {{ AND: [{{ isStaff: {{ equals: true }} }}, {{ hasTA: {{ equals: true }} }}] }}
  ) {{
    id
    name
    email
    taTeamPbisLevel
    taTeamAveragePbisCardsPerStudent
    taStudents {{
      id
      name
      email
      studentPbisCardsCount(where: {{ dateGiven: {{ gt: $date }} }})
      totalPBISCards: studentPbisCardsCount
      individualPbisLevel
      parent {{ id name email }}
    }}
  }}
}}"#,
        COLLECTION_FIELDS
    )
}

const CREATE_COLLECTION_MUTATION: &str = r#"
mutation CREATE_PBIS_COLLECTION($data: PbisCollectionDateCreateInput!) {
  createPbisCollectionDate(data: $data) { id }
}"#;

const RECALCULATE_STUDENT_MUTATION: &str = r#"
mutation RECALCULATE_PBIS($userId: ID!) {
  recalculatePBIS(userId: $userId) { id }
}"#;

const UPDATE_TA_TEAM_MUTATION: &str = r#"
mutation UPDATE_TA_TEAM($id: ID!, $averagePbisCardsPerStudent: Int, $taTeamPbisLevel: Int) {
  updateUser(
    where: { id: $id }
    data: {
      taTeamAveragePbisCardsPerStudent: $averagePbisCardsPerStudent
      taTeamPbisLevel: $taTeamPbisLevel
    }
  ) { id }
}"#;

const STAFF_QUERY: &str = r#"
query PBIS_STAFF {
  staff: users(where: { isStaff: { equals: true } }) { id name email }
}"#;

const ADD_STAFF_WINNER_MUTATION: &str = r#"
mutation ADD_STAFF_WINNER($collectionId: ID!, $staffId: ID!) {
  updatePbisCollectionDate(
    where: { id: $collectionId }
    data: { staffRandomWinners: { connect: { id: $staffId } } }
  ) { id }
}"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionDatesResponse {
    #[serde(default)]
    pbis_collection_dates: Vec<CollectionDate>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionResponse {
    create_pbis_collection_date: IdOnly,
}

#[derive(Deserialize)]
struct StaffResponse {
    #[serde(default)]
    staff: Vec<StaffMember>,
}

impl From<GraphqlError> for PbisError {
    fn from(err: GraphqlError) -> Self {
        PbisError::Backend(err.to_string())
    }
}

/// [`PbisBackend`] over the school's GraphQL API
#[derive(Debug, Clone)]
pub struct GraphqlPbisBackend {
    client: GraphqlClient,
}

impl GraphqlPbisBackend {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PbisBackend for GraphqlPbisBackend {
    #[instrument(skip(self))]
    async fn collection_dates(&self) -> Result<Vec<CollectionDate>, PbisError> {
        let response: CollectionDatesResponse = self
            .client
            .request(&collection_dates_query(), json!({}))
            .await?;
        Ok(response.pbis_collection_dates)
    }

    #[instrument(skip(self))]
    async fn collection_snapshot(
        &self,
        since: DateTime<Utc>,
    ) -> Result<CollectionSnapshot, PbisError> {
        let snapshot: CollectionSnapshot = self
            .client
            .request(&snapshot_query(), json!({ "date": since }))
            .await?;
        Ok(snapshot)
    }

    #[instrument(skip(self, collection), fields(name = %collection.name))]
    async fn create_collection(&self, collection: &NewCollection) -> Result<String, PbisError> {
        let response: CreateCollectionResponse = self
            .client
            .request(CREATE_COLLECTION_MUTATION, json!({ "data": collection }))
            .await
            .map_err(|err| PbisError::Persistence(err.to_string()))?;
        info!(id = %response.create_pbis_collection_date.id, "Collection record created upstream");
        Ok(response.create_pbis_collection_date.id)
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn recalculate(&self, target: &RecalculationTarget) -> Result<(), PbisError> {
        match target {
            RecalculationTarget::Student { id, .. } => {
                let _: serde_json::Value = self
                    .client
                    .request(RECALCULATE_STUDENT_MUTATION, json!({ "userId": id }))
                    .await?;
            }
            RecalculationTarget::TaTeam {
                id,
                ta_team_pbis_level,
                average_pbis_cards_per_student,
            } => {
                let _: serde_json::Value = self
                    .client
                    .request(
                        UPDATE_TA_TEAM_MUTATION,
                        json!({
                            "id": id,
                            "averagePbisCardsPerStudent": average_pbis_cards_per_student,
                            "taTeamPbisLevel": ta_team_pbis_level,
                        }),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn revalidate(&self, path: &str) -> Result<(), PbisError> {
        self.client.revalidate(path).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn staff_members(&self) -> Result<Vec<StaffMember>, PbisError> {
        let response: StaffResponse = self.client.request(STAFF_QUERY, json!({})).await?;
        Ok(response.staff)
    }

    #[instrument(skip(self))]
    async fn add_staff_winner(
        &self,
        collection_id: &str,
        staff_id: &str,
    ) -> Result<(), PbisError> {
        let _: serde_json::Value = self
            .client
            .request(
                ADD_STAFF_WINNER_MUTATION,
                json!({ "collectionId": collection_id, "staffId": staff_id }),
            )
            .await?;
        Ok(())
    }
}
