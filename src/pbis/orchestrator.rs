use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::config::PbisConfig;
use crate::email::{EmailOptions, EmailReport, WinnerNotifier};
use crate::operator::OperatorClaims;

use super::backend::PbisBackend;
use super::calculator::{
    calculate_preview, collection_window_start, days_since_last_collection, latest_collection,
};
use super::errors::PbisError;
use super::models::{CollectionPreview, CollectionSnapshot, StaffMember};
use super::payload::{recalculation_targets, NewCollection};
use super::random::{RandomSource, ThreadRandom};
use super::staff::{available_staff, pick_staff_winners};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CollectionState {
    #[default]
    Idle,
    FormOpen,
    PreviewReady,
    Confirming,
    Persisting,
    Revalidating,
}

impl CollectionState {
    pub fn in_flight(&self) -> bool {
        matches!(self, CollectionState::Persisting | CollectionState::Revalidating)
    }
}

/// What the operator sees when the collection form opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionForm {
    pub window_start: DateTime<Utc>,
    pub total_cards: u64,
    pub ta_team_count: usize,
    pub student_count: usize,
    pub has_recent_collection: bool,
    pub days_since_last_collection: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmOptions {
    pub send_emails: bool,
    pub email_guardians: bool,
}

/// Summary of a completed run. Warnings list side effects that failed after persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub collection_id: String,
    pub preview: CollectionPreview,
    pub recalculations_issued: usize,
    pub recalculations_failed: usize,
    pub emails: Option<EmailReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// The typed text did not match; nothing happened
    NotConfirmed,
    Completed(RunReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StaffDrawOutcome {
    NotConfirmed,
    Completed {
        collection_id: Option<String>,
        winners: Vec<StaffMember>,
        warnings: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub state: CollectionState,
    pub preview: Option<CollectionPreview>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct RunSession {
    state: CollectionState,
    snapshot: Option<CollectionSnapshot>,
    preview: Option<CollectionPreview>,
    last_error: Option<String>,
}

impl RunSession {
    fn reset(&mut self) {
        *self = RunSession::default();
    }
}

/// Drives the weekly collection from form to persisted record.
///
/// Nothing reaches the backend until the operator types the confirmation
/// token. The collection record must be created before any recalculation,
/// revalidation or email goes out; a failed create leaves the preview in
/// place so the operator can retry.
pub struct CollectionOrchestrator {
    backend: Arc<dyn PbisBackend>,
    config: PbisConfig,
    notifier: Option<Arc<WinnerNotifier>>,
    rng: Mutex<Box<dyn RandomSource>>,
    session: Mutex<RunSession>,
}

impl CollectionOrchestrator {
    pub fn builder(backend: Arc<dyn PbisBackend>) -> CollectionOrchestratorBuilder {
        CollectionOrchestratorBuilder::new(backend)
    }

    pub async fn state(&self) -> CollectionState {
        self.session.lock().await.state
    }

    pub async fn status(&self) -> RunStatus {
        let session = self.session.lock().await;
        RunStatus {
            state: session.state,
            preview: session.preview.clone(),
            last_error: session.last_error.clone(),
        }
    }

    /// Fetches a fresh snapshot for cards given since the last collection
    #[instrument(skip(self, operator), fields(operator = %operator.sub))]
    pub async fn open_form(&self, operator: &OperatorClaims) -> Result<CollectionForm, PbisError> {
        ensure_manager(operator)?;
        if self.session.lock().await.state.in_flight() {
            return Err(PbisError::RunInFlight);
        }

        // Backend reads happen without holding the session
        let now = Utc::now();
        let history = self.backend.collection_dates().await?;
        let window_start = collection_window_start(&history, now, &self.config);
        let snapshot = self.backend.collection_snapshot(window_start).await?;

        let days = days_since_last_collection(&snapshot.pbis_collection_dates, now);
        let form = CollectionForm {
            window_start,
            total_cards: snapshot.pbis_cards_count,
            ta_team_count: snapshot.ta_teachers.len(),
            student_count: snapshot
                .ta_teachers
                .iter()
                .map(|teacher| teacher.ta_students.len())
                .sum(),
            has_recent_collection: days.is_some_and(|d| d < self.config.recent_collection_days),
            days_since_last_collection: days,
        };

        if form.has_recent_collection {
            warn!(
                days_since_last_collection = ?form.days_since_last_collection,
                "Last collection was recent"
            );
        }

        let mut session = self.session.lock().await;
        // A confirm may have started while we were fetching
        if session.state.in_flight() {
            return Err(PbisError::RunInFlight);
        }
        session.reset();
        session.snapshot = Some(snapshot);
        session.state = CollectionState::FormOpen;
        info!(%window_start, total_cards = form.total_cards, "Collection form opened");
        Ok(form)
    }

    /// Runs the calculators against the open snapshot. Each call redraws the random winners.
    #[instrument(skip(self, operator), fields(operator = %operator.sub))]
    pub async fn preview(&self, operator: &OperatorClaims) -> Result<CollectionPreview, PbisError> {
        ensure_manager(operator)?;
        let mut session = self.session.lock().await;
        match session.state {
            CollectionState::FormOpen | CollectionState::PreviewReady => {}
            state if state.in_flight() => return Err(PbisError::RunInFlight),
            state => {
                return Err(PbisError::InvalidTransition {
                    action: "preview",
                    state,
                })
            }
        }

        let Some(snapshot) = session.snapshot.as_ref() else {
            return Err(PbisError::InvalidTransition {
                action: "preview",
                state: session.state,
            });
        };

        let mut preview = {
            let mut rng = self.rng.lock().await;
            calculate_preview(snapshot, &self.config, Utc::now(), &mut **rng)
        };
        preview.preview_id = Uuid::new_v4().to_string();

        session.preview = Some(preview.clone());
        session.last_error = None;
        session.state = CollectionState::PreviewReady;
        info!(
            preview_id = %preview.preview_id,
            teams_leveling_up = preview.ta_teams_leveling_up.len(),
            students_leveling_up = preview.students_leveling_up.len(),
            drawing_winners = preview.random_drawing_winners.len(),
            "Collection preview ready"
        );
        Ok(preview)
    }

    /// Abandons the run. Nothing has been persisted before confirmation.
    #[instrument(skip(self, operator), fields(operator = %operator.sub))]
    pub async fn close(&self, operator: &OperatorClaims) -> Result<(), PbisError> {
        ensure_manager(operator)?;
        let mut session = self.session.lock().await;
        if session.state.in_flight() {
            return Err(PbisError::RunInFlight);
        }
        if session.state != CollectionState::Idle {
            info!(state = %session.state, "Collection form closed without persisting");
        }
        session.reset();
        Ok(())
    }

    /// Persists the staged preview and fires the follow-up calls.
    ///
    /// `preview_id` must name the preview the operator reviewed; a newer
    /// preview or a reopened form makes it stale. Once persisting starts the
    /// run continues on its own task, so a caller that goes away does not
    /// leave the session stuck in flight.
    #[instrument(skip(self, operator, confirmation, options), fields(operator = %operator.sub))]
    pub async fn confirm(
        self: &Arc<Self>,
        operator: &OperatorClaims,
        preview_id: &str,
        confirmation: &str,
        options: &ConfirmOptions,
    ) -> Result<ConfirmOutcome, PbisError> {
        ensure_manager(operator)?;

        let (payload, preview) = {
            let mut session = self.session.lock().await;
            match session.state {
                CollectionState::PreviewReady => {}
                state if state.in_flight() => return Err(PbisError::RunInFlight),
                state => {
                    return Err(PbisError::InvalidTransition {
                        action: "confirm",
                        state,
                    })
                }
            }

            let Some(preview) = session.preview.clone() else {
                session.state = CollectionState::FormOpen;
                return Err(PbisError::InvalidTransition {
                    action: "confirm",
                    state: CollectionState::FormOpen,
                });
            };

            if preview.preview_id != preview_id {
                warn!(
                    reviewed = %preview_id,
                    current = %preview.preview_id,
                    "Confirmation names a preview that is no longer staged"
                );
                return Err(PbisError::StalePreview(preview_id.to_string()));
            }

            if confirmation != self.config.confirmation_token {
                debug!("Confirmation text did not match, ignoring submit");
                return Ok(ConfirmOutcome::NotConfirmed);
            }

            session.state = CollectionState::Confirming;
            let payload = match NewCollection::from_preview(&preview, Utc::now()) {
                Ok(payload) => payload,
                Err(err) => {
                    session.state = CollectionState::PreviewReady;
                    session.last_error = Some(err.to_string());
                    return Err(err);
                }
            };

            session.state = CollectionState::Persisting;
            (payload, preview)
        };

        let run = tokio::spawn({
            let orchestrator = Arc::clone(self);
            let operator = operator.clone();
            let options = options.clone();
            async move {
                orchestrator
                    .persist_and_follow_up(&operator, payload, preview, &options)
                    .await
            }
            .instrument(tracing::Span::current())
        });

        match run.await {
            Ok(result) => result,
            Err(err) => {
                // The task died mid-run; whether the record landed is unknown
                error!(%err, "Collection run task failed");
                let mut session = self.session.lock().await;
                session.reset();
                session.last_error = Some(err.to_string());
                Err(PbisError::Persistence(err.to_string()))
            }
        }
    }

    async fn persist_and_follow_up(
        &self,
        operator: &OperatorClaims,
        payload: NewCollection,
        preview: CollectionPreview,
        options: &ConfirmOptions,
    ) -> Result<ConfirmOutcome, PbisError> {
        // Nothing else may fire until the record exists
        let collection_id = match self.backend.create_collection(&payload).await {
            Ok(id) => id,
            Err(err) => {
                error!(%err, "Failed to create collection record");
                let mut session = self.session.lock().await;
                session.state = CollectionState::PreviewReady;
                session.last_error = Some(err.to_string());
                return Err(PbisError::Persistence(err.to_string()));
            }
        };
        info!(%collection_id, "Collection record created");

        self.session.lock().await.state = CollectionState::Revalidating;
        let report = self
            .run_side_effects(operator, collection_id, preview, options)
            .await;

        self.session.lock().await.reset();
        info!(
            collection_id = %report.collection_id,
            warnings = report.warnings.len(),
            "Collection run finished"
        );
        Ok(ConfirmOutcome::Completed(report))
    }

    async fn run_side_effects(
        &self,
        operator: &OperatorClaims,
        collection_id: String,
        preview: CollectionPreview,
        options: &ConfirmOptions,
    ) -> RunReport {
        let mut warnings = Vec::new();

        // Recalculations are independent; one failing does not stop the rest
        let targets = recalculation_targets(&preview);
        let results = join_all(
            targets
                .iter()
                .map(|target| self.backend.recalculate(target)),
        )
        .await;

        let mut recalculations_failed = 0;
        for (target, result) in targets.iter().zip(results) {
            if let Err(err) = result {
                warn!(%target, %err, "Recalculation failed");
                recalculations_failed += 1;
                warnings.push(format!("Recalculation for {} failed: {}", target, err));
            }
        }

        if let Err(err) = self.backend.revalidate(&self.config.revalidate_path).await {
            warn!(%err, path = %self.config.revalidate_path, "Revalidation failed");
            warnings.push(format!("Revalidation failed: {}", err));
        }

        // Emails go last and only when asked for
        let emails = if options.send_emails {
            match self
                .email_collection(operator, Some(&collection_id), options.email_guardians)
                .await
            {
                Ok(report) => {
                    warnings.extend(report.failures.iter().map(|failure| {
                        format!("Email to {} failed: {}", failure.to_address, failure.error)
                    }));
                    Some(report)
                }
                Err(err) => {
                    warn!(%err, "Winner emails were not sent");
                    warnings.push(format!("Winner emails were not sent: {}", err));
                    None
                }
            }
        } else {
            None
        };

        RunReport {
            collection_id,
            preview,
            recalculations_issued: targets.len(),
            recalculations_failed,
            emails,
            warnings,
        }
    }

    /// Draws staff winners who have never won and attaches them to the latest collection.
    /// `count` overrides the configured number of winners.
    #[instrument(skip(self, operator, confirmation), fields(operator = %operator.sub))]
    pub async fn draw_staff_winners(
        &self,
        operator: &OperatorClaims,
        confirmation: &str,
        count: Option<usize>,
    ) -> Result<StaffDrawOutcome, PbisError> {
        ensure_manager(operator)?;
        if confirmation != self.config.confirmation_token {
            debug!("Confirmation text did not match, ignoring staff drawing");
            return Ok(StaffDrawOutcome::NotConfirmed);
        }

        let history = self.backend.collection_dates().await?;
        let Some(latest) = latest_collection(&history) else {
            warn!("No collection to attach staff winners to");
            return Ok(StaffDrawOutcome::Completed {
                collection_id: None,
                winners: Vec::new(),
                warnings: vec!["No collection exists yet".to_string()],
            });
        };

        let count = count.unwrap_or(self.config.staff_winner_count);
        let staff = self.backend.staff_members().await?;
        let available = available_staff(&staff, &history);
        let winners = {
            let mut rng = self.rng.lock().await;
            pick_staff_winners(&available, count, &mut **rng)
        };

        let mut warnings = Vec::new();
        for winner in &winners {
            if let Err(err) = self.backend.add_staff_winner(&latest.id, &winner.id).await {
                warn!(staff_id = %winner.id, %err, "Failed to record staff winner");
                warnings.push(format!("Staff winner {} was not recorded: {}", winner.name, err));
            }
        }
        if let Err(err) = self.backend.revalidate(&self.config.revalidate_path).await {
            warnings.push(format!("Revalidation failed: {}", err));
        }

        info!(
            collection_id = %latest.id,
            requested = count,
            available = available.len(),
            winners = winners.len(),
            "Staff winners drawn"
        );
        Ok(StaffDrawOutcome::Completed {
            collection_id: Some(latest.id.clone()),
            winners,
            warnings,
        })
    }

    /// Emails every winner on the latest collection
    #[instrument(skip(self, operator), fields(operator = %operator.sub))]
    pub async fn send_winner_emails(
        &self,
        operator: &OperatorClaims,
        email_guardians: bool,
    ) -> Result<EmailReport, PbisError> {
        ensure_manager(operator)?;
        self.email_collection(operator, None, email_guardians).await
    }

    async fn email_collection(
        &self,
        operator: &OperatorClaims,
        collection_id: Option<&str>,
        email_guardians: bool,
    ) -> Result<EmailReport, PbisError> {
        let notifier = self
            .notifier
            .as_ref()
            .ok_or_else(|| PbisError::Config("no email sender configured".to_string()))?;

        let history = self.backend.collection_dates().await?;
        let collection = match collection_id {
            Some(id) => history.iter().find(|collection| collection.id == id),
            None => latest_collection(&history),
        };
        let Some(collection) = collection else {
            info!("No collection found, no winner emails to send");
            return Ok(EmailReport::default());
        };

        let options = EmailOptions {
            from_address: operator
                .email
                .clone()
                .filter(|address| !address.trim().is_empty())
                .unwrap_or_else(|| self.config.default_from_address.clone()),
            email_guardians,
        };
        Ok(notifier.notify(collection, &options).await)
    }
}

fn ensure_manager(operator: &OperatorClaims) -> Result<(), PbisError> {
    if operator.is_pbis_manager() {
        Ok(())
    } else {
        warn!(operator = %operator.sub, "Operator lacks PBIS permissions");
        Err(PbisError::Forbidden(format!(
            "{} cannot manage PBIS collections",
            operator.name
        )))
    }
}

pub struct CollectionOrchestratorBuilder {
    backend: Arc<dyn PbisBackend>,
    config: PbisConfig,
    notifier: Option<Arc<WinnerNotifier>>,
    rng: Box<dyn RandomSource>,
}

impl CollectionOrchestratorBuilder {
    pub fn new(backend: Arc<dyn PbisBackend>) -> Self {
        Self {
            backend,
            config: PbisConfig::default(),
            notifier: None,
            rng: Box::new(ThreadRandom::new()),
        }
    }

    pub fn with_config(mut self, config: PbisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<WinnerNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn build(self) -> Result<CollectionOrchestrator, PbisError> {
        self.config.validate()?;
        Ok(CollectionOrchestrator {
            backend: self.backend,
            config: self.config,
            notifier: self.notifier,
            rng: Mutex::new(self.rng),
            session: Mutex::new(RunSession::default()),
        })
    }
}
