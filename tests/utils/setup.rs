use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use pbis_collector::{
    email::WinnerNotifier,
    operator::OperatorClaims,
    pbis::{
        models::{CollectionDate, Guardian, RandomDrawingWin, StaffMember, WinnerContact},
        BackendSeed, CollectionOrchestrator, CollectionPreview, ConfirmOptions, ConfirmOutcome,
        PbisError, SeededRandom, TaStudent, TaTeacher,
    },
    PbisConfig,
};

use super::mocks::{RecordingBackend, RecordingEmailSender};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub backend: RecordingBackend,
    pub sender: Arc<RecordingEmailSender>,
    pub orchestrator: Arc<CollectionOrchestrator>,
    pub operator: OperatorClaims,
}

pub struct TestSetupBuilder {
    seed: BackendSeed,
    config: PbisConfig,
    email_delay: Duration,
    rng_seed: u64,
    operator: OperatorClaims,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            seed: school_seed(),
            config: PbisConfig::default(),
            email_delay: Duration::ZERO,
            rng_seed: 42,
            operator: OperatorClaims::new(
                "op-1",
                "Front Office",
                Some("office@school.test".to_string()),
                true,
                false,
            ),
        }
    }

    pub fn with_seed(mut self, seed: BackendSeed) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_config(mut self, config: PbisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_email_delay(mut self, delay: Duration) -> Self {
        self.email_delay = delay;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn with_operator(mut self, operator: OperatorClaims) -> Self {
        self.operator = operator;
        self
    }

    pub fn build(self) -> TestSetup {
        let backend = RecordingBackend::new(self.seed);
        let sender = Arc::new(RecordingEmailSender::new());
        let notifier = WinnerNotifier::new(sender.clone(), self.email_delay);

        let orchestrator = CollectionOrchestrator::builder(Arc::new(backend.clone()))
            .with_config(self.config)
            .with_notifier(Arc::new(notifier))
            .with_random_source(Box::new(SeededRandom::new(self.rng_seed)))
            .build()
            .expect("test config should be valid");

        TestSetup {
            backend,
            sender,
            orchestrator: Arc::new(orchestrator),
            operator: self.operator,
        }
    }
}

impl TestSetup {
    /// Opens the form and computes a preview
    pub async fn ready_preview(&self) -> CollectionPreview {
        self.orchestrator
            .open_form(&self.operator)
            .await
            .expect("form should open");
        self.orchestrator
            .preview(&self.operator)
            .await
            .expect("preview should compute")
    }

    /// Id of the preview currently staged
    pub async fn preview_id(&self) -> String {
        self.orchestrator
            .status()
            .await
            .preview
            .map(|preview| preview.preview_id)
            .unwrap_or_default()
    }

    pub async fn confirm(
        &self,
        confirmation: &str,
        options: &ConfirmOptions,
    ) -> Result<ConfirmOutcome, PbisError> {
        let preview_id = self.preview_id().await;
        self.orchestrator
            .confirm(&self.operator, &preview_id, confirmation, options)
            .await
    }
}

fn student(id: &str, name: &str, period: u32, total: u32, level: u32) -> TaStudent {
    TaStudent {
        id: id.to_string(),
        name: name.to_string(),
        student_pbis_cards_count: period,
        total_pbis_cards: total,
        individual_pbis_level: level,
        ..TaStudent::default()
    }
}

/// Three TA teams, three staff members and one collection ten days ago.
///
/// With the default config the run levels up `t1` and `s1`, and the drawing
/// pool is `s1`, `s2`, `s4` (`s5` won last time, `s3` has no cards this period).
pub fn school_seed() -> BackendSeed {
    let mut s1 = student("s1", "John Doe", 6, 30, 0);
    s1.email = Some("john@school.test".to_string());
    s1.parents = vec![Guardian {
        id: "g1".to_string(),
        name: "Doe, Jane".to_string(),
        email: Some("jane@home.test".to_string()),
    }];

    let mut s4 = student("s4", "Maria Garcia", 10, 120, 3);
    s4.email = Some("maria@school.test".to_string());

    BackendSeed {
        ta_teachers: vec![
            TaTeacher {
                id: "t1".to_string(),
                name: "Ms. Smith".to_string(),
                email: Some("smith@school.test".to_string()),
                ta_team_pbis_level: 0,
                ta_team_average_pbis_cards_per_student: 22.0,
                ta_students: vec![
                    s1,
                    student("s2", "Sam Park", 4, 10, 0),
                    student("s3", "Lee Chen", 0, 80, 2),
                ],
            },
            TaTeacher {
                id: "t2".to_string(),
                name: "Mr. Lee".to_string(),
                email: Some("lee@school.test".to_string()),
                ta_team_pbis_level: 1,
                ta_team_average_pbis_cards_per_student: 40.0,
                ta_students: vec![s4, student("s5", "Ava Brown", 2, 5, 0)],
            },
            TaTeacher {
                id: "t3".to_string(),
                name: "Mrs. Park".to_string(),
                email: None,
                ta_team_pbis_level: 1,
                ta_team_average_pbis_cards_per_student: 30.0,
                ta_students: vec![],
            },
        ],
        staff: vec![
            StaffMember {
                id: "staff-1".to_string(),
                name: "Coach Miller".to_string(),
                email: Some("miller@school.test".to_string()),
            },
            StaffMember {
                id: "staff-2".to_string(),
                name: "Nurse Hall".to_string(),
                email: Some("hall@school.test".to_string()),
            },
            StaffMember {
                id: "staff-3".to_string(),
                name: "Custodian Ortiz".to_string(),
                email: None,
            },
        ],
        pbis_collection_dates: vec![CollectionDate {
            id: "c-old".to_string(),
            collection_date: Utc::now() - ChronoDuration::days(10) + ChronoDuration::hours(1),
            collected_cards: Some("40".to_string()),
            random_drawing_winners: vec![RandomDrawingWin {
                id: "win-old".to_string(),
                student: WinnerContact {
                    id: "s5".to_string(),
                    name: "Ava Brown".to_string(),
                    ..WinnerContact::default()
                },
            }],
            ..CollectionDate::default()
        }],
    }
}
