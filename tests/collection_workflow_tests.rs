mod utils;

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::time::Duration;

use pbis_collector::{
    operator::OperatorClaims,
    pbis::{
        models::CollectionDate, BackendSeed, CollectionState, ConfirmOptions, ConfirmOutcome,
        PbisBackend, PbisError, RunReport, StaffDrawOutcome, TaStudent, TaTeacher,
    },
    LevelOverflow, PbisConfig,
};
use utils::{school_seed, BackendCall, TestSetup, TestSetupBuilder};

async fn confirm_run(setup: &TestSetup, options: &ConfirmOptions) -> RunReport {
    match setup
        .confirm("yes", options)
        .await
        .expect("confirm should succeed")
    {
        ConfirmOutcome::Completed(report) => report,
        ConfirmOutcome::NotConfirmed => panic!("run should have been confirmed"),
    }
}

#[tokio::test]
async fn confirmed_run_persists_before_any_recalculation() {
    let setup = TestSetupBuilder::new().build();
    setup.ready_preview().await;
    setup.backend.clear_calls().await;

    let report = confirm_run(&setup, &ConfirmOptions::default()).await;

    let calls = setup.backend.calls().await;
    let created_at = calls
        .iter()
        .position(|call| matches!(call, BackendCall::CollectionCreated(_)))
        .expect("collection should be created");
    for (index, call) in calls.iter().enumerate() {
        if matches!(call, BackendCall::Recalculate(_) | BackendCall::Revalidate(_)) {
            assert!(
                index > created_at,
                "{:?} happened before the collection was created",
                call
            );
        }
    }

    assert_eq!(
        calls[created_at],
        BackendCall::CollectionCreated(report.collection_id.clone())
    );
    assert_eq!(report.recalculations_issued, 4);
    assert_eq!(report.recalculations_failed, 0);
    assert!(report.warnings.is_empty());
    assert_eq!(setup.orchestrator.state().await, CollectionState::Idle);
    assert_eq!(setup.backend.inner().collection_count().await, 2);
}

#[tokio::test]
async fn run_report_carries_the_persisted_preview() {
    let setup = TestSetupBuilder::new().build();
    setup.ready_preview().await;

    let report = confirm_run(&setup, &ConfirmOptions::default()).await;
    let preview = &report.preview;

    assert_eq!(preview.total_cards, 22);
    assert_eq!(preview.ta_team_levels.len(), 3);
    let teams: Vec<&str> = preview
        .ta_teams_leveling_up
        .iter()
        .map(|team| team.id.as_str())
        .collect();
    assert_eq!(teams, vec!["t1"]);
    assert_eq!(preview.students_leveling_up.len(), 1);
    assert_eq!(preview.students_leveling_up[0].id, "s1");
    assert_eq!(preview.students_leveling_up[0].new_level, 1);

    let empty_team = preview
        .ta_team_levels
        .iter()
        .find(|team| team.id == "t3")
        .unwrap();
    assert_eq!(empty_team.new_cards_per_student, 30.0);
    assert_eq!(empty_team.new_level, 1);

    let winners: HashSet<&str> = preview
        .random_drawing_winners
        .iter()
        .map(|winner| winner.id.as_str())
        .collect();
    assert_eq!(winners, HashSet::from(["s1", "s2", "s4"]));
    assert!(!preview.has_recent_collection);
    assert_eq!(preview.days_since_last_collection, Some(10));

    let teachers = setup.backend.inner().teachers().await;
    assert_eq!(teachers[0].ta_team_pbis_level, 1);
    assert_eq!(teachers[0].ta_students[0].individual_pbis_level, 1);
}

#[tokio::test]
async fn wrong_confirmation_never_reaches_persistence() {
    let setup = TestSetupBuilder::new().build();
    setup.ready_preview().await;

    for typed in ["", "y", "Yes", "YES", " yes", "confirm"] {
        let outcome = setup
            .confirm(typed, &ConfirmOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmOutcome::NotConfirmed, "typed {:?}", typed);
    }

    assert_eq!(setup.backend.create_calls().await, 0);
    assert_eq!(setup.backend.recalculation_calls().await, 0);
    assert_eq!(
        setup.orchestrator.state().await,
        CollectionState::PreviewReady
    );
}

#[tokio::test]
async fn persistence_failure_leaves_run_retryable_without_side_effects() {
    let setup = TestSetupBuilder::new().build();
    setup.ready_preview().await;
    let preview = setup.orchestrator.status().await.preview.unwrap();
    setup.backend.fail_next_creates(1).await;

    let options = ConfirmOptions {
        send_emails: true,
        email_guardians: true,
    };
    let result = setup.confirm("yes", &options).await;

    assert!(matches!(result, Err(PbisError::Persistence(_))));
    let status = setup.orchestrator.status().await;
    assert_eq!(status.state, CollectionState::PreviewReady);
    assert!(status.last_error.is_some());
    assert_eq!(status.preview.as_ref(), Some(&preview));
    assert_eq!(setup.backend.recalculation_calls().await, 0);
    assert!(!setup
        .backend
        .calls()
        .await
        .iter()
        .any(|call| matches!(call, BackendCall::Revalidate(_))));
    assert!(setup.sender.sent().await.is_empty());

    let report = confirm_run(&setup, &options).await;
    assert_eq!(report.preview, preview);
    assert_eq!(setup.backend.create_calls().await, 2);
    assert_eq!(setup.backend.inner().collection_count().await, 2);
}

#[tokio::test]
async fn failed_recalculation_is_reported_not_rolled_back() {
    let setup = TestSetupBuilder::new().build();
    setup.backend.fail_recalculation_for("t3").await;
    setup.ready_preview().await;

    let report = confirm_run(&setup, &ConfirmOptions::default()).await;

    assert_eq!(report.recalculations_issued, 4);
    assert_eq!(report.recalculations_failed, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("ta team t3"));
    assert_eq!(setup.backend.recalculation_calls().await, 4);
    assert_eq!(setup.backend.inner().recalculations().await.len(), 3);
    assert_eq!(setup.backend.inner().collection_count().await, 2);
    assert_eq!(
        setup.backend.inner().revalidated_paths().await,
        vec!["/pbis".to_string()]
    );
}

#[tokio::test]
async fn second_submit_while_persisting_is_rejected() {
    let setup = TestSetupBuilder::new().build();
    let preview = setup.ready_preview().await;
    let gate = setup.backend.hold_creates().await;

    let orchestrator = setup.orchestrator.clone();
    let operator = setup.operator.clone();
    let first = tokio::spawn(async move {
        orchestrator
            .confirm(&operator, &preview.preview_id, "yes", &ConfirmOptions::default())
            .await
    });

    while setup.orchestrator.state().await != CollectionState::Persisting {
        tokio::task::yield_now().await;
    }

    let second = setup.confirm("yes", &ConfirmOptions::default()).await;
    assert_eq!(second, Err(PbisError::RunInFlight));
    assert_eq!(
        setup.orchestrator.close(&setup.operator).await,
        Err(PbisError::RunInFlight)
    );
    assert!(matches!(
        setup.orchestrator.open_form(&setup.operator).await,
        Err(PbisError::RunInFlight)
    ));

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Completed(_)));
    assert_eq!(setup.backend.create_calls().await, 1);
}

#[tokio::test]
async fn abandoned_confirm_request_still_finishes_the_run() {
    let setup = TestSetupBuilder::new().build();
    let preview = setup.ready_preview().await;
    let gate = setup.backend.hold_creates().await;

    let orchestrator = setup.orchestrator.clone();
    let operator = setup.operator.clone();
    let request = tokio::spawn(async move {
        orchestrator
            .confirm(&operator, &preview.preview_id, "yes", &ConfirmOptions::default())
            .await
    });

    while setup.orchestrator.state().await != CollectionState::Persisting {
        tokio::task::yield_now().await;
    }
    request.abort();
    assert!(request.await.unwrap_err().is_cancelled());

    // The create is still pending, so the run is still in flight
    assert_eq!(
        setup.orchestrator.close(&setup.operator).await,
        Err(PbisError::RunInFlight)
    );

    gate.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        while setup.orchestrator.state().await != CollectionState::Idle {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("run should finish without its caller");

    assert_eq!(setup.backend.inner().collection_count().await, 2);
    assert_eq!(setup.backend.recalculation_calls().await, 4);
    assert!(setup.orchestrator.open_form(&setup.operator).await.is_ok());
}

#[tokio::test]
async fn confirm_is_bound_to_the_reviewed_preview() {
    let setup = TestSetupBuilder::new().build();
    let reviewed = setup.ready_preview().await;

    // A second operator reopens the form and draws again
    let counselor = OperatorClaims::new("op-7", "Counselor", None, true, false);
    setup.orchestrator.open_form(&counselor).await.unwrap();
    let current = setup.orchestrator.preview(&counselor).await.unwrap();

    let result = setup
        .orchestrator
        .confirm(
            &setup.operator,
            &reviewed.preview_id,
            "yes",
            &ConfirmOptions::default(),
        )
        .await;

    assert_eq!(
        result,
        Err(PbisError::StalePreview(reviewed.preview_id.clone()))
    );
    assert_eq!(setup.backend.create_calls().await, 0);
    assert_eq!(setup.orchestrator.status().await.preview, Some(current));
}

#[tokio::test]
async fn closing_the_form_has_no_side_effects() {
    let setup = TestSetupBuilder::new().build();
    setup.ready_preview().await;

    setup.orchestrator.close(&setup.operator).await.unwrap();

    let calls = setup.backend.calls().await;
    assert!(calls
        .iter()
        .all(|call| matches!(call, BackendCall::CollectionDates | BackendCall::Snapshot)));
    assert_eq!(setup.orchestrator.state().await, CollectionState::Idle);

    let result = setup.confirm("yes", &ConfirmOptions::default()).await;
    assert!(matches!(result, Err(PbisError::InvalidTransition { .. })));
}

#[tokio::test]
async fn recent_collection_is_flagged_on_open() {
    let mut seed = school_seed();
    seed.pbis_collection_dates[0].collection_date =
        Utc::now() - ChronoDuration::days(2) + ChronoDuration::hours(1);
    let setup = TestSetupBuilder::new().with_seed(seed).build();

    let form = setup.orchestrator.open_form(&setup.operator).await.unwrap();

    assert!(form.has_recent_collection);
    assert_eq!(form.days_since_last_collection, Some(2));
    assert_eq!(form.ta_team_count, 3);
    assert_eq!(form.student_count, 5);
}

#[tokio::test]
async fn repeat_window_controls_drawing_exclusions() {
    let setup = TestSetupBuilder::new()
        .with_config(PbisConfig {
            collections_without_repeat_winners: 0,
            ..PbisConfig::default()
        })
        .build();
    setup.orchestrator.open_form(&setup.operator).await.unwrap();

    let preview = setup.orchestrator.preview(&setup.operator).await.unwrap();

    let winners: HashSet<&str> = preview
        .random_drawing_winners
        .iter()
        .map(|winner| winner.id.as_str())
        .collect();
    assert_eq!(winners, HashSet::from(["s1", "s2", "s4", "s5"]));
}

#[tokio::test]
async fn disabled_drawing_still_persists_levels() {
    let setup = TestSetupBuilder::new()
        .with_config(PbisConfig {
            random_drawing_enabled: false,
            ..PbisConfig::default()
        })
        .build();
    setup.ready_preview().await;

    let report = confirm_run(&setup, &ConfirmOptions::default()).await;

    assert!(report.preview.random_drawing_winners.is_empty());
    assert_eq!(report.preview.students_leveling_up.len(), 1);
    let dates = setup.backend.inner().collection_dates().await.unwrap();
    let latest: &CollectionDate = &dates[0];
    assert!(latest.random_drawing_winners.is_empty());
    assert_eq!(latest.personal_level_winners.len(), 1);
}

fn veteran_seed() -> BackendSeed {
    BackendSeed {
        ta_teachers: vec![TaTeacher {
            id: "t1".to_string(),
            name: "Ms. Smith".to_string(),
            ta_students: vec![TaStudent {
                id: "veteran".to_string(),
                name: "Veteran Student".to_string(),
                student_pbis_cards_count: 1,
                total_pbis_cards: 1000,
                individual_pbis_level: 5,
                ..TaStudent::default()
            }],
            ..TaTeacher::default()
        }],
        ..BackendSeed::default()
    }
}

#[tokio::test]
async fn totals_past_the_ladder_follow_the_overflow_policy() {
    let clamped = TestSetupBuilder::new().with_seed(veteran_seed()).build();
    clamped.ready_preview().await;
    let preview = clamped.orchestrator.status().await.preview.unwrap();
    assert_eq!(preview.students_leveling_up.len(), 1);
    assert_eq!(preview.students_leveling_up[0].new_level, 13);

    let excluded = TestSetupBuilder::new()
        .with_seed(veteran_seed())
        .with_config(PbisConfig {
            level_overflow: LevelOverflow::Exclude,
            ..PbisConfig::default()
        })
        .build();
    excluded.ready_preview().await;
    let preview = excluded.orchestrator.status().await.preview.unwrap();
    assert!(preview.students_leveling_up.is_empty());
}

#[tokio::test]
async fn staff_drawing_takes_the_requested_count() {
    let setup = TestSetupBuilder::new().build();
    setup.ready_preview().await;
    confirm_run(&setup, &ConfirmOptions::default()).await;

    let outcome = setup
        .orchestrator
        .draw_staff_winners(&setup.operator, "yes", Some(1))
        .await
        .unwrap();

    let StaffDrawOutcome::Completed { winners, .. } = outcome else {
        panic!("staff drawing should complete");
    };
    assert_eq!(winners.len(), 1);
    let recorded = setup
        .backend
        .calls()
        .await
        .into_iter()
        .filter(|call| matches!(call, BackendCall::AddStaffWinner(_)))
        .count();
    assert_eq!(recorded, 1);
}
