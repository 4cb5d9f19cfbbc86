mod common;

use common::{harness, online_student, submit_equivalent_answer, submit_wrong_answer};
use proctor_core::model::ParticipantId;
use services::collaborators::Notice;

#[tokio::test]
async fn full_quiz_with_two_misses_passes_and_reports() {
    let h = harness();
    let testificate = online_student(&h);

    let test_id = h.controller.start_test(testificate).await.unwrap();

    for question in 0..25 {
        if question == 3 || question == 17 {
            submit_wrong_answer(&h, testificate).await;
        } else {
            submit_equivalent_answer(&h, testificate).await;
        }
    }

    assert!(h.controller.active_test(testificate).is_none());

    let record = h.stored_test(test_id).await;
    assert_eq!(record.passed, Some(true));
    assert_eq!(record.wrong, Some(2));
    assert!(record.ended_at.is_some());

    assert_eq!(h.reports.test_count(), 1);
    let (reported, attempt) = h.reports.tests.lock().unwrap()[0].clone();
    assert_eq!(reported.id, test_id);
    assert_eq!(attempt, 1);

    let notices = h.notifier.notices_for(testificate);
    assert!(notices.contains(&Notice::TestPassed { wrong: 2 }));
    let questions = notices
        .iter()
        .filter(|n| matches!(n, Notice::Question { .. }))
        .count();
    assert_eq!(questions, 25);
}

#[tokio::test]
async fn three_misses_fail_without_a_report() {
    let h = harness();
    let testificate = online_student(&h);

    let test_id = h.controller.start_test(testificate).await.unwrap();

    for question in 0..25 {
        if question < 3 {
            submit_wrong_answer(&h, testificate).await;
        } else {
            submit_equivalent_answer(&h, testificate).await;
        }
    }

    let record = h.stored_test(test_id).await;
    assert_eq!(record.passed, Some(false));
    assert_eq!(record.wrong, Some(3));

    assert_eq!(h.reports.test_count(), 0, "failed tests never report");
    assert!(
        h.notifier
            .notices_for(testificate)
            .contains(&Notice::TestFailed { wrong: 3 })
    );
}

#[tokio::test]
async fn wrong_count_is_persisted_as_it_grows() {
    let h = harness();
    let testificate = online_student(&h);
    let test_id = h.controller.start_test(testificate).await.unwrap();

    submit_wrong_answer(&h, testificate).await;
    assert_eq!(h.stored_test(test_id).await.wrong, Some(1));

    submit_equivalent_answer(&h, testificate).await;
    assert_eq!(h.stored_test(test_id).await.wrong, Some(1));

    submit_wrong_answer(&h, testificate).await;
    assert_eq!(h.stored_test(test_id).await.wrong, Some(2));
}

#[tokio::test]
async fn starting_twice_conflicts_without_touching_the_first_session() {
    let h = harness();
    let testificate = online_student(&h);
    h.controller.start_test(testificate).await.unwrap();

    submit_equivalent_answer(&h, testificate).await;
    let before = h.controller.active_test(testificate).unwrap();

    let err = h.controller.start_test(testificate).await.unwrap_err();
    assert!(err.is_conflict());

    let after = h.controller.active_test(testificate).unwrap();
    assert_eq!(after.index(), before.index());
    assert_eq!(after.wrong(), before.wrong());
    assert_eq!(after.test_id(), before.test_id());
}

#[tokio::test]
async fn a_passed_test_blocks_future_attempts() {
    let h = harness();
    let testificate = online_student(&h);

    h.controller.start_test(testificate).await.unwrap();
    for _ in 0..25 {
        submit_equivalent_answer(&h, testificate).await;
    }
    assert_eq!(h.reports.test_count(), 1);

    let err = h.controller.start_test(testificate).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("already passed"));
}

#[tokio::test]
async fn three_rapid_attempts_hit_the_cooldown() {
    let h = harness();
    let testificate = online_student(&h);

    // Three abandoned attempts, all at the same (fixed) clock instant.
    for _ in 0..3 {
        h.controller.start_test(testificate).await.unwrap();
        h.controller.force_stop_test(testificate).await.unwrap();
    }

    let err = h.controller.start_test(testificate).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("24 hours"));
}

#[tokio::test]
async fn force_stop_records_a_total_failure() {
    let h = harness();
    let testificate = online_student(&h);
    let test_id = h.controller.start_test(testificate).await.unwrap();

    submit_equivalent_answer(&h, testificate).await;
    h.controller.force_stop_test(testificate).await.unwrap();

    let record = h.stored_test(test_id).await;
    assert_eq!(record.passed, Some(false));
    assert_eq!(record.wrong, Some(25));
    assert_eq!(h.reports.test_count(), 0);
    assert!(h.controller.active_test(testificate).is_none());

    let err = h.controller.force_stop_test(testificate).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn trial_pass_moves_the_testificate_up_and_reports() {
    let h = harness();
    let trialer = ParticipantId::random();
    let testificate = online_student(&h);

    let trial_id = h
        .controller
        .start_trial(trialer, testificate, "https://example.org/applications/42")
        .await
        .unwrap();
    assert_eq!(
        h.groups.current_group(testificate).as_deref(),
        Some("testificate")
    );

    h.controller
        .add_trial_note(trialer, "  knows their gates  ")
        .await
        .unwrap();
    h.controller
        .end_trial(trialer, true, Some("clean pass"))
        .await
        .unwrap();

    let record = h.stored_trial(trial_id).await;
    assert_eq!(record.passed, Some(true));
    assert_eq!(record.notes, vec!["knows their gates", "clean pass"]);
    assert_eq!(
        h.groups.current_group(testificate).as_deref(),
        Some("builder")
    );

    assert_eq!(h.reports.trial_count(), 1);
    let (reported, attempt) = h.reports.trials.lock().unwrap()[0].clone();
    assert_eq!(reported.id, trial_id);
    assert_eq!(attempt, 1);

    assert!(h.controller.active_trial(trialer).is_none());
    assert!(h.controller.active_trial(testificate).is_none());
}

#[tokio::test]
async fn trial_fail_reverts_the_testificate_and_still_reports() {
    let h = harness();
    let trialer = ParticipantId::random();
    let testificate = online_student(&h);

    h.controller
        .start_trial(trialer, testificate, "https://example.org/applications/7")
        .await
        .unwrap();
    h.controller.end_trial(trialer, false, None).await.unwrap();

    assert_eq!(
        h.groups.current_group(testificate).as_deref(),
        Some("student")
    );
    assert_eq!(h.reports.trial_count(), 1);
}

#[tokio::test]
async fn trial_start_refusals() {
    let h = harness();
    let trialer = ParticipantId::random();
    let testificate = online_student(&h);
    let app = "https://example.org/applications/1";

    // Self-trial.
    let err = h
        .controller
        .start_trial(trialer, trialer, app)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("yourself"));

    // Offline target.
    let offline = ParticipantId::random();
    let err = h
        .controller
        .start_trial(trialer, offline, app)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not online"));

    // Malformed application link.
    let err = h
        .controller
        .start_trial(trialer, testificate, "not a link")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid app"));

    // Wrong rank.
    let builder = ParticipantId::random();
    h.presence.set_online(builder, true);
    h.groups.seed(builder, "builder");
    let err = h
        .controller
        .start_trial(trialer, builder, app)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ineligible"));

    // Nothing was reserved by any refusal.
    assert!(h.controller.active_trial(trialer).is_none());

    // Double trial.
    h.controller
        .start_trial(trialer, testificate, app)
        .await
        .unwrap();
    let second = online_student(&h);
    let err = h
        .controller
        .start_trial(trialer, second, app)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // The testificate cannot start evaluating someone either.
    let third = online_student(&h);
    let err = h
        .controller
        .start_trial(testificate, third, app)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn ending_a_trial_you_do_not_own_conflicts() {
    let h = harness();
    let err = h
        .controller
        .end_trial(ParticipantId::random(), true, None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = h
        .controller
        .add_trial_note(ParticipantId::random(), "note")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn answering_without_a_session_conflicts() {
    let h = harness();
    let err = h
        .controller
        .submit_answer(ParticipantId::random(), "5")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn shutdown_fails_everything_open() {
    let h = harness();
    let trialer = ParticipantId::random();
    let testificate = online_student(&h);
    let quiz_taker = online_student(&h);

    let trial_id = h
        .controller
        .start_trial(trialer, testificate, "https://example.org/applications/9")
        .await
        .unwrap();
    let test_id = h.controller.start_test(quiz_taker).await.unwrap();

    h.controller.shutdown().await;

    let trial = h.stored_trial(trial_id).await;
    assert_eq!(trial.passed, Some(false));
    assert!(
        trial
            .notes
            .iter()
            .any(|note| note.contains("server went offline"))
    );

    let test = h.stored_test(test_id).await;
    assert_eq!(test.passed, Some(false));
    assert_eq!(test.wrong, Some(25));

    assert!(h.controller.active_trial(trialer).is_none());
    assert!(h.controller.active_test(quiz_taker).is_none());
}

#[tokio::test]
async fn on_connect_caches_the_username() {
    let h = harness();
    let participant = ParticipantId::random();
    h.controller.on_connect(participant, "Steve").await.unwrap();

    use storage::repository::UsernameRepository;
    assert_eq!(
        h.repo.username_for(participant).await.unwrap(),
        Some("Steve".to_string())
    );
}
