mod common;

use std::time::Duration;

use common::{harness, online_student, submit_equivalent_answer, submit_wrong_answer};
use proctor_core::model::ParticipantId;
use services::collaborators::Notice;
use tokio::time::advance;

/// Let spawned timer tasks run to completion after a clock jump.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_survives_a_quick_reconnect() {
    let h = harness();
    let testificate = online_student(&h);
    h.controller.start_test(testificate).await.unwrap();

    submit_equivalent_answer(&h, testificate).await;
    submit_wrong_answer(&h, testificate).await;

    h.presence.set_online(testificate, false);
    h.controller.on_disconnect(testificate).await;

    advance(Duration::from_secs(150)).await;
    h.presence.set_online(testificate, true);
    h.controller.on_connect(testificate, "Steve").await.unwrap();

    advance(Duration::from_secs(600)).await;
    settle().await;

    let session = h
        .controller
        .active_test(testificate)
        .expect("session must survive the reconnect");
    assert_eq!(session.index(), 2);
    assert_eq!(session.wrong(), 1);
}

#[tokio::test(start_paused = true)]
async fn unreturned_quiz_taker_is_failed_with_full_wrong_count() {
    let h = harness();
    let testificate = online_student(&h);
    let test_id = h.controller.start_test(testificate).await.unwrap();

    submit_equivalent_answer(&h, testificate).await;

    h.presence.set_online(testificate, false);
    h.controller.on_disconnect(testificate).await;

    settle().await;
    advance(Duration::from_secs(301)).await;
    settle().await;

    assert!(h.controller.active_test(testificate).is_none());
    let record = h.stored_test(test_id).await;
    assert_eq!(record.passed, Some(false));
    assert_eq!(record.wrong, Some(25));
    assert_eq!(h.reports.test_count(), 0, "forced failures never report");
}

#[tokio::test(start_paused = true)]
async fn abandoned_trial_fails_and_notifies_the_remaining_party() {
    let h = harness();
    let trialer = ParticipantId::random();
    let testificate = online_student(&h);
    h.presence.set_online(trialer, true);

    let trial_id = h
        .controller
        .start_trial(trialer, testificate, "https://example.org/applications/3")
        .await
        .unwrap();

    h.presence.set_online(testificate, false);
    h.controller.on_disconnect(testificate).await;

    // Departure demotes the testificate immediately and warns the trialer.
    assert_eq!(
        h.groups.current_group(testificate).as_deref(),
        Some("student")
    );
    assert!(
        h.notifier
            .notices_for(trialer)
            .contains(&Notice::PeerDisconnected {
                forgiveness_secs: 300
            })
    );

    settle().await;
    advance(Duration::from_secs(301)).await;
    settle().await;

    assert!(h.controller.active_trial(trialer).is_none());
    let record = h.stored_trial(trial_id).await;
    assert_eq!(record.passed, Some(false));
    assert!(record.notes.iter().any(|note| note.contains("automatically ended")));
    assert_eq!(h.reports.trial_count(), 1, "every closed trial reports");
    assert!(h.notifier.notices_for(trialer).contains(&Notice::TrialAbandoned));
}

#[tokio::test(start_paused = true)]
async fn trialer_departure_arms_the_same_window() {
    let h = harness();
    let trialer = ParticipantId::random();
    let testificate = online_student(&h);
    h.presence.set_online(trialer, true);

    let trial_id = h
        .controller
        .start_trial(trialer, testificate, "https://example.org/applications/4")
        .await
        .unwrap();

    h.presence.set_online(trialer, false);
    h.controller.on_disconnect(trialer).await;

    // The testificate keeps their under-evaluation group; only they get the
    // warning this time.
    assert_eq!(
        h.groups.current_group(testificate).as_deref(),
        Some("testificate")
    );
    assert!(
        h.notifier
            .notices_for(testificate)
            .iter()
            .any(|n| matches!(n, Notice::PeerDisconnected { .. }))
    );

    settle().await;
    advance(Duration::from_secs(301)).await;
    settle().await;

    let record = h.stored_trial(trial_id).await;
    assert_eq!(record.passed, Some(false));
    assert!(h.controller.active_trial(testificate).is_none());
}

#[tokio::test(start_paused = true)]
async fn trial_survives_when_the_testificate_returns_in_time() {
    let h = harness();
    let trialer = ParticipantId::random();
    let testificate = online_student(&h);
    h.presence.set_online(trialer, true);

    h.controller
        .start_trial(trialer, testificate, "https://example.org/applications/5")
        .await
        .unwrap();

    h.presence.set_online(testificate, false);
    h.controller.on_disconnect(testificate).await;

    advance(Duration::from_secs(100)).await;
    h.presence.set_online(testificate, true);
    h.controller.on_connect(testificate, "Steve").await.unwrap();

    // Rejoining restores the under-evaluation group.
    assert_eq!(
        h.groups.current_group(testificate).as_deref(),
        Some("testificate")
    );

    advance(Duration::from_secs(600)).await;
    settle().await;

    assert!(h.controller.active_trial(trialer).is_some());
    assert_eq!(h.reports.trial_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn closing_a_session_disarms_its_timer() {
    let h = harness();
    let testificate = online_student(&h);

    h.controller.start_test(testificate).await.unwrap();
    h.presence.set_online(testificate, false);
    h.controller.on_disconnect(testificate).await;

    // The first session ends by hand before the window elapses, and a new
    // one starts. The window of the dead session must not touch the
    // successor even though the participant still reads as offline.
    h.controller.force_stop_test(testificate).await.unwrap();
    let second_id = h.controller.start_test(testificate).await.unwrap();

    advance(Duration::from_secs(301)).await;
    settle().await;

    let session = h
        .controller
        .active_test(testificate)
        .expect("successor session must survive the dead session's window");
    assert_eq!(session.test_id(), Some(second_id));
    let record = h.stored_test(second_id).await;
    assert_eq!(record.passed, None, "successor record stays open");
}

#[tokio::test(start_paused = true)]
async fn disconnect_without_any_session_is_a_no_op() {
    let h = harness();
    let participant = ParticipantId::random();

    h.controller.on_disconnect(participant).await;
    advance(Duration::from_secs(600)).await;
    settle().await;

    assert!(h.notifier.notices.lock().unwrap().is_empty());
    assert_eq!(h.reports.trial_count(), 0);
}
