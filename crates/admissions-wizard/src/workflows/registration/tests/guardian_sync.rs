use super::common::*;
use crate::workflows::registration::domain::{GuardianId, GuardianPayload, Relationship};
use crate::workflows::registration::gateway::GatewayError;
use crate::workflows::registration::guardians::{
    GuardianRoster, GuardianSyncEngine, SlotResult, SyncAction,
};
use crate::workflows::registration::submission::SubmissionError;
use crate::workflows::registration::wizard::{StepOutcome, WizardError};

#[test]
fn second_sync_without_edits_writes_nothing() {
    let gateway = RecordingGateway::with_guardians(Vec::new());
    let mut roster = GuardianRoster::default();
    roster.slot_mut(Relationship::Father).details.full_name = "Ahmad Yani".to_string();
    roster.slot_mut(Relationship::Father).details.phone = "081298765432".to_string();

    let first = GuardianSyncEngine
        .sync(&gateway, &mut roster)
        .expect("first sync");
    assert_eq!(first.writes(), 1);

    gateway.clear_calls();
    let second = GuardianSyncEngine
        .sync(&gateway, &mut roster)
        .expect("second sync");
    assert_eq!(second.writes(), 0);
    assert!(gateway.writes().is_empty(), "unexpected writes: {:?}", gateway.writes());
    assert!(GuardianSyncEngine
        .plan(&roster)
        .iter()
        .all(|(_, action)| *action == SyncAction::NoOp));
}

#[test]
fn remote_slots_without_edits_are_left_alone() {
    let gateway = RecordingGateway::with_guardians(vec![
        guardian("12", Relationship::Father, "Ahmad Yani"),
        guardian("13", Relationship::Mother, "Sri Wahyuni"),
    ]);
    let mut roster = GuardianRoster::from_remote(&gateway.remote_guardians());

    let report = GuardianSyncEngine
        .sync(&gateway, &mut roster)
        .expect("sync succeeds");

    assert_eq!(report.writes(), 0);
    assert!(gateway.writes().is_empty());
}

#[test]
fn blanked_slot_deletes_remote_record_and_clears_id() {
    let gateway = RecordingGateway::with_guardians(vec![guardian(
        "77",
        Relationship::Guardian,
        "Budi Santoso",
    )]);
    let mut roster = GuardianRoster::from_remote(&gateway.remote_guardians());
    roster.slot_mut(Relationship::Guardian).details.full_name = "   ".to_string();

    let report = GuardianSyncEngine
        .sync(&gateway, &mut roster)
        .expect("sync succeeds");

    assert_eq!(
        gateway.writes(),
        vec![Call::Delete(GuardianId("77".to_string()))]
    );
    assert_eq!(report.outcomes[2].result, SlotResult::Deleted(GuardianId("77".to_string())));
    assert_eq!(roster.slot(Relationship::Guardian).remote_id, None);
    assert!(gateway.remote_guardians().is_empty());
}

#[test]
fn delete_of_already_missing_record_counts_as_done() {
    let gateway = RecordingGateway::with_guardians(Vec::new());
    let mut roster = GuardianRoster::from_remote(&[guardian(
        "88",
        Relationship::Mother,
        "Sri Wahyuni",
    )]);
    roster.slot_mut(Relationship::Mother).details.full_name.clear();

    let report = GuardianSyncEngine
        .sync(&gateway, &mut roster)
        .expect("404 on delete is not a failure");

    assert_eq!(report.writes(), 1);
    assert_eq!(roster.slot(Relationship::Mother).remote_id, None);
}

#[test]
fn edited_remote_slot_updates_in_place() {
    let gateway =
        RecordingGateway::with_guardians(vec![guardian("12", Relationship::Father, "Ahmad")]);
    let mut roster = GuardianRoster::from_remote(&gateway.remote_guardians());
    roster.slot_mut(Relationship::Father).details.occupation = "Civil servant".to_string();

    GuardianSyncEngine
        .sync(&gateway, &mut roster)
        .expect("sync succeeds");

    match gateway.writes().as_slice() {
        [Call::Update(id, payload)] => {
            assert_eq!(id, &GuardianId("12".to_string()));
            assert_eq!(payload.occupation.as_deref(), Some("Civil servant"));
        }
        other => panic!("expected a single update, got {other:?}"),
    }
}

#[test]
fn failure_stops_remaining_slots() {
    let gateway = RecordingGateway::with_guardians(Vec::new());
    gateway.fail_once(
        Op::Create,
        GatewayError::Server {
            status: 503,
            message: "maintenance".to_string(),
        },
    );
    let mut roster = GuardianRoster::default();
    roster.slot_mut(Relationship::Father).details.full_name = "Ahmad".to_string();
    roster.slot_mut(Relationship::Mother).details.full_name = "Sri".to_string();

    let err = GuardianSyncEngine
        .sync(&gateway, &mut roster)
        .expect_err("create fails");

    assert_eq!(err.relationship, Relationship::Father);
    assert!(err.completed.is_empty());
    assert_eq!(gateway.writes().len(), 1, "mother must not be attempted");
    assert_eq!(roster.slot(Relationship::Father).remote_id, None);
}

#[test]
fn finish_runs_noop_create_delete_then_submits() {
    let gateway = RecordingGateway::with_guardians(vec![guardian(
        "77",
        Relationship::Guardian,
        "Budi Santoso",
    )]);
    let (gateway, mut wizard) = open_wizard(gateway);
    complete_first_four_steps(&mut wizard);

    wizard
        .edit_guardian(Relationship::Father, |details| details.full_name.clear())
        .expect("guardians editable");
    wizard
        .edit_guardian(Relationship::Mother, |details| {
            details.full_name = "Jane Doe".to_string();
        })
        .expect("guardians editable");
    wizard
        .edit_guardian(Relationship::Guardian, |details| details.full_name.clear())
        .expect("guardians editable");

    let plan = wizard.guardian_plan();
    assert_eq!(plan[0], (Relationship::Father, SyncAction::NoOp));
    assert!(matches!(plan[1], (Relationship::Mother, SyncAction::Create(_))));
    assert_eq!(
        plan[2],
        (
            Relationship::Guardian,
            SyncAction::Delete(GuardianId("77".to_string()))
        )
    );

    gateway.clear_calls();
    let outcome = wizard.next_on(today()).expect("finish succeeds");

    let expected_mother = GuardianPayload {
        relationship: Relationship::Mother,
        full_name: "Jane Doe".to_string(),
        address: None,
        phone: None,
        occupation: None,
        last_education: None,
        income_bracket: None,
    };
    assert_eq!(
        gateway.writes(),
        vec![
            Call::Create(expected_mother),
            Call::Delete(GuardianId("77".to_string())),
            Call::Submit,
        ]
    );
    match outcome {
        StepOutcome::Submitted(receipt) => {
            assert_eq!(receipt.guardians.outcomes[0].result, SlotResult::Unchanged);
            assert!(matches!(
                receipt.guardians.outcomes[1].result,
                SlotResult::Created(_)
            ));
        }
        other => panic!("expected submission, got {other:?}"),
    }
    assert!(wizard.is_submitted());
}

#[test]
fn finalize_retry_after_failed_delete_only_repeats_unfinished_work() {
    let gateway = RecordingGateway::with_guardians(vec![guardian(
        "77",
        Relationship::Guardian,
        "Budi Santoso",
    )]);
    gateway.fail_once(Op::Delete, GatewayError::Transport("connection reset".to_string()));
    let (gateway, mut wizard) = open_wizard(gateway);
    complete_first_four_steps(&mut wizard);
    wizard
        .edit_guardian(Relationship::Mother, |details| {
            details.full_name = "Jane Doe".to_string();
        })
        .expect("editable");
    wizard
        .edit_guardian(Relationship::Guardian, |details| details.full_name.clear())
        .expect("editable");

    gateway.clear_calls();
    match wizard.next_on(today()) {
        Err(WizardError::Submission(SubmissionError::Guardians(err))) => {
            assert_eq!(err.relationship, Relationship::Guardian);
            assert_eq!(err.completed.len(), 2);
        }
        other => panic!("expected guardian failure, got {other:?}"),
    }
    assert!(!gateway.writes().contains(&Call::Submit));
    assert!(!wizard.is_submitted());
    assert!(!wizard.is_busy());

    gateway.clear_calls();
    wizard.finalize().expect("retry succeeds");
    assert_eq!(
        gateway.writes(),
        vec![Call::Delete(GuardianId("77".to_string())), Call::Submit]
    );
}

#[test]
fn finalize_retry_after_failed_submit_resubmits_without_guardian_writes() {
    let gateway = RecordingGateway::with_guardians(Vec::new());
    gateway.fail_once(
        Op::Submit,
        GatewayError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        },
    );
    let (gateway, mut wizard) = open_wizard(gateway);
    complete_first_four_steps(&mut wizard);
    wizard
        .edit_guardian(Relationship::Father, |details| {
            details.full_name = "Ahmad Yani".to_string();
        })
        .expect("editable");

    let err = wizard.next_on(today()).expect_err("submit fails");
    match &err {
        WizardError::Submission(inner) => {
            assert!(matches!(inner, SubmissionError::Submit(_)));
            assert!(inner.is_retryable());
        }
        other => panic!("expected submit failure, got {other:?}"),
    }
    assert_eq!(gateway.remote_guardians().len(), 1, "guardian stays saved");

    gateway.clear_calls();
    wizard.finalize().expect("retry succeeds");
    assert_eq!(gateway.writes(), vec![Call::Submit]);
}

#[test]
fn clearing_every_slot_still_finishes_and_deletes_remote_record() {
    let (gateway, mut wizard) = open_wizard(RecordingGateway::with_guardians(vec![guardian(
        "77",
        Relationship::Guardian,
        "Budi Santoso",
    )]));
    complete_first_four_steps(&mut wizard);
    wizard
        .edit_guardian(Relationship::Guardian, |details| {
            details.full_name = "  ".to_string()
        })
        .expect("editable");
    gateway.clear_calls();

    match wizard.next_on(today()) {
        Ok(StepOutcome::Submitted(receipt)) => assert_eq!(receipt.guardians.writes(), 1),
        other => panic!("expected submission, got {other:?}"),
    }
    assert_eq!(
        gateway.writes(),
        vec![Call::Delete(GuardianId("77".to_string())), Call::Submit]
    );
    assert!(gateway.remote_guardians().is_empty());
}
