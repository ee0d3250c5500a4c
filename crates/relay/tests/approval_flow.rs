//! End-to-end approval flow: a graph suspends at a gated step, a human
//! decides, and the run either resumes or fails.

use relay::{
    ApprovalDecision, Bindings, MockConnector, Outcome, Platform, RunStatus, Step, StepGraph,
    StepRunStatus,
};
use serde_json::json;

fn welcome_graph() -> StepGraph {
    StepGraph::new("welcome")
        .with_step(Step::new("begin", "start", "Start"))
        .with_step(
            Step::new("notify", "send_message", "Send the welcome note")
                .with_params(json!({"to": "{{email}}", "body": "Welcome, {{name}}!"}))
                .with_approval(),
        )
        .with_step(
            Step::new("record", "append_record", "Log the signup")
                .with_params(json!({"table": "signups", "fields": {"name": "{{name}}"}})),
        )
        .with_edge("begin", "notify")
        .with_edge("notify", "record")
}

fn trigger() -> Bindings {
    Bindings::from_iter([
        ("email".to_string(), json!("ann@example.com")),
        ("name".to_string(), json!("Ann")),
    ])
}

fn platform() -> Platform {
    // scripted connectors so nothing leaves the process
    Platform::builder()
        .with_connector(MockConnector::new("send_message").with_outcome(Outcome::ok(
            json!({"message_id": "m-1"}),
            "message sent",
        )))
        .with_connector(
            MockConnector::new("append_record")
                .with_outcome(Outcome::ok(json!({"record_id": "r-1"}), "record appended")),
        )
        .build()
}

#[tokio::test]
async fn suspends_at_the_gate_without_side_effects() {
    let platform = platform();
    let run = platform
        .run_step_graph(&welcome_graph(), trigger(), false)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::WaitingApproval);

    // only the start step ran; the gated step is parked, its successor
    // untouched
    let step_runs = platform.step_runs(run.id).await.unwrap();
    assert_eq!(step_runs.len(), 2);
    assert_eq!(step_runs[0].step_id, "begin");
    assert_eq!(step_runs[0].status, StepRunStatus::Completed);
    assert_eq!(step_runs[1].step_id, "notify");
    assert_eq!(step_runs[1].status, StepRunStatus::WaitingApproval);

    // the pending request shows the interpolated payload a human would vet
    let pending = platform.pending_approvals(run.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].summary, "Run send_message (mock)");
    assert_eq!(pending[0].preview["to"], json!("ann@example.com"));
    assert_eq!(pending[0].preview["body"], json!("Welcome, Ann!"));
}

#[tokio::test]
async fn approval_resumes_and_completes_the_run() {
    let platform = platform();
    let graph = welcome_graph();
    let run = platform
        .run_step_graph(&graph, trigger(), false)
        .await
        .unwrap();
    let request = platform.pending_approvals(run.id).await.unwrap().remove(0);

    let resumed = platform
        .resume_approval(&graph, request.id, ApprovalDecision::Approve, None)
        .await
        .unwrap();
    assert_eq!(resumed.status, RunStatus::Completed);

    let step_runs = platform.step_runs(run.id).await.unwrap();
    assert_eq!(step_runs.len(), 3);
    assert_eq!(step_runs[1].step_id, "notify");
    assert_eq!(step_runs[1].status, StepRunStatus::Completed);
    assert_eq!(step_runs[2].step_id, "record");
    assert_eq!(step_runs[2].status, StepRunStatus::Completed);
    // downstream params interpolated from the trigger
    assert_eq!(step_runs[2].params["fields"]["name"], json!("Ann"));

    assert!(platform.pending_approvals(run.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejection_fails_the_run_and_skips_downstream() {
    let platform = platform();
    let graph = welcome_graph();
    let run = platform
        .run_step_graph(&graph, trigger(), false)
        .await
        .unwrap();
    let request = platform.pending_approvals(run.id).await.unwrap().remove(0);

    let resumed = platform
        .resume_approval(
            &graph,
            request.id,
            ApprovalDecision::Reject,
            Some("wrong template".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(resumed.status, RunStatus::Failed);
    assert!(resumed
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("wrong template"));

    // the record step never ran
    let step_runs = platform.step_runs(run.id).await.unwrap();
    assert_eq!(step_runs.len(), 2);
    assert_eq!(step_runs[1].status, StepRunStatus::Failed);
}

#[tokio::test]
async fn a_decision_sticks() {
    let platform = platform();
    let graph = welcome_graph();
    let run = platform
        .run_step_graph(&graph, trigger(), false)
        .await
        .unwrap();
    let request = platform.pending_approvals(run.id).await.unwrap().remove(0);

    platform
        .resume_approval(&graph, request.id, ApprovalDecision::Approve, None)
        .await
        .unwrap();

    // the late rejection changes nothing
    let err = platform
        .resume_approval(&graph, request.id, ApprovalDecision::Reject, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already resolved"));

    let run = platform.run(run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}
