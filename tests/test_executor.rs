// Executor semantics against a recording pane driver

mod common;

use common::{
    AcceptAll, AcceptFirst, DeclineAll, EditingConfirmer, RecordingPane, ScriptedLlm, test_manager,
};

use muxmate::agent::{ActionStep, ExecOutcome, LoopOutcome, RunStatus};

fn steps_manager(
    pane: std::sync::Arc<RecordingPane>,
    confirmer: Box<dyn muxmate::agent::Confirmer>,
    prepared: bool,
) -> muxmate::agent::Manager {
    let llm = ScriptedLlm::new(&[]);
    let mut manager = test_manager(llm, pane, confirmer, prepared);
    manager.status.set(RunStatus::Running);
    manager
}

#[tokio::test]
async fn steps_execute_in_parsed_order() {
    let pane = RecordingPane::new();
    let mut manager = steps_manager(pane.clone(), Box::new(AcceptAll), false);

    let sequence = vec![
        ActionStep::Message("First I'll move to /tmp".to_string()),
        ActionStep::SendKeys("cd /tmp".to_string()),
        ActionStep::SendKeys("Enter".to_string()),
        ActionStep::ExecCommand("pwd".to_string()),
    ];

    let outcome = manager.execute_sequence(&sequence).await.unwrap();

    assert_eq!(outcome, ExecOutcome::Completed);
    let sent = pane.sent_keys();
    assert_eq!(sent.len(), 3);
    // Keys go through without Enter, commands with it.
    assert_eq!(sent[0], ("%1".to_string(), "cd /tmp".to_string(), false));
    assert_eq!(sent[1], ("%1".to_string(), "Enter".to_string(), false));
    assert_eq!(sent[2], ("%1".to_string(), "pwd".to_string(), true));
}

#[tokio::test]
async fn edited_confirmation_text_is_what_executes() {
    let pane = RecordingPane::new();
    let mut manager = steps_manager(
        pane.clone(),
        Box::new(EditingConfirmer("git status --short".to_string())),
        false,
    );
    manager.overrides.set("exec_confirm", "true");

    let sequence = vec![ActionStep::ExecCommand("git status".to_string())];
    let outcome = manager.execute_sequence(&sequence).await.unwrap();

    assert_eq!(outcome, ExecOutcome::Completed);
    let sent = pane.sent_keys();
    assert_eq!(sent[0].1, "git status --short");
}

#[tokio::test]
async fn decline_mid_sequence_skips_the_rest() {
    let pane = RecordingPane::new();
    let mut manager = steps_manager(pane.clone(), Box::new(AcceptFirst::new(1)), false);
    manager.overrides.set("exec_confirm", "true");

    let sequence = vec![
        ActionStep::ExecCommand("echo one".to_string()),
        ActionStep::ExecCommand("echo two".to_string()),
        ActionStep::ExecCommand("echo three".to_string()),
    ];
    let outcome = manager.execute_sequence(&sequence).await.unwrap();

    assert_eq!(outcome, ExecOutcome::Aborted);
    assert_eq!(manager.status.get(), RunStatus::Idle);
    assert_eq!(pane.sent_keys().len(), 1);
}

#[tokio::test]
async fn paste_goes_through_with_enter() {
    let pane = RecordingPane::new();
    let mut manager = steps_manager(pane.clone(), Box::new(AcceptAll), false);

    let content = "line one\nline two\nline three".to_string();
    let sequence = vec![ActionStep::PasteMultiline(content.clone())];
    manager.execute_sequence(&sequence).await.unwrap();

    let sent = pane.sent_keys();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, content);
    assert!(sent[0].2);
}

#[tokio::test]
async fn exec_and_wait_records_captured_history() {
    let pane = RecordingPane::new();
    let mut manager = steps_manager(pane.clone(), Box::new(AcceptAll), true);

    let sequence = vec![ActionStep::ExecAndWait("make test".to_string())];
    let outcome = manager.execute_sequence(&sequence).await.unwrap();

    assert_eq!(outcome, ExecOutcome::Completed);
    let exec_calls = pane.exec_calls.lock().unwrap().clone();
    assert_eq!(exec_calls, vec!["make test".to_string()]);
    assert_eq!(manager.exec_history.len(), 1);
    assert_eq!(manager.exec_history[0].command, "make test");
    assert_eq!(manager.exec_history[0].output, "captured output");
    assert_eq!(manager.exec_history[0].exit_code, 0);
}

#[tokio::test]
async fn status_flip_stops_before_the_next_step() {
    let pane = RecordingPane::new();
    let mut manager = steps_manager(pane.clone(), Box::new(AcceptAll), false);
    manager.status.set(RunStatus::Idle);

    let sequence = vec![ActionStep::ExecCommand("echo hi".to_string())];
    let outcome = manager.execute_sequence(&sequence).await.unwrap();

    assert_eq!(outcome, ExecOutcome::Aborted);
    assert!(pane.sent_keys().is_empty());
}

#[tokio::test]
async fn exec_and_wait_from_a_reply_feeds_the_next_prompt() {
    // Full-loop variant: a prepared pane runs ExecAndWait, then the captured
    // record shows up in the following user turn.
    let llm = ScriptedLlm::new(&[
        r#"<ExecAndWait>{"command":"uname -r"}</ExecAndWait>"#,
        r#"Kernel checked. <ChangeState>{"state":"RequestAccomplished"}</ChangeState>"#,
    ]);
    let pane = RecordingPane::new();
    let mut manager = test_manager(llm.clone(), pane, Box::new(DeclineAll), true);

    let outcome = manager.run_request("which kernel is this?").await.unwrap();

    assert_eq!(outcome, LoopOutcome::Done);
    assert_eq!(manager.exec_history.len(), 1);
    let followup = llm.last_user_content();
    assert!(followup.contains("uname -r"));
    assert!(followup.contains("captured output"));
}
