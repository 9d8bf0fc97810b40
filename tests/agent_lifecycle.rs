//! Agent lifecycle integration tests
//!
//! Drives the controller against stub runners: single run slot, failure
//! states, cancellation and the observer stream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use browsebridge::{AgentController, AgentState, Model, ScriptGenerator, Task};
use common::StubRunner;
use tokio::time::timeout;
use tokio_stream::StreamExt;

const WAIT: Duration = Duration::from_secs(5);

fn controller(runner: &Arc<StubRunner>) -> AgentController {
    AgentController::new(runner.clone(), ScriptGenerator::default(), Duration::from_secs(30))
}

fn task(text: &str) -> Task {
    Task::new(text, Model::default(), "sk-test-credential-0000000000")
}

async fn settle(controller: &AgentController) -> AgentState {
    timeout(WAIT, controller.settled()).await.expect("run did not settle")
}

#[tokio::test]
async fn test_successful_run_returns_to_idle() {
    let runner = Arc::new(StubRunner::succeeding("done"));
    let controller = controller(&runner);

    assert!(controller.submit(task("open example.com")));
    assert_eq!(settle(&controller).await, AgentState::Idle);

    let report = controller.last_report().expect("report");
    assert!(report.succeeded);
    assert_eq!(report.summary, "done");
    assert!(report.stdout.contains("done"));
    assert_eq!(report.exit_code, Some(0));
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn test_failed_run_publishes_error() {
    let runner = Arc::new(StubRunner::failing("quota exceeded"));
    let controller = controller(&runner);

    assert!(controller.submit(task("search flights")));
    assert_eq!(
        settle(&controller).await,
        AgentState::Error("quota exceeded".to_string())
    );
    assert!(!controller.is_running());
}

#[tokio::test]
async fn test_launch_failure_publishes_error() {
    let runner = Arc::new(StubRunner::launch_failure());
    let controller = controller(&runner);

    controller.submit(task("anything"));
    match settle(&controller).await {
        AgentState::Error(message) => assert!(message.contains("Failed to launch")),
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(controller.last_report().and_then(|r| r.exit_code), None);
}

#[tokio::test]
async fn test_second_submit_rejected_while_running() {
    let runner = Arc::new(StubRunner::succeeding("done").with_delay(Duration::from_millis(200)));
    let controller = controller(&runner);

    assert!(controller.submit(task("first")));
    assert!(!controller.submit(task("second")));
    assert_eq!(controller.state(), AgentState::Running);

    settle(&controller).await;
    assert_eq!(runner.calls(), 1);

    assert!(controller.submit(task("third")));
    settle(&controller).await;
    assert_eq!(runner.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submits_accept_exactly_one() {
    let runner = Arc::new(StubRunner::succeeding("done").with_delay(Duration::from_millis(200)));
    let controller = controller(&runner);

    let attempts: Vec<_> = (0..16)
        .map(|i| {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit(task(&format!("task {}", i))) })
        })
        .collect();

    let mut accepted = 0;
    for attempt in attempts {
        if attempt.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    settle(&controller).await;
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn test_submit_from_error_starts_new_run() {
    let runner = Arc::new(StubRunner::failing("boom"));
    let controller = controller(&runner);

    controller.submit(task("one"));
    assert!(settle(&controller).await.is_error());

    assert!(controller.submit(task("two")));
    assert!(settle(&controller).await.is_error());
    assert_eq!(runner.calls(), 2);
}

#[tokio::test]
async fn test_acknowledge_clears_error() {
    let runner = Arc::new(StubRunner::failing("boom"));
    let controller = controller(&runner);

    controller.submit(task("one"));
    settle(&controller).await;

    assert!(controller.acknowledge());
    assert_eq!(controller.state(), AgentState::Idle);
    assert!(!controller.acknowledge());
}

#[tokio::test]
async fn test_cancel_when_idle_is_noop() {
    let runner = Arc::new(StubRunner::succeeding("done"));
    let controller = controller(&runner);

    assert!(!controller.cancel());
    assert!(!controller.cancel());
    assert_eq!(controller.state(), AgentState::Idle);
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_cancel_signals_running_process() {
    let runner = Arc::new(StubRunner::succeeding("done").with_delay(Duration::from_secs(10)));
    let controller = controller(&runner);

    controller.submit(task("slow"));
    // Let the run reach the runner before cancelling
    while runner.calls() == 0 {
        tokio::task::yield_now().await;
    }

    assert!(controller.cancel());
    assert_eq!(controller.state(), AgentState::Idle);

    timeout(WAIT, async {
        while !runner.saw_cancel.load(std::sync::atomic::Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("runner never saw the cancellation");
}

#[tokio::test]
async fn test_result_after_cancel_is_discarded() {
    let runner = Arc::new(
        StubRunner::failing("late failure")
            .with_delay(Duration::from_millis(150))
            .ignoring_cancel(),
    );
    let controller = controller(&runner);
    let mut states = controller.observe();
    assert_eq!(states.next().await, Some(AgentState::Idle));

    controller.submit(task("slow"));
    assert!(controller.cancel());
    assert_eq!(states.next().await, Some(AgentState::Running));
    assert_eq!(states.next().await, Some(AgentState::Idle));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(controller.state(), AgentState::Idle);
    assert!(controller.last_report().is_none());
    assert!(
        timeout(Duration::from_millis(100), states.next()).await.is_err(),
        "late result produced a transition"
    );
}

#[tokio::test]
async fn test_observe_starts_with_current_state() {
    let runner = Arc::new(StubRunner::failing("quota exceeded"));
    let controller = controller(&runner);
    let mut states = controller.observe();

    assert_eq!(states.next().await, Some(AgentState::Idle));
    controller.submit(task("go"));
    assert_eq!(states.next().await, Some(AgentState::Running));
    assert_eq!(
        timeout(WAIT, states.next()).await.unwrap(),
        Some(AgentState::Error("quota exceeded".to_string()))
    );

    // A late observer sees the error first
    let mut late = controller.observe();
    assert_eq!(
        late.next().await,
        Some(AgentState::Error("quota exceeded".to_string()))
    );
}

#[tokio::test]
async fn test_task_credential_is_forwarded_as_env_override() {
    let runner = Arc::new(StubRunner::succeeding("done"));
    let controller = controller(&runner);

    let task = Task::new(
        "summarise",
        Model::resolve("claude-3-haiku"),
        "sk-ant-REDACTED",
    );
    controller.submit(task);
    settle(&controller).await;

    let envs = runner.envs.lock().unwrap();
    assert_eq!(
        envs[0].get("ANTHROPIC_API_KEY").map(String::as_str),
        Some("sk-ant-REDACTED")
    );
    assert!(!envs[0].contains_key("OPENAI_API_KEY"));
}
