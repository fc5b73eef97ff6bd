//! End-to-end pipeline behavior against the mock stage client.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use neural_agents::{AgentRole, MockStageClient};
use neural_core::{
    AgentStatus, CoreError, FileMutation, PluginResult, ReviewComment, Severity, REQUIRED_FILES,
};
use neural_studio::{MemoryStorage, StateEvent, StorageBackend, Studio, StudioConfig, StudioError};

fn test_config(failure_probability: f64) -> StudioConfig {
    let mut config = StudioConfig::default();
    config.pipeline.compile_delay_ms = 0;
    config.pipeline.failure_probability = failure_probability;
    config.pipeline.seed = Some(7);
    config
}

fn open(client: &MockStageClient, config: StudioConfig) -> (Studio, Arc<MemoryStorage>) {
    let backend = Arc::new(MemoryStorage::new());
    let studio = Studio::with_backend(config, Arc::new(client.clone()), backend.clone()).unwrap();
    (studio, backend)
}

fn statuses(events: &mut tokio::sync::broadcast::Receiver<StateEvent>) -> Vec<AgentStatus> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let StateEvent::StatusChanged { status, .. } = event {
            out.push(status);
        }
    }
    out
}

#[tokio::test]
async fn test_pipeline_visits_stages_in_order() {
    let client = MockStageClient::new();
    let (studio, _) = open(&client, test_config(0.0));
    let mut events = studio.store().subscribe();

    let status = studio.run("todo app").await.unwrap();

    assert_eq!(status, AgentStatus::Ready);
    let mut expected = AgentStatus::PIPELINE.to_vec();
    expected.push(AgentStatus::Ready);
    assert_eq!(statuses(&mut events), expected);
}

#[tokio::test]
async fn test_each_run_adds_seven_snapshots() {
    let client = MockStageClient::new();
    let (studio, _) = open(&client, test_config(0.0));

    studio.run("todo app").await.unwrap();
    let first = studio.store().snapshot();
    assert_eq!(first.history.len(), 7);
    let labels: Vec<_> = first.history.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "Requirements Analysis",
            "Feature Planning",
            "Design System",
            "Architecture Scaffold",
            "Code Generation",
            "Code Review",
            "Build",
        ]
    );

    studio.run("notes app").await.unwrap();
    let second = studio.store().snapshot();
    assert_eq!(second.history.len(), 14);
    assert_eq!(second.history[..7], first.history[..]);
}

#[tokio::test]
async fn test_todo_app_scenario() {
    let client = MockStageClient::new();
    let (studio, _) = open(&client, test_config(0.0));

    studio.run("todo app").await.unwrap();
    let state = studio.store().snapshot();

    for required in REQUIRED_FILES {
        assert!(state.file_system.contains_key(required), "missing {}", required);
    }
    let design = state.design_system.as_ref().unwrap();
    assert!(!design.metadata.app_name.is_empty());
    let score = state.active_review.as_ref().unwrap().overall_score;
    assert!((0.0..=100.0).contains(&score));

    // Coding ran one file at a time over the scaffolded paths
    let coded: Vec<_> = client
        .calls_for(AgentRole::Coder)
        .into_iter()
        .map(|c| c.subject)
        .collect();
    let paths: Vec<_> = state.file_system.keys().cloned().collect();
    assert_eq!(coded, paths);
    assert!(state
        .file_system
        .values()
        .all(|content| !content.contains("Awaiting generation")));
}

#[tokio::test]
async fn test_every_stage_runs_once_per_run() {
    let client = MockStageClient::new();
    let (studio, _) = open(&client, test_config(0.0));

    studio.run("todo app").await.unwrap();
    let state = studio.store().snapshot();

    for role in [AgentRole::Manager, AgentRole::Planner, AgentRole::Designer, AgentRole::Reviewer] {
        assert_eq!(client.calls_for(role).len(), 1, "{} ran more than once", role);
    }
    let coded: BTreeSet<_> = client
        .calls_for(AgentRole::Coder)
        .into_iter()
        .map(|c| c.subject)
        .collect();
    assert_eq!(coded.len(), state.file_system.len());
    assert_eq!(client.calls_for(AgentRole::Coder).len(), state.file_system.len());
}

#[tokio::test]
async fn test_forced_failure_heals_exactly_once() {
    let client = MockStageClient::new();
    let (studio, _) = open(&client, test_config(1.0));
    let mut events = studio.store().subscribe();

    let status = studio.run("todo app").await.unwrap();
    assert_eq!(status, AgentStatus::Ready);

    let seen = statuses(&mut events);
    assert_eq!(
        seen[seen.len() - 4..],
        [
            AgentStatus::Compiling,
            AgentStatus::Healing,
            AgentStatus::Compiling,
            AgentStatus::Ready
        ]
    );
    assert_eq!(
        seen.iter().filter(|s| **s == AgentStatus::Healing).count(),
        1
    );

    let state = studio.store().snapshot();
    assert_eq!(state.iteration_count, 1);
    assert!(state.file_system["src/App.tsx"].contains("// patched:"));
    assert_eq!(client.calls_for(AgentRole::Patcher).len(), 1);
}

#[tokio::test]
async fn test_post_coding_plugin_feeds_reviewer() {
    let client = MockStageClient::new().with_plugin_result(
        "perf-optimizer",
        PluginResult {
            comments: vec![ReviewComment {
                file: "src/App.tsx".to_string(),
                severity: Severity::Info,
                message: "Memoized list rendering".to_string(),
                ..Default::default()
            }],
            mutations: vec![FileMutation {
                path: "src/App.tsx".to_string(),
                content: "export default React.memo(App);".to_string(),
            }],
        },
    );
    let (studio, _) = open(&client, test_config(0.0));
    assert!(studio.store().toggle_plugin("perf-optimizer").unwrap());

    studio.run("todo app").await.unwrap();

    let review_call = &client.calls_for(AgentRole::Reviewer)[0];
    assert_eq!(
        review_call.files["src/App.tsx"],
        "export default React.memo(App);"
    );
    let state = studio.store().snapshot();
    let comments = &state.active_review.as_ref().unwrap().comments;
    assert_eq!(comments[0].message, "Memoized list rendering");
    assert_eq!(client.plugin_call_count("perf-optimizer"), 1);

    // Disabled plugins are never dispatched
    assert!(!studio.store().toggle_plugin("perf-optimizer").unwrap());
    client.clear_calls();
    studio.run("todo app").await.unwrap();
    assert_eq!(client.plugin_call_count("perf-optimizer"), 0);
    assert_eq!(client.plugin_call_count("security-auditor"), 1);
}

#[tokio::test]
async fn test_stage_failure_halts_run() {
    let client = MockStageClient::new().fail_stage(AgentRole::Designer, "rate limited");
    let (studio, _) = open(&client, test_config(0.0));

    let status = studio.run("todo app").await.unwrap();
    assert_eq!(status, AgentStatus::Error);

    let state = studio.store().snapshot();
    assert!(state.srs.is_some());
    assert!(state.plan.is_some());
    assert!(state.design_system.is_none());
    assert!(state
        .terminal_logs
        .last()
        .unwrap()
        .starts_with("[error]"));
    assert!(client.calls_for(AgentRole::Coder).is_empty());

    // The user can start over after a halt
    client.clear_failure(AgentRole::Designer);
    assert_eq!(studio.run("todo app").await.unwrap(), AgentStatus::Ready);
}

#[tokio::test]
async fn test_reset_mid_run_discards_late_results() {
    let client = MockStageClient::new().with_delay(Duration::from_millis(50));
    let (studio, backend) = open(&client, test_config(0.0));

    let generation = studio.start_run("todo app").unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    studio.store().reset().unwrap();

    // Give the cancelled handler time to have answered
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = studio.store().snapshot();
    assert_eq!(state.status, AgentStatus::Idle);
    assert!(state.file_system.is_empty());
    assert!(state.history.is_empty());
    assert!(state.srs.is_none());
    assert!(backend.get("neural-studio-state").unwrap().is_none());

    let err = studio
        .store()
        .transition(generation, AgentStatus::Planning)
        .unwrap_err();
    assert!(err.is_stale());
}

#[tokio::test]
async fn test_rollback_restores_snapshot() {
    let client = MockStageClient::new();
    let (studio, _) = open(&client, test_config(0.0));
    studio.run("todo app").await.unwrap();

    let store = studio.store();
    let scaffold = store.read(|s| {
        s.history
            .iter()
            .find(|h| h.status == AgentStatus::Architecting)
            .cloned()
            .unwrap()
    });
    let history_len = store.read(|s| s.history.len());

    store.rollback(&scaffold.id).unwrap();
    store.rollback(&scaffold.id).unwrap();

    let state = store.snapshot();
    assert_eq!(state.status, AgentStatus::Ready);
    assert_eq!(state.file_system, scaffold.file_system);
    assert_eq!(state.history.len(), history_len);
    assert!(state.selected_history_id.is_none());
}

#[tokio::test]
async fn test_manual_plugin_run() {
    let client = MockStageClient::new().with_plugin_result(
        "doc-generator",
        PluginResult {
            comments: vec![],
            mutations: vec![FileMutation {
                path: "README.md".to_string(),
                content: "# Todo App".to_string(),
            }],
        },
    );
    let (studio, _) = open(&client, test_config(0.0));
    studio.run("todo app").await.unwrap();

    let summary = studio.run_plugin("doc-generator").await.unwrap();
    assert_eq!(summary.mutations, 1);

    let state = studio.store().snapshot();
    assert_eq!(state.file_system["README.md"], "# Todo App");
    let last = state.history.last().unwrap();
    assert_eq!(last.label, "Manual Run: Documentation Generator");
    assert!(last.file_system.contains_key("README.md"));

    let err = studio.run_plugin("a11y-checker").await.unwrap_err();
    assert!(matches!(
        err,
        StudioError::Core(CoreError::PluginDisabled(_))
    ));

    let first = state.history[0].id.clone();
    studio.store().select_history(Some(&first)).unwrap();
    let err = studio.run_plugin("doc-generator").await.unwrap_err();
    assert!(matches!(
        err,
        StudioError::Core(CoreError::SnapshotModeReadOnly)
    ));
}

#[tokio::test]
async fn test_run_rejected_while_running() {
    let client = MockStageClient::new().with_delay(Duration::from_millis(20));
    let (studio, _) = open(&client, test_config(0.0));

    let generation = studio.start_run("todo app").unwrap();
    let err = studio.start_run("other").unwrap_err();
    assert!(matches!(
        err,
        StudioError::Core(CoreError::RunInProgress(_))
    ));
    assert_eq!(
        studio.wait_until_settled(generation).await.unwrap(),
        AgentStatus::Ready
    );
}
