// Integration tests for replaying the apps file through a running supervisor

use appkeeper::config::{parse_rows, ConfigRow};
use appkeeper::ipc::{LifecycleEvent, LifecycleKind, ProcessId};
use appkeeper::process::{
    LaunchMode, RestartPolicy, Supervisor, SupervisorConfig, SupervisorHandle,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

fn start_supervisor(config: SupervisorConfig) -> SupervisorHandle {
    let supervisor = Supervisor::new(config);
    let handle = supervisor.handle();
    tokio::spawn(supervisor.run());
    handle
}

async fn next_event(signals: &mut broadcast::Receiver<LifecycleEvent>) -> LifecycleEvent {
    tokio::time::timeout(Duration::from_secs(15), signals.recv())
        .await
        .expect("timed out waiting for a lifecycle signal")
        .expect("signal channel closed")
}

fn rows(contents: &str) -> Vec<ConfigRow> {
    parse_rows(contents)
}

#[tokio::test]
async fn test_run_once_row_exits_without_restart() {
    let handle = start_supervisor(SupervisorConfig::default());
    let mut signals = handle.subscribe();

    let ids = handle
        .replay_startup_config(&rows("/tmp,/bin/true,0,0"))
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);

    let started = next_event(&mut signals).await;
    assert_eq!(started.kind, LifecycleKind::Started);
    assert_eq!(started.id, ids[0]);
    assert_eq!(started.path, PathBuf::from("/bin/true"));

    let exited = next_event(&mut signals).await;
    assert_eq!(exited.kind, LifecycleKind::Exited);
    assert_eq!(exited.id, ids[0]);

    // No restart follows
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(matches!(
        signals.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    assert!(handle.list().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_monitor_row_crash_loop_is_suspended() {
    let handle = start_supervisor(SupervisorConfig {
        restart_policy: RestartPolicy::new(Duration::from_secs(2), 5),
        start_timeout: Duration::from_secs(5),
    });
    let mut signals = handle.subscribe();

    let ids = handle
        .replay_startup_config(&rows("/tmp,/bin/false,1,0"))
        .await
        .unwrap();
    let id = ids[0];

    let mut started = 0;
    let mut exited = 0;
    // Initial launch plus six restarts, then one final exit once the window closes
    while exited == 0 {
        let event = next_event(&mut signals).await;
        assert_eq!(event.id, id);
        match event.kind {
            LifecycleKind::Started => started += 1,
            LifecycleKind::Exited => exited += 1,
            LifecycleKind::Errored => panic!("unexpected errored signal"),
        }
    }

    assert_eq!(started, 7);
    assert_eq!(exited, 1);
    assert!(handle.list().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_row_is_skipped() {
    let handle = start_supervisor(SupervisorConfig::default());

    let ids = handle
        .replay_startup_config(&rows("onlyonefield\n/tmp,/bin/sleep,5,1,0\n"))
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);

    let list = handle.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].path, PathBuf::from("/bin/sleep"));
    assert_eq!(list[0].args, vec!["5"]);
    assert_eq!(list[0].mode, LaunchMode::Monitor);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_control_request_launches_run_once() {
    let handle = start_supervisor(SupervisorConfig::default());
    let mut signals = handle.subscribe();

    handle
        .launch_from_control_request(
            Some(PathBuf::from("/tmp")),
            PathBuf::from("/bin/sleep"),
            vec!["5".to_string()],
        )
        .unwrap();

    let started = next_event(&mut signals).await;
    assert_eq!(started.kind, LifecycleKind::Started);
    assert_eq!(started.path, PathBuf::from("/bin/sleep"));

    let list = handle.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].mode, LaunchMode::RunOnce);
    assert_eq!(list[0].working_directory, PathBuf::from("/tmp"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replaying_twice_creates_independent_instances() {
    let handle = start_supervisor(SupervisorConfig::default());
    let config = rows("/tmp,/bin/sleep,5,0,0");

    let first = handle.replay_startup_config(&config).await.unwrap();
    let second = handle.replay_startup_config(&config).await.unwrap();
    assert_ne!(first[0], second[0]);

    let list = handle.list().await.unwrap();
    let ids: Vec<ProcessId> = list.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first[0], second[0]]);
    assert_ne!(list[0].pid, list[1].pid);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_settle_delay_separates_rows() {
    let handle = start_supervisor(SupervisorConfig::default());

    let started_at = Instant::now();
    let ids = handle
        .replay_startup_config(&rows("/tmp,/bin/true,0,1\n/tmp,/bin/true,0,0\n"))
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    assert!(started_at.elapsed() >= Duration::from_secs(1));

    // The supervisor kept serving requests while the replay slept
    assert!(handle.list().await.is_ok());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_executable_emits_errored() {
    let handle = start_supervisor(SupervisorConfig::default());
    let mut signals = handle.subscribe();

    let ids = handle
        .replay_startup_config(&rows("/tmp,/nonexistent/program,0,0"))
        .await
        .unwrap();

    let event = next_event(&mut signals).await;
    assert_eq!(event.kind, LifecycleKind::Errored);
    assert_eq!(event.id, ids[0]);
    assert!(handle.list().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}
