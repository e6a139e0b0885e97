use trace_agent::domain::entities::durable_status::DurableStatus;
use trace_agent::infrastructure::storage::result_dir::{
    ResultDir, DONE_MARKER, ERROR_MARKER, IN_FLIGHT_MARKER,
};
use trace_agent::infrastructure::storage::status_store::StatusStore;
use trace_agent::infrastructure::storage::workspace::ScratchWorkspace;

#[tokio::test]
async fn given_finished_workspace_when_uploaded_should_move_files_and_leave_single_marker() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = ScratchWorkspace::new(dir.path().join("tmp"));
    workspace.reset().await.unwrap();
    std::fs::write(workspace.path("1_trace.gz"), b"trace").unwrap();
    std::fs::write(workspace.path("test.log.gz"), b"log").unwrap();
    let results = ResultDir::new(dir.path().join("results/20240101/abc"));

    results.write_progress("Uploading results").await.unwrap();
    let mut uploaded = results.upload_from(&workspace).await.unwrap();
    results.mark_done().await.unwrap();

    uploaded.sort();
    assert_eq!(
        uploaded,
        vec![
            results.path().join("1_trace.gz"),
            results.path().join("test.log.gz"),
        ]
    );
    assert!(workspace.files().await.unwrap().is_empty());
    assert!(results.path().join(DONE_MARKER).exists());
    assert!(!results.path().join(IN_FLIGHT_MARKER).exists());
    assert!(!results.path().join(ERROR_MARKER).exists());
}

#[tokio::test]
async fn given_status_saved_by_one_session_when_next_session_loads_should_skip_install() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.json");
    let mut status = DurableStatus::default();
    status.record_install("cafebabe");
    StatusStore::new(&path).save(&status).await.unwrap();

    let restored = StatusStore::new(&path).load().await;

    assert!(!restored.needs_install("cafebabe"));
    assert!(restored.needs_install("deadbeef"));
}
