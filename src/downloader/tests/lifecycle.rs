use super::*;

#[tokio::test]
async fn shutdown_rejects_new_tasks_and_emits_event() {
    let downloader =
        ArchiveDownloader::with_merger(test_config(), Arc::new(RecordingMerger::default()))
            .unwrap();
    let handle = downloader.start_queue_processor().unwrap();
    let mut events = downloader.subscribe();

    assert!(!downloader.is_shutting_down());
    downloader.shutdown().await.unwrap();
    assert!(downloader.is_shutting_down());

    wait_for_event(&mut events, |e| matches!(e, Event::Shutdown)).await;
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("intake loop must stop")
        .unwrap();

    let result = downloader
        .add_task(Task::new(
            "late",
            crate::types::UrlPair::single("https://cdn.example.com/v"),
            crate::types::UrlPair::single("https://cdn.example.com/a"),
            "/tmp/late",
        ))
        .await;
    assert!(matches!(result, Err(Error::ShuttingDown)));
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_tasks() {
    let server = MockServer::start().await;
    mount_task_media(&server, "P1", 4_000).await;
    let dir = TempDir::new().unwrap();
    let merger = Arc::new(RecordingMerger::slow(Duration::from_millis(300)));
    let downloader = start_test_downloader(test_config(), merger.clone());
    let mut events = downloader.subscribe();

    let task = media_task(&server, dir.path(), "P1");
    let output = task.output_path();
    downloader.add_task(task).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, Event::TaskStarted { .. })).await;

    downloader.shutdown().await.unwrap();

    assert_eq!(merger.call_count(), 1);
    assert!(output.exists(), "in-flight task must finish before shutdown returns");
}

#[tokio::test]
async fn shutdown_cuts_pacing_short() {
    let server = MockServer::start().await;
    mount_task_media(&server, "P1", 2_000).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.pacing.interval = Duration::from_secs(60);
    let downloader = start_test_downloader(config, Arc::new(RecordingMerger::default()));
    let mut events = downloader.subscribe();

    downloader
        .add_task(media_task(&server, dir.path(), "P1"))
        .await
        .unwrap();
    wait_for_event(&mut events, |e| matches!(e, Event::TaskComplete { .. })).await;

    tokio::time::timeout(Duration::from_secs(5), downloader.shutdown())
        .await
        .expect("shutdown must not wait out a 60s pacing delay")
        .unwrap();
}
