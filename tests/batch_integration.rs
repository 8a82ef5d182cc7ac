//! Integration tests for batches of recordings sharing one worker pool.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use connectdl_core::{
    BatchCoordinator, BatchObserver, BatchOptions, Downloader, HttpClient, PoolConfig,
    ProgressCallback, RecordingError, RecordingOptions, RecordingResult, WorkerPool,
};
use tempfile::TempDir;
use wiremock::{MockServer, ResponseTemplate};

use support::{
    full_archive, mount_archive, mount_full_recording, mount_page, recording_url, zip_response,
};

/// Counts observer callbacks per URL.
#[derive(Debug, Default)]
struct CountingObserver {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<(String, bool)>>,
    progress_calls: Arc<AtomicUsize>,
}

impl BatchObserver for CountingObserver {
    fn recording_started(&self, _label: &str, url: &str) -> Option<ProgressCallback> {
        self.started.lock().unwrap().push(url.to_string());
        let calls = Arc::clone(&self.progress_calls);
        Some(Arc::new(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn recording_finished(&self, url: &str, outcome: Result<&RecordingResult, &RecordingError>) {
        self.finished
            .lock()
            .unwrap()
            .push((url.to_string(), outcome.is_ok()));
    }
}

fn small_pool(workers: usize, queue_capacity: usize) -> Arc<WorkerPool> {
    let pool = WorkerPool::new(
        HttpClient::new(),
        PoolConfig {
            workers,
            queue_capacity,
        },
    )
    .expect("valid pool config");
    pool.start();
    Arc::new(pool)
}

#[tokio::test]
async fn test_concurrent_batch_through_single_worker_pool() {
    // Setup: three recordings, one worker, one queue slot.
    let server = MockServer::start().await;
    let ids = ["p1alpha", "p1beta", "p1gamma"];
    for (index, id) in ids.iter().enumerate() {
        mount_full_recording(&server, id, &format!("Lecture {}", index + 1)).await;
    }
    let urls: Vec<String> = ids.iter().map(|id| recording_url(&server, id)).collect();
    let temp = TempDir::new().expect("Failed to create temp dir");
    let pool = small_pool(1, 1);
    let observer = Arc::new(CountingObserver::default());

    // Execute
    let options = BatchOptions::for_run(urls.len(), true, false);
    assert!(options.concurrent);
    let summary = BatchCoordinator::new(Downloader::with_pool(Arc::clone(&pool)), options)
        .with_observer(observer.clone())
        .run(&urls, &RecordingOptions::new(temp.path()))
        .await;
    pool.stop().await;

    // Verify
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.is_success());
    assert!(summary.total_bytes > 0);
    for index in 1..=3 {
        let root = temp.path().join(format!("Lecture {index}"));
        assert!(root.join("recording.mp4").is_file());
        assert!(root.join("raw.zip").is_file());
        assert!(root.join("metadata.json").is_file());
    }

    let mut started = observer.started.lock().unwrap().clone();
    started.sort();
    let mut expected = urls.clone();
    expected.sort();
    assert_eq!(started, expected);
    assert_eq!(observer.finished.lock().unwrap().len(), 3);
    assert!(observer.progress_calls.load(Ordering::SeqCst) >= 3);

    // archive, video, extract and one document per recording
    assert_eq!(pool.stats().total(), 12);
}

#[tokio::test]
async fn test_batch_reports_failures_in_input_order() {
    let server = MockServer::start().await;
    mount_full_recording(&server, "p1good", "Good Lecture").await;
    mount_page(&server, "p1private", ResponseTemplate::new(401)).await;
    let temp = TempDir::new().expect("Failed to create temp dir");
    let pool = small_pool(4, 8);

    let urls = vec![
        "not a url at all://".to_string(),
        recording_url(&server, "p1good"),
        recording_url(&server, "p1private"),
    ];
    let summary = BatchCoordinator::new(
        Downloader::with_pool(Arc::clone(&pool)),
        BatchOptions::for_run(urls.len(), true, false),
    )
    .run(&urls, &RecordingOptions::new(temp.path()))
    .await;
    pool.stop().await;

    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.failed_urls, vec![urls[0].clone(), urls[2].clone()]);
    assert!(!summary.is_success());
    assert!(!temp.path().join("p1private").exists());
}

#[tokio::test]
async fn test_sequential_batch_runs_in_order() {
    let server = MockServer::start().await;
    mount_full_recording(&server, "p1first", "First").await;
    mount_full_recording(&server, "p1second", "Second").await;
    let temp = TempDir::new().expect("Failed to create temp dir");
    let observer = Arc::new(CountingObserver::default());

    let urls = vec![
        recording_url(&server, "p1first"),
        recording_url(&server, "p1second"),
    ];
    let options = BatchOptions::for_run(urls.len(), false, true);
    assert!(!options.concurrent);
    let summary = BatchCoordinator::new(Downloader::new(HttpClient::new()), options)
        .with_observer(observer.clone())
        .run(&urls, &RecordingOptions::new(temp.path()))
        .await;

    assert_eq!(summary.successful, 2);
    assert_eq!(*observer.started.lock().unwrap(), urls);
    let finished = observer.finished.lock().unwrap();
    assert_eq!(finished[0], (urls[0].clone(), true));
    assert_eq!(finished[1], (urls[1].clone(), true));
}

#[tokio::test]
async fn test_slow_recording_times_out_without_blocking_others() {
    let server = MockServer::start().await;
    mount_full_recording(&server, "p1fast", "Fast").await;
    mount_page(
        &server,
        "p1slow",
        ResponseTemplate::new(200).set_delay(Duration::from_secs(30)),
    )
    .await;
    mount_archive(&server, "p1slow", zip_response(full_archive())).await;
    let temp = TempDir::new().expect("Failed to create temp dir");
    let pool = small_pool(4, 8);

    let urls = vec![
        recording_url(&server, "p1slow"),
        recording_url(&server, "p1fast"),
    ];
    let options = BatchOptions {
        recording_timeout: Duration::from_secs(3),
        ..BatchOptions::for_run(urls.len(), true, false)
    };
    let summary = BatchCoordinator::new(Downloader::with_pool(Arc::clone(&pool)), options)
        .run(&urls, &RecordingOptions::new(temp.path()))
        .await;
    pool.stop().await;

    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed_urls, vec![urls[0].clone()]);
    assert!(summary.elapsed < Duration::from_secs(20));
    assert!(temp.path().join("Fast").join("recording.mp4").is_file());

    // the timed-out recording's staged archive is removed
    let leftovers: Vec<String> = std::fs::read_dir(temp.path())
        .expect("read output dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains("_temp."))
        .collect();
    assert!(leftovers.is_empty(), "unexpected staged files: {leftovers:?}");
}
