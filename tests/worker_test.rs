//! Worker scenarios against scripted extractor/transcoder

mod common;

use common::{drain, drain_states, list_files, worker_config, ScriptedExtractor, ScriptedTranscoder, Step};
use rustcutter::extractor::Postprocess;
use rustcutter::format::{AudioBitrate, FormatCascade, QualityTier};
use rustcutter::queue::{
    QueueEvent, RunOutcome, TaskQueue, TaskRequest, TaskState, TimeRange, Worker, WorkerConfig,
};
use rustcutter::transcoder::TrimProfile;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

struct Run {
    queue: Arc<Mutex<TaskQueue>>,
    events: mpsc::Receiver<QueueEvent>,
    events_tx: mpsc::Sender<QueueEvent>,
    config: WorkerConfig,
}

impl Run {
    fn new(root: &Path, requests: Vec<TaskRequest>) -> Self {
        let mut queue = TaskQueue::new();
        for request in requests {
            queue.push(request);
        }
        let (events_tx, events) = mpsc::channel(1024);
        Self {
            queue: Arc::new(Mutex::new(queue)),
            events,
            events_tx,
            config: worker_config(root),
        }
    }

    fn worker(&self, extractor: Arc<ScriptedExtractor>, transcoder: Arc<ScriptedTranscoder>) -> Worker {
        Worker::new(
            self.queue.clone(),
            extractor,
            transcoder,
            self.config.clone(),
            self.events_tx.clone(),
        )
    }

    async fn temp_dir(&self) -> std::path::PathBuf {
        self.queue.lock().await.temp_dir(&self.config.temp_root)
    }
}

#[tokio::test]
async fn audio_only_task_goes_straight_to_done() {
    let root = TempDir::new().unwrap();
    let mut run = Run::new(
        root.path(),
        vec![TaskRequest::new("https://example.com/song").with_quality(QualityTier::AudioOnly)],
    );
    let extractor = ScriptedExtractor::new([Step::ok("mp3", "Some Song")]);
    let transcoder = ScriptedTranscoder::new();

    let summary = run
        .worker(extractor.clone(), transcoder.clone())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.done, 1);
    assert_eq!(
        drain_states(&mut run.events, 1),
        vec![TaskState::Fetching, TaskState::Downloading, TaskState::Done]
    );

    let queue = run.queue.lock().await;
    let task = queue.get(1).unwrap();
    let output = task.output_path.clone().unwrap();
    assert_eq!(output, root.path().join("out").join("Some_Song_audio.mp3"));
    assert!(output.exists());
    assert_eq!(task.title.as_deref(), Some("Some Song"));
    assert!(task.error.is_none());

    let calls = extractor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].selector, FormatCascade::resolve(QualityTier::AudioOnly)[0]);
    assert_eq!(
        calls[0].postprocess,
        Postprocess::ExtractAudio {
            bitrate: AudioBitrate::Auto
        }
    );
    assert!(transcoder.trims().is_empty());
    assert!(transcoder.audio_jobs().is_empty());
}

#[tokio::test]
async fn fragment_falls_back_then_trims() {
    let root = TempDir::new().unwrap();
    let request = TaskRequest::new("https://example.com/talk")
        .with_quality(QualityTier::High)
        .with_range(TimeRange::new(10, 20).unwrap());
    let mut run = Run::new(root.path(), vec![request]);
    let extractor = ScriptedExtractor::new([Step::FormatUnavailable, Step::ok("webm", "Talk")]);
    let transcoder = ScriptedTranscoder::new();

    let summary = run
        .worker(extractor.clone(), transcoder.clone())
        .run(CancellationToken::new())
        .await;
    assert_eq!(summary.done, 1);

    let cascade = FormatCascade::resolve(QualityTier::High);
    let calls = extractor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].selector, cascade[0]);
    assert_eq!(calls[1].selector, cascade[1]);
    assert_eq!(calls[1].postprocess, Postprocess::None);

    let trims = transcoder.trims();
    assert_eq!(trims.len(), 1);
    assert_eq!((trims[0].start, trims[0].end), (10, 20));
    assert_eq!(trims[0].profile, TrimProfile::Mp4);
    assert_eq!(trims[0].input.extension().unwrap(), "webm");

    assert_eq!(
        drain_states(&mut run.events, 1),
        vec![
            TaskState::Fetching,
            TaskState::Downloading,
            TaskState::Postprocessing,
            TaskState::Done
        ]
    );

    let output = run.queue.lock().await.get(1).unwrap().output_path.clone().unwrap();
    assert_eq!(output.file_name().unwrap(), "Talk_1080p_cut_10-20.mp4");
    assert!(list_files(&run.temp_dir().await).is_empty(), "temp files left behind");
}

#[tokio::test]
async fn exhausted_cascade_is_a_task_error() {
    let root = TempDir::new().unwrap();
    let mut run = Run::new(
        root.path(),
        vec![TaskRequest::new("https://example.com/v").with_quality(QualityTier::Standard)],
    );
    let steps = FormatCascade::resolve(QualityTier::Standard)
        .iter()
        .map(|_| Step::FormatUnavailable)
        .collect::<Vec<_>>();
    let extractor = ScriptedExtractor::new(steps);

    let summary = run
        .worker(extractor.clone(), ScriptedTranscoder::new())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(extractor.calls().len(), FormatCascade::resolve(QualityTier::Standard).len());

    let queue = run.queue.lock().await;
    let task = queue.get(1).unwrap();
    assert_eq!(task.state, TaskState::Error);
    assert!(task.error.as_deref().unwrap().contains("not available"));
    assert!(task.output_path.is_none());
    drop(queue);

    assert!(list_files(&run.temp_dir().await).is_empty());
    let failed = drain(&mut run.events)
        .into_iter()
        .any(|e| matches!(e, QueueEvent::TaskFailed { task_id: 1, .. }));
    assert!(failed);
}

#[tokio::test]
async fn generic_failure_gets_hint_and_queue_continues() {
    let root = TempDir::new().unwrap();
    let run = Run::new(
        root.path(),
        vec![TaskRequest::new("https://example.com/a"), TaskRequest::new("https://example.com/b")],
    );
    let extractor = ScriptedExtractor::new([
        Step::Fail("ERROR: [youtube] a: HTTP Error 403: Forbidden"),
        Step::ok("mp4", "Second"),
    ]);

    let summary = run
        .worker(extractor.clone(), ScriptedTranscoder::new())
        .run(CancellationToken::new())
        .await;

    assert_eq!((summary.done, summary.failed), (1, 1));
    // A non-format failure does not walk the cascade
    assert_eq!(extractor.calls().len(), 2);

    let queue = run.queue.lock().await;
    let first = queue.get(1).unwrap();
    assert_eq!(first.state, TaskState::Error);
    assert!(first.error.as_deref().unwrap().contains("cookie source"));
    assert_eq!(queue.get(2).unwrap().state, TaskState::Done);
}

#[tokio::test]
async fn stalled_download_fails_only_that_task() {
    let root = TempDir::new().unwrap();
    let mut run = Run::new(
        root.path(),
        vec![TaskRequest::new("https://example.com/a"), TaskRequest::new("https://example.com/b")],
    );
    run.config.stall_timeout = Duration::from_millis(150);
    let extractor = ScriptedExtractor::new([Step::Silent, Step::ok("mp4", "Second")]);

    let summary = run
        .worker(extractor, ScriptedTranscoder::new())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!((summary.done, summary.failed), (1, 1));

    let queue = run.queue.lock().await;
    let first = queue.get(1).unwrap();
    assert_eq!(first.state, TaskState::Error);
    assert!(first.error.as_deref().unwrap().contains("stalled"));
    assert_eq!(queue.get(2).unwrap().state, TaskState::Done);
}

#[tokio::test]
async fn failed_trim_keeps_the_download() {
    let root = TempDir::new().unwrap();
    let request = TaskRequest::new("https://example.com/v")
        .with_quality(QualityTier::AudioOnly)
        .with_range(TimeRange::new(5, 9).unwrap());
    let mut run = Run::new(root.path(), vec![request]);
    let extractor = ScriptedExtractor::new([Step::ok("m4a", "Song")]);
    let transcoder = ScriptedTranscoder::failing();

    let summary = run
        .worker(extractor, transcoder.clone())
        .run(CancellationToken::new())
        .await;
    assert_eq!(summary.failed, 1);
    assert_eq!(transcoder.trims()[0].profile, TrimProfile::Mp3);

    let preserved = {
        let queue = run.queue.lock().await;
        let task = queue.get(1).unwrap();
        assert_eq!(task.state, TaskState::Error);
        assert!(task.error.as_deref().unwrap().contains("ffmpeg"));
        task.preserved_temp.clone().expect("pre-trim file recorded")
    };
    assert!(preserved.exists());
    assert_eq!(preserved.extension().unwrap(), "m4a");

    let reported = drain(&mut run.events).into_iter().find_map(|e| match e {
        QueueEvent::TaskFailed { preserved_temp, .. } => preserved_temp,
        _ => None,
    });
    assert_eq!(reported, Some(preserved));
    assert!(list_files(&root.path().join("out")).is_empty());
}

#[tokio::test]
async fn non_mp3_audio_is_converted() {
    let root = TempDir::new().unwrap();
    let request = TaskRequest::new("https://example.com/v")
        .with_quality(QualityTier::AudioOnly)
        .with_bitrate(AudioBitrate::Kbps320);
    let mut run = Run::new(root.path(), vec![request]);
    let transcoder = ScriptedTranscoder::new();

    run.worker(ScriptedExtractor::new([Step::ok("opus", "Song")]), transcoder.clone())
        .run(CancellationToken::new())
        .await;

    let jobs = transcoder.audio_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].bitrate, AudioBitrate::Kbps320);
    assert!(drain_states(&mut run.events, 1).contains(&TaskState::Postprocessing));

    let output = run.queue.lock().await.get(1).unwrap().output_path.clone().unwrap();
    assert_eq!(output.extension().unwrap(), "mp3");
    assert!(list_files(&run.temp_dir().await).is_empty());
}

#[tokio::test]
async fn unconverted_video_keeps_negotiated_container() {
    let root = TempDir::new().unwrap();
    let request = TaskRequest::new("https://example.com/v").with_convert(false);
    let run = Run::new(root.path(), vec![request]);
    let extractor = ScriptedExtractor::new([Step::ok("webm", "Clip")]);

    run.worker(extractor.clone(), ScriptedTranscoder::new())
        .run(CancellationToken::new())
        .await;

    assert_eq!(extractor.calls()[0].postprocess, Postprocess::None);
    let output = run.queue.lock().await.get(1).unwrap().output_path.clone().unwrap();
    assert_eq!(output.file_name().unwrap(), "Clip_best.webm");
}

#[tokio::test]
async fn repeated_titles_get_distinct_names() {
    let root = TempDir::new().unwrap();
    let requests = (0..3).map(|_| TaskRequest::new("https://example.com/v")).collect();
    let run = Run::new(root.path(), requests);
    let extractor = ScriptedExtractor::new((0..3).map(|_| Step::ok("mp4", "Same")));

    run.worker(extractor, ScriptedTranscoder::new())
        .run(CancellationToken::new())
        .await;

    let queue = run.queue.lock().await;
    let names: Vec<String> = queue
        .tasks()
        .iter()
        .map(|t| t.output_path.as_ref().unwrap().file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["Same_best.mp4", "Same_best_1.mp4", "Same_best_2.mp4"]);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let root = TempDir::new().unwrap();
    let run = Run::new(
        root.path(),
        vec![TaskRequest::new("https://example.com/a"), TaskRequest::new("https://example.com/b")],
    );
    let extractor = ScriptedExtractor::new([]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run.worker(extractor.clone(), ScriptedTranscoder::new()).run(cancel).await;

    assert_eq!(summary.outcome, RunOutcome::Aborted);
    assert_eq!(summary.pending, 2);
    assert!(extractor.calls().is_empty());
    assert_eq!(run.queue.lock().await.count(TaskState::Pending), 2);
}

#[tokio::test]
async fn rerun_skips_finished_tasks() {
    let root = TempDir::new().unwrap();
    let run = Run::new(
        root.path(),
        vec![TaskRequest::new("https://example.com/a"), TaskRequest::new("https://example.com/b")],
    );
    let extractor = ScriptedExtractor::new([Step::Fail("ERROR: boom"), Step::ok("mp4", "B")]);
    let transcoder = ScriptedTranscoder::new();

    run.worker(extractor.clone(), transcoder.clone())
        .run(CancellationToken::new())
        .await;
    assert_eq!(extractor.calls().len(), 2);

    let third = run.queue.lock().await.push(TaskRequest::new("https://example.com/c"));
    let summary = run
        .worker(extractor.clone(), transcoder)
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 0);
    let calls = extractor.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].url, "https://example.com/c");

    let queue = run.queue.lock().await;
    assert_eq!(queue.get(1).unwrap().state, TaskState::Error);
    assert_eq!(queue.get(2).unwrap().state, TaskState::Done);
    assert_eq!(queue.get(third).unwrap().state, TaskState::Done);
}

#[tokio::test]
async fn progress_is_forwarded() {
    let root = TempDir::new().unwrap();
    let mut run = Run::new(root.path(), vec![TaskRequest::new("https://example.com/a")]);

    run.worker(ScriptedExtractor::new([Step::ok("mp4", "A")]), ScriptedTranscoder::new())
        .run(CancellationToken::new())
        .await;

    let progress: Vec<_> = drain(&mut run.events)
        .into_iter()
        .filter_map(|e| match e {
            QueueEvent::Progress { progress, .. } => Some(progress),
            _ => None,
        })
        .collect();
    assert!(!progress.is_empty());
    assert_eq!(progress.last().unwrap().percentage(), 1.0);
}

#[tokio::test]
async fn slow_extractor_postprocessing_is_not_a_stall() {
    let root = TempDir::new().unwrap();
    let request = TaskRequest::new("https://example.com/song").with_quality(QualityTier::AudioOnly);
    let mut run = Run::new(root.path(), vec![request]);
    run.config.stall_timeout = Duration::from_millis(100);
    let extractor = ScriptedExtractor::new([Step::SlowFinish {
        ext: "mp3",
        title: "Long Song",
        delay: Duration::from_millis(400),
    }]);

    let summary = run
        .worker(extractor, ScriptedTranscoder::new())
        .run(CancellationToken::new())
        .await;

    assert_eq!(summary.done, 1);
    let queue = run.queue.lock().await;
    let task = queue.get(1).unwrap();
    assert_eq!(task.state, TaskState::Done, "error: {:?}", task.error);
    assert!(root.path().join("out").join("Long_Song_audio.mp3").exists());
}

#[tokio::test]
async fn stop_during_trim_aborts_and_discards_the_download() {
    let root = TempDir::new().unwrap();
    let fragment = TaskRequest::new("https://example.com/v").with_range(TimeRange::new(5, 9).unwrap());
    let run = Run::new(
        root.path(),
        vec![fragment, TaskRequest::new("https://example.com/next")],
    );
    let temp_dir = run.temp_dir().await;
    let extractor = ScriptedExtractor::new([Step::ok("mp4", "Clip"), Step::ok("mp4", "Next")]);
    let transcoder = ScriptedTranscoder::hanging();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(run.worker(extractor.clone(), transcoder.clone()).run(cancel.clone()));

    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if run.queue.lock().await.get(1).unwrap().state == TaskState::Postprocessing
                && !transcoder.trims().is_empty()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "trim never started");
    cancel.cancel();

    let summary = handle.await.unwrap();
    assert_eq!(summary.outcome, RunOutcome::Aborted);
    assert_eq!((summary.aborted, summary.pending), (1, 1));

    let queue = run.queue.lock().await;
    let task = queue.get(1).unwrap();
    assert_eq!(task.state, TaskState::Aborted);
    assert!(task.preserved_temp.is_none());
    assert_eq!(queue.get(2).unwrap().state, TaskState::Pending);
    assert_eq!(extractor.calls().len(), 1);
    assert!(list_files(&temp_dir).is_empty(), "task files survived the abort");
    assert!(list_files(&root.path().join("out")).is_empty());
}
