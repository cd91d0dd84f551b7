// Admitting many videos with one cover image

use crate::common::fakes::{FakeEngine, RecordingNotifier, roomy};
use crate::common::{collect_batch, write_cover, write_video};
use coverframe::engine::{
    JobStatus, Pipeline, PresetId, QueueController, ValidationError, Validator, collect_videos,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn queue(engine: Arc<FakeEngine>, notifier: Arc<RecordingNotifier>) -> QueueController {
    let validator = Validator::new(engine.clone(), roomy());
    QueueController::new(validator, Pipeline::new(engine), notifier)
}

#[test]
fn test_batch_keeps_valid_videos_and_reports_the_rest() {
    let dir = TempDir::new().unwrap();
    let image = write_cover(dir.path(), "cover.png");
    let good_a = write_video(dir.path(), "a.mp4");
    let broken = write_video(dir.path(), "b.mp4");
    let good_c = write_video(dir.path(), "c.mp4");
    let missing = dir.path().join("d.mp4");

    let engine = FakeEngine::new();
    engine.set_unreadable(&broken);
    let notifier = Arc::new(RecordingNotifier::default());
    let queue = queue(engine.clone(), notifier.clone());
    let events = queue.subscribe();

    let admission = queue.enqueue_batch(
        vec![good_a.clone(), broken.clone(), good_c.clone(), missing.clone()],
        &image,
        PresetId::TelegramHd,
    );

    assert_eq!(admission.accepted.len(), 2);
    assert_eq!(
        admission.rejected,
        vec![
            (broken.clone(), ValidationError::CorruptedFile(broken)),
            (missing.clone(), ValidationError::FileNotFound(missing)),
        ]
    );

    let (_, summary) = collect_batch(&events);
    let summary = summary.unwrap();
    assert_eq!((summary.success_count, summary.total_processed), (2, 2));
    assert_eq!(notifier.summaries().len(), 1);

    let tasks = queue.list_tasks();
    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, admission.accepted);
    assert!(tasks.iter().all(|t| t.status == JobStatus::Completed));
    assert_eq!(engine.encoded(), vec![good_a, good_c]);
}

#[test]
fn test_batch_with_nothing_valid_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let image = write_cover(dir.path(), "cover.bmp");
    let video = write_video(dir.path(), "a.mp4");

    let notifier = Arc::new(RecordingNotifier::default());
    let queue = queue(FakeEngine::new(), notifier.clone());

    let admission = queue.enqueue_batch(vec![video], &image, PresetId::TelegramSd);
    assert!(admission.accepted.is_empty());
    assert!(matches!(
        admission.rejected[0].1,
        ValidationError::UnsupportedImageFormat(_)
    ));
    assert!(queue.list_tasks().is_empty());
    assert!(!queue.is_processing());
    assert!(notifier.summaries().is_empty());
}

#[test]
fn test_directories_expand_to_sorted_video_files() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("day2");
    fs::create_dir(&nested).unwrap();
    let b = write_video(dir.path(), "b.MOV");
    let a = write_video(dir.path(), "a.mp4");
    let c = write_video(&nested, "c.mkv");
    write_cover(dir.path(), "cover.jpg");
    fs::write(dir.path().join("notes.txt"), b"x").unwrap();
    let loose = dir.path().join("elsewhere.avi");

    let videos = collect_videos(&[dir.path().to_path_buf(), loose.clone()]).unwrap();
    assert_eq!(videos, vec![a, b, c, loose]);
}
