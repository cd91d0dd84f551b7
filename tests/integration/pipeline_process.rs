// Pipeline: planning, progress reporting and outcome mapping

use crate::common::fakes::{FakeEngine, audio_track, clip, video_track};
use crate::common::{write_cover, write_video};
use coverframe::engine::{
    CancelFlag, EncodeError, ImageKind, MediaInfo, Pipeline, Preset, PresetId, Track, TrackKind,
    derive_output_path,
};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn run(
    pipeline: &Pipeline,
    video: &std::path::Path,
    image: &std::path::Path,
    preset: PresetId,
) -> (Result<std::path::PathBuf, EncodeError>, Vec<(f64, Option<Duration>)>) {
    let preset = Preset::get(preset);
    let output = derive_output_path(video, &preset);
    let mut reports = Vec::new();
    let result = pipeline.process(
        video,
        image,
        &output,
        &preset,
        &CancelFlag::new(),
        &mut |fraction, eta| reports.push((fraction, eta)),
    );
    (result, reports)
}

#[test]
fn test_successful_run_writes_output_and_ends_at_one() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "talk.mov");
    let image = write_cover(dir.path(), "cover.jpg");

    let engine = FakeEngine::new();
    engine.set_steps(&[0.25, 0.1, 0.6]);
    let pipeline = Pipeline::new(engine.clone()).with_progress_interval(Duration::ZERO);

    let (result, reports) = run(&pipeline, &video, &image, PresetId::TelegramHd);
    let output = result.unwrap();
    assert_eq!(output, dir.path().join("talk_telegram_hd.mp4"));
    assert!(output.exists());

    let fractions: Vec<f64> = reports.iter().map(|r| r.0).collect();
    assert_eq!(fractions, vec![0.25, 0.25, 0.6, 1.0]);
    assert_eq!(reports.last(), Some(&(1.0, Some(Duration::ZERO))));
}

#[test]
fn test_plan_offsets_by_one_frame_and_keeps_audio() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "talk.mov");
    let image = write_cover(dir.path(), "cover.jpg");

    let engine = FakeEngine::new();
    engine.set_probe(&video, clip(60.0));
    let pipeline = Pipeline::new(engine.clone());

    run(&pipeline, &video, &image, PresetId::TelegramSd).0.unwrap();

    let plans = engine.plans();
    assert_eq!(plans.len(), 1);
    let plan = &plans[0];
    assert_eq!(plan.image_kind, ImageKind::Jpeg);
    assert_eq!(plan.frame_rate, 25.0);
    assert!((plan.lead_in_s() - 0.04).abs() < 1e-9);
    assert!((plan.total_duration_s().unwrap() - 60.04).abs() < 1e-9);
    assert!(plan.include_audio);
    assert_eq!(plan.target.max_resolution, Some((1280, 720)));
    assert_eq!(plan.target.video_bitrate_bps, Some(2_000_000));
    assert_eq!(plan.target.container, "mp4");
}

#[test]
fn test_video_without_audio_or_frame_rate() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "silent.mp4");
    let image = write_cover(dir.path(), "cover.jpg");

    let engine = FakeEngine::new();
    engine.set_probe(
        &video,
        MediaInfo {
            tracks: vec![video_track()],
            frame_rate: None,
            ..clip(5.0)
        },
    );
    let pipeline = Pipeline::new(engine.clone());

    run(&pipeline, &video, &image, PresetId::Original).0.unwrap();

    let plan = &engine.plans()[0];
    assert!(!plan.include_audio);
    assert_eq!(plan.frame_rate, 30.0);
    assert_eq!(plan.target.video_bitrate_bps, None);
    assert_eq!(plan.target.max_resolution, None);
}

#[test]
fn test_cover_art_track_is_not_a_video_track() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "song.m4a.mp4");
    let image = write_cover(dir.path(), "cover.jpg");

    let engine = FakeEngine::new();
    engine.set_probe(
        &video,
        MediaInfo {
            tracks: vec![
                audio_track(),
                Track {
                    kind: TrackKind::Video,
                    codec: Some("mjpeg".to_string()),
                    attached_pic: true,
                },
            ],
            ..clip(200.0)
        },
    );
    let pipeline = Pipeline::new(engine.clone());

    let (result, reports) = run(&pipeline, &video, &image, PresetId::TelegramHd);
    assert!(matches!(result, Err(EncodeError::NoVideoTrack(path)) if path == video));
    assert!(reports.is_empty());
    assert!(engine.encoded().is_empty());
}

#[test]
fn test_probe_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "broken.mp4");
    let image = write_cover(dir.path(), "cover.jpg");

    let engine = FakeEngine::new();
    engine.set_unreadable(&video);
    let pipeline = Pipeline::new(engine);

    let (result, _) = run(&pipeline, &video, &image, PresetId::TelegramHd);
    assert!(matches!(result, Err(EncodeError::Probe { .. })));
}

#[test]
fn test_unrecognised_image_is_rejected() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "talk.mov");
    let image = dir.path().join("notes.txt");
    fs::write(&image, b"not an image").unwrap();

    let pipeline = Pipeline::new(FakeEngine::new());
    let (result, _) = run(&pipeline, &video, &image, PresetId::TelegramHd);
    assert!(matches!(result, Err(EncodeError::UnsupportedImage(_))));
}

#[test]
fn test_vanished_input_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("gone.mov");
    let image = write_cover(dir.path(), "cover.jpg");

    let pipeline = Pipeline::new(FakeEngine::new());
    let (result, _) = run(&pipeline, &video, &image, PresetId::TelegramHd);
    assert!(matches!(result, Err(EncodeError::InputUnavailable { .. })));
}

#[test]
fn test_encoder_failure_surfaces_reason() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "talk.mov");
    let image = write_cover(dir.path(), "cover.jpg");

    let engine = FakeEngine::new();
    engine.fail_encode(&video);
    let pipeline = Pipeline::new(engine);

    let (result, reports) = run(&pipeline, &video, &image, PresetId::TelegramHd);
    match result {
        Err(EncodeError::Failed(reason)) => assert_eq!(reason, "encoder exploded"),
        other => panic!("expected encoder failure, got {:?}", other),
    }
    assert!(reports.iter().all(|r| r.0 < 1.0));
    assert!(!dir.path().join("talk_telegram_hd.mp4").exists());
}

#[test]
fn test_cancelled_encode_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "talk.mov");
    let image = write_cover(dir.path(), "cover.jpg");

    let engine = FakeEngine::new();
    let _gate = engine.hold();
    let pipeline = Pipeline::new(engine);
    let preset = Preset::get(PresetId::TelegramHd);
    let output = derive_output_path(&video, &preset);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = pipeline.process(&video, &image, &output, &preset, &cancel, &mut |_, _| {});
    assert!(matches!(result, Err(EncodeError::Cancelled)));
    assert!(!output.exists());
}

#[test]
fn test_stale_output_is_replaced() {
    let dir = TempDir::new().unwrap();
    let video = write_video(dir.path(), "talk.mov");
    let image = write_cover(dir.path(), "cover.jpg");
    let stale = dir.path().join("talk_telegram_hd.mp4");
    fs::write(&stale, b"stale").unwrap();

    let pipeline = Pipeline::new(FakeEngine::new());
    let (result, _) = run(&pipeline, &video, &image, PresetId::TelegramHd);
    assert_eq!(result.unwrap(), stale);
    assert_eq!(fs::read(&stale).unwrap(), b"encoded");
}
