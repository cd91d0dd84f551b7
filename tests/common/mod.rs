#![allow(dead_code)] // Each test binary uses its own slice of these helpers

pub mod fakes;

use coverframe::engine::{BatchSummary, QueueEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

/// Minimal JPEG header; enough for signature sniffing
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn write_video(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![0u8; 4096]).unwrap();
    path
}

pub fn write_cover(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, JPEG_BYTES).unwrap();
    path
}

/// Receive events until `pred` accepts one, or give up after `EVENT_TIMEOUT`
pub fn wait_for<F>(events: &Receiver<QueueEvent>, mut pred: F) -> Option<QueueEvent>
where
    F: FnMut(&QueueEvent) -> bool,
{
    let deadline = Instant::now() + EVENT_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Collect every event up to and including the next batch completion
pub fn collect_batch(events: &Receiver<QueueEvent>) -> (Vec<QueueEvent>, Option<BatchSummary>) {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(QueueEvent::BatchCompleted(summary)) => return (seen, Some(summary)),
            Ok(event) => seen.push(event),
            Err(_) => return (seen, None),
        }
    }
}

pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions
    unsafe { libc::geteuid() == 0 }
}
