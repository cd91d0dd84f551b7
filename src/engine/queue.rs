// Sequential job queue: one owner thread holds every job, workers report back by message

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::core::{
    CancelFlag, CoverJob, JobSnapshot, JobStatus, Preset, PresetId, derive_output_path,
};
use crate::engine::disk::SystemSpaceProbe;
use crate::engine::media::MediaEngine;
use crate::engine::notify::{BatchSummary, Notifier};
use crate::engine::pipeline::Pipeline;
use crate::engine::validate::{ValidationError, Validator};

/// Change notifications for observers of the queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// A job was added or changed state/progress
    JobUpdated(JobSnapshot),
    /// A pending job was removed by the user
    JobRemoved(Uuid),
    /// The pending set ran dry; fires once per drain cycle
    BatchCompleted(BatchSummary),
}

/// Message from worker to queue owner
#[derive(Debug)]
enum WorkerMessage {
    Progress {
        job_id: Uuid,
        fraction: f64,
        eta: Option<Duration>,
    },
    Completed {
        job_id: Uuid,
        output_path: PathBuf,
    },
    Failed {
        job_id: Uuid,
        error: String,
    },
}

enum Request {
    Add(Vec<CoverJob>),
    Remove { id: Uuid, reply: Sender<bool> },
    List { reply: Sender<Vec<JobSnapshot>> },
    IsProcessing { reply: Sender<bool> },
    HasActive { reply: Sender<bool> },
    CancelActive { reply: Sender<bool> },
    Subscribe(Sender<QueueEvent>),
    Worker(WorkerMessage),
    Shutdown,
}

/// Result of admitting several videos with one cover image
#[derive(Debug, Default)]
pub struct BatchAdmission {
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<(PathBuf, ValidationError)>,
}

struct ActiveJob {
    id: Uuid,
    cancel: CancelFlag,
}

/// Sole owner of job state. Runs on its own thread.
struct QueueOwner {
    jobs: Vec<CoverJob>,
    pipeline: Pipeline,
    notifier: Arc<dyn Notifier>,
    subscribers: Vec<Sender<QueueEvent>>,
    tx: Sender<Request>,
    draining: bool,
    active: Option<ActiveJob>,
    cycle: BatchSummary,
}

impl QueueOwner {
    fn run(mut self, rx: Receiver<Request>) {
        while let Ok(request) = rx.recv() {
            match request {
                Request::Add(jobs) => self.add(jobs),
                Request::Remove { id, reply } => {
                    let _ = reply.send(self.remove(id));
                }
                Request::List { reply } => {
                    let _ = reply.send(self.jobs.iter().map(CoverJob::snapshot).collect());
                }
                Request::IsProcessing { reply } => {
                    let _ = reply.send(self.draining);
                }
                Request::HasActive { reply } => {
                    let _ = reply.send(self.jobs.iter().any(|j| j.status.is_active()));
                }
                Request::CancelActive { reply } => {
                    let _ = reply.send(self.cancel_active());
                }
                Request::Subscribe(subscriber) => self.subscribers.push(subscriber),
                Request::Worker(message) => self.handle_worker(message),
                Request::Shutdown => {
                    self.cancel_active();
                    break;
                }
            }
        }
        debug!("queue owner stopped");
    }

    fn publish(&mut self, event: QueueEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn publish_job(&mut self, index: usize) {
        let snapshot = self.jobs[index].snapshot();
        self.publish(QueueEvent::JobUpdated(snapshot));
    }

    fn index_of(&self, id: Uuid) -> Option<usize> {
        self.jobs.iter().position(|j| j.id == id)
    }

    fn add(&mut self, jobs: Vec<CoverJob>) {
        for job in jobs {
            info!(job = %job.id, name = %job.display_name(), "job enqueued");
            self.jobs.push(job);
            self.publish_job(self.jobs.len() - 1);
        }
        self.drain();
    }

    fn remove(&mut self, id: Uuid) -> bool {
        match self.index_of(id) {
            Some(index) if self.jobs[index].status == JobStatus::Pending => {
                self.jobs.remove(index);
                self.publish(QueueEvent::JobRemoved(id));
                true
            }
            _ => false,
        }
    }

    fn cancel_active(&mut self) -> bool {
        match &self.active {
            Some(active) => {
                info!(job = %active.id, "cancelling active job");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Start the next pending job, or close the drain cycle when none remain.
    /// Does nothing while a job is in flight.
    fn drain(&mut self) {
        if self.active.is_some() {
            return;
        }

        let Some(index) = self.jobs.iter().position(|j| j.status == JobStatus::Pending) else {
            if self.draining {
                self.draining = false;
                let summary = std::mem::take(&mut self.cycle);
                self.notifier.notify(summary);
                self.publish(QueueEvent::BatchCompleted(summary));
            }
            return;
        };

        self.draining = true;
        let job = &mut self.jobs[index];
        job.status = JobStatus::Processing;
        job.progress = 0.0;
        job.eta = None;

        let job = job.clone();

        let cancel = CancelFlag::new();
        self.active = Some(ActiveJob {
            id: job.id,
            cancel: cancel.clone(),
        });
        self.spawn_worker(job, cancel);
        self.publish_job(index);
    }

    fn spawn_worker(&self, job: CoverJob, cancel: CancelFlag) {
        let tx = self.tx.clone();
        let pipeline = self.pipeline.clone();

        thread::spawn(move || {
            let job_id = job.id;
            let output_path = derive_output_path(&job.video_path, &job.preset);
            info!(job = %job_id, output = %output_path.display(), "job started");

            let tx_progress = tx.clone();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                pipeline.process(
                    &job.video_path,
                    &job.image_path,
                    &output_path,
                    &job.preset,
                    &cancel,
                    &mut |fraction, eta| {
                        let _ = tx_progress.send(Request::Worker(WorkerMessage::Progress {
                            job_id,
                            fraction,
                            eta,
                        }));
                    },
                )
            }));

            // The owner must always hear back, or the queue never advances
            let message = match result {
                Ok(Ok(output_path)) => WorkerMessage::Completed {
                    job_id,
                    output_path,
                },
                Ok(Err(e)) => WorkerMessage::Failed {
                    job_id,
                    error: e.to_string(),
                },
                Err(payload) => WorkerMessage::Failed {
                    job_id,
                    error: format!("Encoding crashed: {}", panic_message(payload.as_ref())),
                },
            };
            let _ = tx.send(Request::Worker(message));
        });
    }

    fn handle_worker(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Progress {
                job_id,
                fraction,
                eta,
            } => {
                let Some(index) = self.index_of(job_id) else {
                    return;
                };
                let job = &mut self.jobs[index];
                if job.status != JobStatus::Processing {
                    return;
                }
                job.progress = job.progress.max(fraction.clamp(0.0, 1.0));
                job.eta = eta;
                self.publish_job(index);
            }
            WorkerMessage::Completed {
                job_id,
                output_path,
            } => {
                self.finish(job_id, |job| {
                    job.status = JobStatus::Completed;
                    job.progress = 1.0;
                    job.output_path = Some(output_path);
                });
            }
            WorkerMessage::Failed { job_id, error } => {
                self.finish(job_id, |job| {
                    job.status = JobStatus::Failed;
                    job.error_message = Some(error);
                });
            }
        }
    }

    fn finish(&mut self, job_id: Uuid, apply: impl FnOnce(&mut CoverJob)) {
        if self.active.as_ref().is_some_and(|a| a.id == job_id) {
            self.active = None;
        }

        if let Some(index) = self.index_of(job_id) {
            let job = &mut self.jobs[index];
            apply(job);
            job.eta = None;

            self.cycle.total_processed += 1;
            match job.status {
                JobStatus::Completed => {
                    self.cycle.success_count += 1;
                    info!(job = %job_id, "job completed");
                }
                _ => warn!(
                    job = %job_id,
                    error = job.error_message.as_deref().unwrap_or(""),
                    "job failed"
                ),
            }
            self.publish_job(index);
        }

        self.drain();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Front door to the job queue.
///
/// Validation runs on the calling thread; every job mutation happens on the
/// queue's owner thread. Jobs are processed one at a time in insertion order.
pub struct QueueController {
    tx: Sender<Request>,
    validator: Validator,
    owner: Option<JoinHandle<()>>,
}

impl QueueController {
    pub fn new(validator: Validator, pipeline: Pipeline, notifier: Arc<dyn Notifier>) -> Self {
        let (tx, rx) = mpsc::channel();

        let owner = QueueOwner {
            jobs: Vec::new(),
            pipeline,
            notifier,
            subscribers: Vec::new(),
            tx: tx.clone(),
            draining: false,
            active: None,
            cycle: BatchSummary::default(),
        };
        let handle = thread::spawn(move || owner.run(rx));

        Self {
            tx,
            validator,
            owner: Some(handle),
        }
    }

    /// Queue over a media engine, checking free space on the real filesystem
    pub fn with_engine(engine: Arc<dyn MediaEngine>, notifier: Arc<dyn Notifier>) -> Self {
        let validator = Validator::new(engine.clone(), Arc::new(SystemSpaceProbe));
        Self::new(validator, Pipeline::new(engine), notifier)
    }

    fn ask<T: Default>(&self, make: impl FnOnce(Sender<T>) -> Request) -> T {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self.tx.send(make(reply_tx)).is_err() {
            return T::default();
        }
        reply_rx.recv().unwrap_or_default()
    }

    /// Validate and append a job. Rejected inputs never enter the queue.
    pub fn enqueue(
        &self,
        video_path: impl Into<PathBuf>,
        image_path: impl Into<PathBuf>,
        preset: PresetId,
    ) -> Result<Uuid, ValidationError> {
        let video_path = video_path.into();
        let image_path = image_path.into();
        let preset = preset.resolve();

        self.validator.validate(&video_path, &image_path, &preset)?;

        let job = CoverJob::new(video_path, image_path, preset);
        let id = job.id;
        if self.tx.send(Request::Add(vec![job])).is_err() {
            warn!(job = %id, "queue is shut down; job dropped");
        }
        Ok(id)
    }

    /// Validate each video against the shared cover image; valid ones are
    /// appended together, in input order.
    pub fn enqueue_batch(
        &self,
        videos: impl IntoIterator<Item = PathBuf>,
        image_path: &Path,
        preset: PresetId,
    ) -> BatchAdmission {
        let preset: Preset = preset.resolve();
        let mut admission = BatchAdmission::default();
        let mut jobs = Vec::new();

        for video in videos {
            match self.validator.validate(&video, image_path, &preset) {
                Ok(()) => {
                    let job = CoverJob::new(video, image_path.to_path_buf(), preset);
                    admission.accepted.push(job.id);
                    jobs.push(job);
                }
                Err(e) => {
                    debug!(video = %video.display(), "rejected: {}", e);
                    admission.rejected.push((video, e));
                }
            }
        }

        if !jobs.is_empty() && self.tx.send(Request::Add(jobs)).is_err() {
            warn!(
                dropped = admission.accepted.len(),
                "queue is shut down; batch dropped"
            );
            admission.accepted.clear();
        }
        admission
    }

    /// Remove a pending job. Returns false (and changes nothing) for any other status.
    pub fn remove_task(&self, id: Uuid) -> bool {
        self.ask(|reply| Request::Remove { id, reply })
    }

    /// Snapshots of every job in insertion order
    pub fn list_tasks(&self) -> Vec<JobSnapshot> {
        self.ask(|reply| Request::List { reply })
    }

    /// True while a drain cycle is running
    pub fn is_processing(&self) -> bool {
        self.ask(|reply| Request::IsProcessing { reply })
    }

    /// True if any job is pending or processing
    pub fn has_active_tasks(&self) -> bool {
        self.ask(|reply| Request::HasActive { reply })
    }

    /// Ask the in-flight encode to stop; it ends as a failed job
    pub fn cancel_active(&self) -> bool {
        self.ask(|reply| Request::CancelActive { reply })
    }

    /// Receive every subsequent queue event
    pub fn subscribe(&self) -> Receiver<QueueEvent> {
        let (tx, rx) = mpsc::channel();
        let _ = self.tx.send(Request::Subscribe(tx));
        rx
    }

    /// Cancel any active encode and stop the owner thread
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.owner.take() {
            let _ = self.tx.send(Request::Shutdown);
            if handle.join().is_err() {
                warn!("queue owner thread panicked");
            }
        }
    }
}

impl Drop for QueueController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
