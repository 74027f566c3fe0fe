use super::job::{Job, JobName, JobOutput};
use crate::compute::{compute_correlations, compute_motion_deltas, CorrelationMatrix};
use crate::config::EngineConfig;
use crate::core::{ElementType, FeatureData, FeatureRecord, TrackMap};
use crate::error::{PipelineError, Result};
use crate::loader::FormatLoader;
use crate::observability::MetricsCollector;
use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

/// A job on its way to a worker.
///
/// The permit is the worker slot reserved for it; it is released once the
/// worker has finished the job.
struct Dispatch {
    job: Job,
    reply: oneshot::Sender<Result<JobOutput>>,
    permit: OwnedSemaphorePermit,
    accepted_at: Instant,
}

/// Handle to an accepted job; resolves when a worker has produced the output
pub struct JobTicket {
    name: JobName,
    reply: oneshot::Receiver<Result<JobOutput>>,
}

impl JobTicket {
    pub fn name(&self) -> JobName {
        self.name
    }

    pub async fn await_result(self) -> Result<JobOutput> {
        // A reply sender dropped unanswered means the worker went away
        self.reply.await.map_err(|_| PipelineError::Terminated)?
    }
}

/// Fixed pool of background worker threads shared by every job kind.
///
/// Jobs complete in any order; callers needing "latest wins" layer a
/// `RequestArbiter` on top.
pub struct ComputeChannel {
    queue: Mutex<Option<Sender<Dispatch>>>,
    semaphore: Arc<Semaphore>,
    terminated: Arc<AtomicBool>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    worker_count: usize,
    metrics: MetricsCollector,
}

impl ComputeChannel {
    pub fn new(config: &EngineConfig, loader: Arc<FormatLoader>) -> anyhow::Result<Self> {
        config.validate()?;
        let worker_count = config.worker_count;
        let (sender, receiver) = unbounded::<Dispatch>();
        let terminated = Arc::new(AtomicBool::new(false));
        let metrics = MetricsCollector::for_jobs();

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let loader = Arc::clone(&loader);
            let terminated = Arc::clone(&terminated);
            let metrics = metrics.clone();

            let handle = thread::Builder::new()
                .name(format!("compute-worker-{}", index))
                .spawn(move || worker_loop(receiver, loader, terminated, metrics))
                .context(format!("Failed to spawn compute worker {}", index))?;
            workers.push(handle);
        }
        info!("compute channel started with {} workers", worker_count);

        Ok(Self {
            queue: Mutex::new(Some(sender)),
            semaphore: Arc::new(Semaphore::new(worker_count)),
            terminated,
            workers: Mutex::new(workers),
            worker_count,
            metrics,
        })
    }

    /// Hand a job to the pool.
    ///
    /// Waits only until a worker slot is free; the returned ticket resolves
    /// with the output.
    pub async fn submit(&self, job: Job) -> Result<JobTicket> {
        if self.is_terminated() {
            return Err(PipelineError::Terminated);
        }

        // Fails at once when the semaphore is closed by terminate()
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::Terminated)?;

        let name = job.name();
        let (reply, receiver) = oneshot::channel();
        let dispatch = Dispatch {
            job,
            reply,
            permit,
            accepted_at: Instant::now(),
        };

        {
            let queue = self.queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let sender = queue.as_ref().ok_or(PipelineError::Terminated)?;
            sender.send(dispatch).map_err(|_| PipelineError::Terminated)?;
        }

        self.metrics.job(name).record_dispatched();
        debug!("dispatched {} job", name);
        Ok(JobTicket {
            name,
            reply: receiver,
        })
    }

    /// Submit and wait for the output
    pub async fn run(&self, job: Job) -> Result<JobOutput> {
        self.submit(job).await?.await_result().await
    }

    pub async fn load_url(&self, url: &str, element_type: ElementType) -> Result<FeatureRecord> {
        let job = Job::LoadUrl {
            url: url.to_string(),
            element_type,
        };
        match self.run(job).await? {
            JobOutput::Feature(record) => Ok(record),
            other => Err(unexpected_output(JobName::LoadUrl, other)),
        }
    }

    pub async fn get_correlations(
        &self,
        features: Vec<FeatureData>,
        mask: Option<Arc<Vec<bool>>>,
    ) -> Result<CorrelationMatrix> {
        match self.run(Job::GetCorrelations { features, mask }).await? {
            JobOutput::Correlations(matrix) => Ok(matrix),
            other => Err(unexpected_output(JobName::GetCorrelations, other)),
        }
    }

    pub async fn get_motion_deltas(
        &self,
        tracks: Arc<TrackMap>,
        num_objects: usize,
        window_frames: u32,
        mask: Option<Arc<Vec<bool>>>,
    ) -> Result<Option<Vec<f32>>> {
        let job = Job::GetMotionDeltas {
            tracks,
            num_objects,
            window_frames,
            mask,
        };
        match self.run(job).await? {
            JobOutput::MotionDeltas(deltas) => Ok(deltas),
            other => Err(unexpected_output(JobName::GetMotionDeltas, other)),
        }
    }

    /// Stop accepting jobs and release the workers.
    ///
    /// Queued jobs that have not started are answered with `Terminated`;
    /// jobs already running are not waited for.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.semaphore.close();
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let workers = std::mem::take(
            &mut *self.workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        info!("compute channel terminated, releasing {} workers", workers.len());
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Worker slots not currently reserved by a job
    pub fn available_units(&self) -> usize {
        if self.is_terminated() {
            0
        } else {
            self.semaphore.available_permits()
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

impl Drop for ComputeChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn worker_loop(
    queue: Receiver<Dispatch>,
    loader: Arc<FormatLoader>,
    terminated: Arc<AtomicBool>,
    metrics: MetricsCollector,
) {
    while let Ok(dispatch) = queue.recv() {
        let Dispatch {
            job,
            reply,
            permit,
            accepted_at,
        } = dispatch;
        let name = job.name();

        if terminated.load(Ordering::Acquire) {
            drop(permit);
            let _ = reply.send(Err(PipelineError::Terminated));
            continue;
        }

        let job_metrics = metrics.job(name);
        let start = job_metrics.start_processing();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(&loader, job)))
            .unwrap_or_else(|payload| {
                Err(PipelineError::JobPanicked {
                    job: name,
                    message: panic_message(payload.as_ref()),
                })
            });
        job_metrics.finish_processing(start);

        match &outcome {
            Ok(_) => {
                job_metrics.record_completed();
                debug!(
                    "{} job finished {:?} after acceptance",
                    name,
                    accepted_at.elapsed()
                );
            }
            Err(e) => {
                job_metrics.record_error();
                warn!("{} job failed: {}", name, e);
            }
        }

        drop(permit);
        if reply.send(outcome).is_err() {
            debug!("caller stopped waiting for {} job", name);
        }
    }
}

fn execute(loader: &FormatLoader, job: Job) -> Result<JobOutput> {
    match job {
        Job::LoadUrl { url, element_type } => loader
            .load_blocking(&url, element_type)
            .map(JobOutput::Feature),
        Job::GetCorrelations { features, mask } => {
            let features: Vec<&FeatureData> = features.iter().collect();
            compute_correlations(&features, mask.as_deref().map(Vec::as_slice))
                .map(JobOutput::Correlations)
        }
        Job::GetMotionDeltas {
            tracks,
            num_objects,
            window_frames,
            mask,
        } => compute_motion_deltas(
            &tracks,
            num_objects,
            window_frames,
            mask.as_deref().map(Vec::as_slice),
        )
        .map(JobOutput::MotionDeltas),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn unexpected_output(expected: JobName, output: JobOutput) -> PipelineError {
    PipelineError::JobPanicked {
        job: expected,
        message: format!("worker returned {} output", output.name()),
    }
}
