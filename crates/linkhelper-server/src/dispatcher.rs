//! Job dispatcher: a bounded queue between the webhook and the pipeline,
//! drained by one long-running consumer task.
//!
//! The consumer runs up to `workers` jobs at once. Every pipeline run and
//! every delivery is spawned on its own task so a panic inside it is caught
//! as a join error and only costs that one job.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use linkhelper_core::{FormattedReply, ResolutionJob};
use linkhelper_scraper::format::JOB_FAILED_MESSAGE;
use linkhelper_scraper::{format_outcome, Pipeline};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::transport::{deliver, ChatTransport};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("job queue is full")]
    QueueFull,
    #[error("job queue is closed")]
    Closed,
}

/// Producer side of the job queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<ResolutionJob>,
}

/// Everything a job needs besides the job itself.
struct JobContext {
    pipeline: Arc<Pipeline>,
    transport: Arc<dyn ChatTransport>,
}

/// Owns the consumer task. Dropping it without calling
/// [`ConsumerHandle::shutdown`] stops intake; queued jobs still drain.
pub struct ConsumerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    queue: mpsc::Sender<ResolutionJob>,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResolutionJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Creates the queue and spawns its consumer.
    pub fn start(
        pipeline: Arc<Pipeline>,
        transport: Arc<dyn ChatTransport>,
        capacity: usize,
        workers: usize,
    ) -> (Self, ConsumerHandle) {
        let (dispatcher, rx) = Self::channel(capacity);
        let (stop_tx, stop_rx) = oneshot::channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let ctx = Arc::new(JobContext {
            pipeline,
            transport,
        });

        let task = tokio::spawn(consume(
            rx,
            stop_rx,
            ctx,
            workers.max(1),
            Arc::clone(&in_flight),
        ));

        tracing::info!(capacity, workers, "job consumer started");

        let handle = ConsumerHandle {
            stop: Some(stop_tx),
            task,
            queue: dispatcher.tx.clone(),
            in_flight,
        };
        (dispatcher, handle)
    }

    /// Enqueues `job` without waiting.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::QueueFull`] when the queue is at capacity.
    /// - [`DispatchError::Closed`] once the consumer has stopped intake.
    pub fn submit(&self, job: ResolutionJob) -> Result<(), DispatchError> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Closed(_) => DispatchError::Closed,
        })
    }

    #[must_use]
    pub fn capacity_left(&self) -> usize {
        self.tx.capacity()
    }
}

impl ConsumerHandle {
    /// Stops intake, then waits up to `drain` for queued and in-flight jobs.
    /// Whatever is still running after that is aborted.
    pub async fn shutdown(mut self, drain: Duration) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        match tokio::time::timeout(drain, &mut self.task).await {
            Ok(Ok(())) => tracing::info!("job consumer drained"),
            Ok(Err(e)) => tracing::error!(error = %e, "job consumer task failed"),
            Err(_) => {
                let queued = self.queue.max_capacity() - self.queue.capacity();
                let in_flight = self.in_flight.load(Ordering::SeqCst);
                self.task.abort();
                tracing::warn!(
                    queued,
                    in_flight,
                    drain_secs = drain.as_secs(),
                    "drain timeout reached, abandoning remaining jobs"
                );
            }
        }
    }
}

async fn consume(
    mut rx: mpsc::Receiver<ResolutionJob>,
    mut stop: oneshot::Receiver<()>,
    ctx: Arc<JobContext>,
    workers: usize,
    in_flight: Arc<AtomicUsize>,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut jobs = JoinSet::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut stop => break,
            Some(done) = jobs.join_next() => {
                log_join(done);
                continue;
            }
            next = rx.recv() => next,
        };
        let Some(job) = next else { break };
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        spawn_job(&mut jobs, &ctx, job, permit, &in_flight);
    }

    rx.close();
    tracing::info!(queued = rx.len(), in_flight = jobs.len(), "job intake closed, draining");

    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        spawn_job(&mut jobs, &ctx, job, permit, &in_flight);
    }
    while let Some(done) = jobs.join_next().await {
        log_join(done);
    }

    tracing::info!("job consumer stopped");
}

fn spawn_job(
    jobs: &mut JoinSet<()>,
    ctx: &Arc<JobContext>,
    job: ResolutionJob,
    permit: OwnedSemaphorePermit,
    in_flight: &Arc<AtomicUsize>,
) {
    let ctx = Arc::clone(ctx);
    let guard = InFlight::enter(in_flight);
    jobs.spawn(async move {
        let _guard = guard;
        let _permit = permit;
        execute(&ctx, job).await;
    });
}

/// Counts a running job until dropped, including when its task is aborted.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "job task ended abnormally");
    }
}

/// Runs one job end to end: pipeline, formatting, delivery.
///
/// The pipeline plus formatting and the delivery each run on their own task.
/// A panic in either one falls back to [`JOB_FAILED_MESSAGE`].
async fn execute(ctx: &JobContext, job: ResolutionJob) {
    let started = Instant::now();
    let chat_id = job.requester.0;
    let (requester, placeholder) = (job.requester, job.placeholder);

    let pipeline = Arc::clone(&ctx.pipeline);
    let source_url = job.source_url.clone();
    let reply = match tokio::spawn(async move { format_outcome(&pipeline.run(&source_url).await) })
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(
                chat_id,
                url = %job.source_url,
                error = %e,
                "pipeline task failed"
            );
            FormattedReply::plain(JOB_FAILED_MESSAGE)
        }
    };

    let transport = Arc::clone(&ctx.transport);
    let delivery =
        tokio::spawn(async move { deliver(transport.as_ref(), requester, placeholder, &reply).await })
            .await;
    match delivery {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(chat_id, error = %e, "failed to deliver reply"),
        Err(e) => {
            tracing::error!(chat_id, error = %e, "delivery task failed");
            let fallback = FormattedReply::plain(JOB_FAILED_MESSAGE);
            if let Err(e) = deliver(ctx.transport.as_ref(), requester, placeholder, &fallback).await
            {
                tracing::error!(chat_id, error = %e, "failed to deliver failure notice");
            }
        }
    }

    tracing::info!(
        chat_id,
        url = %job.source_url,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "job finished"
    );
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
