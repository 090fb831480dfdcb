use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Bounded-concurrency worker pool backing one thundering-herd burst.
///
/// `size` worker tasks pull jobs from a shared queue. The queue itself is
/// unbounded; the burst generator throttles on [`HerdPool::waiting`] so it
/// never grows past roughly one submission beyond the drain rate.
pub(crate) struct HerdPool {
    tx: Option<mpsc::UnboundedSender<Job>>,
    waiting: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
}

impl HerdPool {
    pub(crate) fn new(size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let waiting = Arc::new(AtomicUsize::new(0));

        let workers = (0..size.max(1))
            .map(|_| {
                let rx = Arc::clone(&rx);
                let waiting = Arc::clone(&waiting);
                tokio::spawn(async move {
                    loop {
                        let job = {
                            let mut receiver = rx.lock().await;
                            receiver.recv().await
                        };
                        let Some(job) = job else { break };
                        waiting.fetch_sub(1, Ordering::SeqCst);
                        job.await;
                    }
                })
            })
            .collect();

        Self {
            tx: Some(tx),
            waiting,
            workers,
        }
    }

    /// Queues one job. Submissions after [`HerdPool::drain`] are dropped.
    pub(crate) fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let Some(tx) = self.tx.as_ref() else {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            return;
        };
        if tx.send(Box::pin(job)).is_err() {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Jobs queued but not yet picked up by a worker.
    pub(crate) fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Closes the queue and waits for every already-submitted job to
    /// finish. Nothing in flight is abandoned or dropped.
    pub(crate) async fn drain(&mut self) {
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            if handle.await.is_err() {
                warn!("herd worker terminated abnormally");
            }
        }
    }
}
