//! Debounced batching of inbound frames.
//!
//! Raw frames are accumulated as they arrive and flushed as one batch per
//! interval. Batch flushes are the socket's liveness signal: every flush
//! acks the health monitor before the batch is decoded.

use log::trace;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type BatchCallback<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture + Send + Sync>;

pub struct BatchProcessor<T> {
    interval: Duration,
    buffer: Arc<std::sync::Mutex<Vec<T>>>,
    on_batch: std::sync::Mutex<Option<BatchCallback<T>>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> BatchProcessor<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
            on_batch: std::sync::Mutex::new(None),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Sets the flush callback. Each flush receives every message buffered
    /// since the previous one, in arrival order.
    pub fn on_batch<F, Fut>(&self, callback: F)
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: BatchCallback<T> = Arc::new(move |batch| Box::pin(callback(batch)) as BoxFuture);
        *self.on_batch.lock().unwrap() = Some(callback);
    }

    /// Queues a message for the next flush.
    pub fn on_message(&self, message: T) {
        self.buffer.lock().unwrap().push(message);
    }

    /// Starts the flush loop. A previous loop, if any, is stopped first.
    pub fn start(self: &Arc<Self>) {
        self.stop();

        let processor = self.clone();
        let handle = tokio::task::spawn(async move {
            loop {
                tokio::time::sleep(processor.interval).await;

                let batch: Vec<T> = std::mem::take(&mut *processor.buffer.lock().unwrap());
                if batch.is_empty() {
                    continue;
                }
                trace!(target: "Socket/Batch", "Flushing batch of {} messages", batch.len());
                let callback = processor.on_batch.lock().unwrap().clone();
                if let Some(callback) = callback {
                    callback(batch).await;
                }
            }
        });
        *self.task.lock().unwrap() = Some(handle);
    }

    /// Stops the flush loop and discards anything still buffered. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
        self.buffer.lock().unwrap().clear();
    }
}

impl<T> Drop for BatchProcessor<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn flushes_buffered_messages_in_arrival_order() {
        let processor = Arc::new(BatchProcessor::new(Duration::from_millis(20)));
        let batches: Arc<Mutex<Vec<Vec<u32>>>> = Arc::new(Mutex::new(Vec::new()));

        let batches_clone = batches.clone();
        processor.on_batch(move |batch| {
            let batches = batches_clone.clone();
            async move {
                batches.lock().unwrap().push(batch);
            }
        });

        processor.start();
        processor.on_message(1);
        processor.on_message(2);
        processor.on_message(3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        processor.stop();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.first(), Some(&vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn empty_ticks_do_not_fire_the_callback() {
        let processor = Arc::new(BatchProcessor::<u32>::new(Duration::from_millis(10)));
        let flushes = Arc::new(Mutex::new(0u32));

        let flushes_clone = flushes.clone();
        processor.on_batch(move |_| {
            let flushes = flushes_clone.clone();
            async move {
                *flushes.lock().unwrap() += 1;
            }
        });

        processor.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        processor.stop();

        assert_eq!(*flushes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn stop_discards_pending_messages() {
        let processor = Arc::new(BatchProcessor::new(Duration::from_secs(60)));
        processor.on_batch(|_batch: Vec<u32>| async {});
        processor.start();
        processor.on_message(9);
        processor.stop();
        assert!(processor.buffer.lock().unwrap().is_empty());
    }
}
