//! Background consumer worker.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{error, info};

use searchsync_broker::ChannelError;
use searchsync_index::SearchIndex;

use crate::dispatcher::Dispatcher;

/// Handle to stop and join a running worker.
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to exit.
    ///
    /// The loop checks the signal only between deliveries, so an in-flight
    /// message finishes its ack/nack before the thread stops.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Dedicated consumer thread driving a [`Dispatcher`] until shut down or
/// the bus closes.
pub struct Worker;

impl Worker {
    /// Spawn a named consumer thread.
    ///
    /// `tick` bounds how long the loop blocks waiting for a delivery before
    /// it re-checks the shutdown signal.
    pub fn spawn<I>(name: &'static str, dispatcher: Dispatcher<I>, tick: Duration) -> WorkerHandle
    where
        I: SearchIndex + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, dispatcher, shutdown_rx, tick))
            .expect("failed to spawn consumer worker thread");
        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop<I: SearchIndex>(
    name: &'static str,
    dispatcher: Dispatcher<I>,
    shutdown_rx: mpsc::Receiver<()>,
    tick: Duration,
) {
    info!(worker = name, "consumer worker started");
    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }
        match dispatcher.process_next(tick) {
            Ok(_) => {}
            Err(ChannelError::Closed) => {
                info!(worker = name, "bus closed; stopping");
                break;
            }
            Err(err) => {
                error!(worker = name, error = %err, "bus failure; stopping");
                break;
            }
        }
    }
    info!(worker = name, "consumer worker stopped");
}
