//! Background Tasks
//!
//! Fixed-interval maintenance work (tiered promotion, WAL sync) runs on a
//! dedicated thread owned by the component that started it. The task stops
//! when `stop()` is called or the handle is dropped.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};

use crate::error::Result;

/// Handle to a periodic background thread
pub struct BackgroundTask {
    name: String,
    shutdown: Option<Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Spawn a thread that calls `tick` every `interval` until stopped.
    ///
    /// Errors returned by `tick` are logged and the task keeps running.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);
        let task_name = name.to_string();

        let join_handle = thread::Builder::new()
            .name(task_name.clone())
            .spawn(move || loop {
                crossbeam::select! {
                    recv(shutdown_rx) -> _ => {
                        tracing::debug!("Background task {} stopping", task_name);
                        return;
                    }
                    recv(ticker) -> _ => {
                        if let Err(e) = tick() {
                            tracing::warn!("Background task {} failed: {}", task_name, e);
                        }
                    }
                }
            })?;

        Ok(Self {
            name: name.to_string(),
            shutdown: Some(shutdown_tx),
            join_handle: Some(join_handle),
        })
    }

    /// Name given to the task thread
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the task and wait for its thread to exit
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the select
        self.shutdown.take();
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                tracing::error!("Background task {} panicked", self.name);
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.stop();
    }
}
