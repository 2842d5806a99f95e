//! Background thread for BVH construction.
//!
//! `BvhBuilderThread` owns one worker thread. Geometry buffers move into the
//! worker with the request and the finished [`Bvh`] moves back with the
//! result, so nothing is shared between the two sides. Only one job may be in
//! flight at a time; requesting a second one is an error.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{Bvh, BvhGeometry, BvhOptions, SpatialError};

/// Message sent to the builder thread.
enum ThreadMessage {
    /// Build a BVH over the geometry
    Build(BvhGeometry, BvhOptions),
    /// Shutdown the thread
    Shutdown,
}

/// Manages a background thread that builds BVHs.
pub struct BvhBuilderThread {
    /// Sender for requests to the background thread
    request_tx: Sender<ThreadMessage>,
    /// Receiver for finished trees
    result_rx: Receiver<Bvh>,
    /// Handle to the background thread (for joining on drop)
    thread_handle: Option<JoinHandle<()>>,
    /// Whether a job has been sent and not yet collected
    running: bool,
    disposed: bool,
}

impl BvhBuilderThread {
    /// Spawn a new builder thread.
    pub fn spawn() -> Result<Self, SpatialError> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (result_tx, result_rx) = mpsc::channel::<Bvh>();

        let thread_handle = thread::Builder::new()
            .name("bvh-builder".to_string())
            .spawn(move || {
                log::info!("BVH builder thread started");
                Self::thread_loop(request_rx, result_tx);
                log::info!("BVH builder thread exiting");
            })
            .map_err(|e| SpatialError::WorkerFailed(format!("Failed to spawn builder thread: {}", e)))?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            running: false,
            disposed: false,
        })
    }

    /// Background thread main loop.
    fn thread_loop(request_rx: Receiver<ThreadMessage>, result_tx: Sender<Bvh>) {
        loop {
            match request_rx.recv() {
                Ok(ThreadMessage::Build(geometry, options)) => {
                    let primitives = geometry.primitive_count();
                    let start = web_time::Instant::now();
                    let bvh = Bvh::build(geometry, &options);
                    log::debug!(
                        "Built BVH over {} primitives in {:?}",
                        primitives,
                        start.elapsed()
                    );
                    if result_tx.send(bvh).is_err() {
                        log::warn!("Result channel closed, builder thread exiting");
                        break;
                    }
                }
                Ok(ThreadMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    break;
                }
                Err(_) => {
                    log::debug!("Request channel closed, builder thread exiting");
                    break;
                }
            }
        }
    }

    /// Hand geometry to the worker. Fails if a job is already running.
    pub fn request_build(&mut self, geometry: BvhGeometry, options: BvhOptions) -> Result<(), SpatialError> {
        if self.disposed {
            return Err(SpatialError::BuilderDisposed);
        }
        if self.running {
            return Err(SpatialError::BuilderBusy);
        }
        self.request_tx
            .send(ThreadMessage::Build(geometry, options))
            .map_err(|_| SpatialError::WorkerFailed("request channel closed".to_string()))?;
        self.running = true;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Take the finished tree, if there is one. Non-blocking.
    pub fn take_result(&mut self) -> Option<Result<Bvh, SpatialError>> {
        if !self.running {
            return None;
        }
        match self.result_rx.try_recv() {
            Ok(bvh) => {
                self.running = false;
                Some(Ok(bvh))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.running = false;
                Some(Err(SpatialError::WorkerFailed("builder thread disconnected".to_string())))
            }
        }
    }

    /// Wait up to `timeout` for the finished tree.
    pub fn wait_result(&mut self, timeout: Duration) -> Option<Result<Bvh, SpatialError>> {
        if !self.running {
            return None;
        }
        match self.result_rx.recv_timeout(timeout) {
            Ok(bvh) => {
                self.running = false;
                Some(Ok(bvh))
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.running = false;
                Some(Err(SpatialError::WorkerFailed("builder thread disconnected".to_string())))
            }
        }
    }

    /// Stop the worker without waiting for a running build.
    ///
    /// The thread exits on its own once the current job is done and its
    /// result is discarded. Further build requests fail.
    pub fn detach(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.running = false;
        log::debug!("Detaching BVH builder thread");
        let _ = self.request_tx.send(ThreadMessage::Shutdown);
        self.thread_handle = None;
    }

    /// Stop the worker and join it. Further build requests fail.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.running = false;
        log::debug!("Shutting down BVH builder thread");
        let _ = self.request_tx.send(ThreadMessage::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                log::warn!("BVH builder thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for BvhBuilderThread {
    fn drop(&mut self) {
        self.dispose();
    }
}
