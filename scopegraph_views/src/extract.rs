// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Background mesh extraction.
//!
//! An [`ExtractionPool`] runs a fixed number of worker threads fed from a
//! channel. Finished meshes are offered to a [`MeshCache`] shared with the
//! draw path. The cache never trades a mesh for one with fewer vertices, so a
//! late low-resolution result cannot overwrite a finer one.
//!
//! Dispatch never waits on the pool. Views poll [`ExtractionPool::take_fresh`]
//! when drawing, and keep requesting frames while work is pending.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::error::ViewError;
use crate::mesh::Mesh;

/// Produces the mesh of one segment.
///
/// Called on worker threads, several at a time.
pub trait MeshExtractor: Send + Sync + 'static {
    /// Extract the surface of segment `id`, or `None` if it has none.
    fn extract(&self, id: u64) -> Option<Mesh>;
}

impl<F> MeshExtractor for F
where
    F: Fn(u64) -> Option<Mesh> + Send + Sync + 'static,
{
    fn extract(&self, id: u64) -> Option<Mesh> {
        self(id)
    }
}

/// What hiding a segment does to extractions already submitted for it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HidePolicy {
    /// In-flight and queued extractions still run and land in the cache.
    /// Hidden segments are simply not drawn.
    #[default]
    AllowStaleCompletion,
    /// Hiding invalidates everything submitted for the segment so far:
    /// queued jobs are skipped and in-flight results are discarded.
    Cancel,
}

/// Configuration of an [`ExtractionPool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Maximum number of concurrent extractions.
    pub workers: usize,
    /// Behavior of hide requests.
    pub hide_policy: HidePolicy,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(2, |n| n.get()),
            hide_policy: HidePolicy::default(),
        }
    }
}

impl ExtractionOptions {
    /// Run at most `workers` extractions at once.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the hide policy.
    pub fn with_hide_policy(mut self, policy: HidePolicy) -> Self {
        self.hide_policy = policy;
        self
    }
}

/// Meshes by segment id, with the vertex-count replacement policy.
#[derive(Debug, Default)]
pub struct MeshCache {
    meshes: HashMap<u64, Arc<Mesh>>,
    fresh: bool,
}

impl MeshCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `mesh` for `id` unless the cached one has more vertices.
    ///
    /// Returns whether the mesh was stored.
    pub fn offer(&mut self, id: u64, mesh: Arc<Mesh>) -> bool {
        if let Some(existing) = self.meshes.get(&id)
            && mesh.num_vertices() < existing.num_vertices()
        {
            trace!(
                id,
                offered = mesh.num_vertices(),
                cached = existing.num_vertices(),
                "keeping finer cached mesh"
            );
            return false;
        }
        self.meshes.insert(id, mesh);
        self.fresh = true;
        true
    }

    /// Drop the mesh of `id`.
    pub fn remove(&mut self, id: u64) -> Option<Arc<Mesh>> {
        let removed = self.meshes.remove(&id);
        self.fresh |= removed.is_some();
        removed
    }

    /// The mesh of `id`.
    pub fn get(&self, id: u64) -> Option<Arc<Mesh>> {
        self.meshes.get(&id).cloned()
    }

    /// Number of cached meshes.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Whether the cache changed since the last call.
    pub fn take_fresh(&mut self) -> bool {
        core::mem::take(&mut self.fresh)
    }
}

#[derive(Debug)]
struct Job {
    id: u64,
    epoch: u64,
}

#[derive(Debug, Default)]
struct Book {
    cache: MeshCache,
    // Bumped by hide under `HidePolicy::Cancel`.
    epochs: HashMap<u64, u64>,
    pending: usize,
}

impl Book {
    fn epoch(&self, id: u64) -> u64 {
        self.epochs.get(&id).copied().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Shared {
    book: Mutex<Book>,
    drained: Condvar,
    active: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl Shared {
    fn finish(&self, job: &Job, mesh: Option<Mesh>, policy: HidePolicy) {
        let mut book = self.book.lock();
        let stale = policy == HidePolicy::Cancel && book.epoch(job.id) != job.epoch;
        match mesh {
            Some(_) if stale => debug!(id = job.id, "discarding extraction of hidden segment"),
            Some(mesh) => {
                book.cache.offer(job.id, Arc::new(mesh));
            }
            None => trace!(id = job.id, "segment has no surface"),
        }
        book.pending -= 1;
        if book.pending == 0 {
            self.drained.notify_all();
        }
    }
}

/// A bounded pool of extraction workers.
///
/// ```
/// use scopegraph_views::{ExtractionOptions, ExtractionPool, Mesh};
/// use vek::{Aabb, Vec3};
///
/// let pool = ExtractionPool::new(
///     ExtractionOptions::default().with_workers(2),
///     |id: u64| {
///         let size = id as f64;
///         Some(Mesh::cuboid(Aabb { min: Vec3::zero(), max: Vec3::broadcast(size) }))
///     },
/// )
/// .unwrap();
/// for id in 1..=4 {
///     pool.submit(id);
/// }
/// pool.drain();
/// assert_eq!(pool.completed(), 4);
/// assert!(pool.mesh(3).is_some());
/// ```
pub struct ExtractionPool {
    send_job: Option<Sender<Job>>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    options: ExtractionOptions,
}

impl core::fmt::Debug for ExtractionPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtractionPool")
            .field("options", &self.options)
            .field("pending", &self.pending())
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}

impl ExtractionPool {
    /// Spawn `options.workers` threads running `extractor`.
    pub fn new(
        options: ExtractionOptions,
        extractor: impl MeshExtractor,
    ) -> Result<Self, ViewError> {
        if options.workers == 0 {
            return Err(ViewError::NoWorkers);
        }
        let extractor: Arc<dyn MeshExtractor> = Arc::new(extractor);
        let shared = Arc::new(Shared::default());
        let (send_job, recv_job) = crossbeam_channel::unbounded();

        let workers = (0..options.workers)
            .map(|_| {
                let recv_job = Receiver::clone(&recv_job);
                let shared = Arc::clone(&shared);
                let extractor = Arc::clone(&extractor);
                let policy = options.hide_policy;
                thread::spawn(move || worker_thread_body(recv_job, shared, extractor, policy))
            })
            .collect();
        debug!(workers = options.workers, policy = ?options.hide_policy, "extraction pool started");

        Ok(Self {
            send_job: Some(send_job),
            shared,
            workers,
            options,
        })
    }

    /// The configuration.
    pub fn options(&self) -> ExtractionOptions {
        self.options
    }

    /// Queue an extraction of segment `id`.
    pub fn submit(&self, id: u64) {
        let Some(send_job) = &self.send_job else {
            return;
        };
        let mut book = self.shared.book.lock();
        let job = Job {
            id,
            epoch: book.epoch(id),
        };
        if send_job.send(job).is_ok() {
            book.pending += 1;
        } else {
            error!(id, "extraction workers are gone, dropping job");
        }
    }

    /// Remove segment `id` from the cache, applying the hide policy.
    pub fn hide(&self, id: u64) {
        let mut book = self.shared.book.lock();
        book.cache.remove(id);
        if self.options.hide_policy == HidePolicy::Cancel {
            *book.epochs.entry(id).or_default() += 1;
        }
    }

    /// The cached mesh of `id`.
    pub fn mesh(&self, id: u64) -> Option<Arc<Mesh>> {
        self.shared.book.lock().cache.get(id)
    }

    /// Whether the cache changed since the last call.
    pub fn take_fresh(&self) -> bool {
        self.shared.book.lock().cache.take_fresh()
    }

    /// Submitted extractions that have not finished.
    pub fn pending(&self) -> usize {
        self.shared.book.lock().pending
    }

    /// Extractions running right now.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// The highest number of extractions that ever ran at once.
    pub fn peak(&self) -> usize {
        self.shared.peak.load(Ordering::SeqCst)
    }

    /// Extractions that ran to completion (with or without a mesh).
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// Block until every submitted extraction has finished.
    pub fn drain(&self) {
        let mut book = self.shared.book.lock();
        while book.pending > 0 {
            self.shared.drained.wait(&mut book);
        }
    }
}

impl Drop for ExtractionPool {
    fn drop(&mut self) {
        // Closing the channel ends the workers once the queue is empty.
        self.send_job = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("extraction worker panicked");
            }
        }
    }
}

fn worker_thread_body(
    recv_job: Receiver<Job>,
    shared: Arc<Shared>,
    extractor: Arc<dyn MeshExtractor>,
    policy: HidePolicy,
) {
    while let Ok(job) = recv_job.recv() {
        if policy == HidePolicy::Cancel && shared.book.lock().epoch(job.id) != job.epoch {
            trace!(id = job.id, "skipping extraction of hidden segment");
            shared.finish(&job, None, policy);
            continue;
        }

        let running = shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        shared.peak.fetch_max(running, Ordering::SeqCst);
        let mesh = match catch_unwind(AssertUnwindSafe(|| extractor.extract(job.id))) {
            Ok(mesh) => mesh,
            Err(_) => {
                error!(id = job.id, "mesh extraction panicked");
                None
            }
        };
        shared.active.fetch_sub(1, Ordering::SeqCst);
        shared.completed.fetch_add(1, Ordering::SeqCst);

        shared.finish(&job, mesh, policy);
    }
}
