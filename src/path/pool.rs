use crate::path::request::{PathRequest, Route};
use crate::path::strategy::PathFindingStrategy;
use crate::telemetry::logging;
use crate::world::collision::CollisionMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

struct PathJob {
    strategy: Box<dyn PathFindingStrategy>,
    collision: CollisionMap,
    request: PathRequest,
    reply: Sender<Route>,
}

/// Fixed set of worker threads running path searches against collision
/// snapshots. Workers only ever see immutable copies of the map.
pub struct PathWorkerPool {
    sender: Option<Sender<PathJob>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for PathWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathWorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl PathWorkerPool {
    pub fn new(worker_count: usize) -> Result<Self, String> {
        let (sender, receiver) = mpsc::channel::<PathJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::new();
        for id in 0..worker_count.max(1) {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("path-worker-{}", id))
                .spawn(move || worker_loop(id, receiver))
                .map_err(|err| format!("failed to spawn path worker {}: {}", id, err))?;
            workers.push(handle);
        }
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues a search and returns the channel its route will arrive on.
    pub fn submit(
        &self,
        strategy: Box<dyn PathFindingStrategy>,
        collision: CollisionMap,
        request: PathRequest,
    ) -> Result<Receiver<Route>, String> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| "path worker pool is shut down".to_string())?;
        let (reply, receiver) = mpsc::channel();
        sender
            .send(PathJob {
                strategy,
                collision,
                request,
                reply,
            })
            .map_err(|_| "path workers are gone".to_string())?;
        Ok(receiver)
    }
}

impl Drop for PathWorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                logging::log_error("path worker panicked");
            }
        }
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<Receiver<PathJob>>>) {
    loop {
        let job = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => {
                logging::log_error(&format!("path worker {}: job queue poisoned", id));
                return;
            }
        };
        let Ok(job) = job else {
            return;
        };
        if job.strategy.is_cancelled() {
            continue;
        }
        let started = Instant::now();
        let route = job.strategy.calculate_route(&job.collision, &job.request);
        if job.strategy.is_cancelled() {
            logging::log_path(&format!(
                "worker {}: discarded cancelled route {} -> {}",
                id, job.request.start, job.request.end
            ));
            continue;
        }
        logging::log_path(&format!(
            "worker {}: {} -> {} in {:?} (steps={}, success={})",
            id,
            job.request.start,
            job.request.end,
            started.elapsed(),
            route.path.len(),
            route.success
        ));
        let _ = job.reply.send(route);
    }
}
