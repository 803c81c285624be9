// src/bake/pool.rs
// Channel-fed worker pool driving the bake chunks.
// Workers drain one shared job queue and join when the pool drops.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct WorkerPool {
    workers: Vec<Worker>,
    sender: Option<mpsc::Sender<Job>>,
}

struct Worker {
    handle: Option<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(size: usize) -> WorkerPool {
        assert!(size > 0);

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| Worker::new(id, Arc::clone(&receiver)))
            .collect();

        WorkerPool {
            workers,
            sender: Some(sender),
        }
    }

    pub(crate) fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().expect("pool is shutting down");
        // Workers outlive every send except during drop, where the sender
        // is closed first.
        sender.send(Box::new(f)).expect("worker channel closed");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Close the channel so idle workers see the disconnect and exit.
        drop(self.sender.take());

        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                handle
                    .join()
                    .unwrap_or_else(|_| log::error!("bake worker panicked"));
            }
        }
    }
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) -> Worker {
        let handle = thread::Builder::new()
            .name(format!("bake-worker-{id}"))
            .spawn(move || loop {
                let job = {
                    let receiver = receiver.lock().unwrap();
                    receiver.recv()
                };
                match job {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            })
            .expect("failed to spawn bake worker");

        Worker {
            handle: Some(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_job_before_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(4);
            for _ in 0..64 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 64);
    }
}
