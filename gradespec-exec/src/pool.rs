use std::thread;

use anyhow::{anyhow, Context, Error};

/// A bounded set of worker threads that process independent jobs.
///
/// The results are handed to the calling thread in completion order, which is not necessarily the
/// order of the jobs.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    num_workers: usize,
}

impl WorkerPool {
    /// Make a pool with that many workers (at least one).
    pub fn new(num_workers: usize) -> WorkerPool {
        WorkerPool {
            num_workers: num_workers.max(1),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Process all the `jobs` with `work` on the workers, calling `on_done` on the current thread
    /// as soon as each result is ready. Returns after all the jobs are done.
    pub fn run<J, R, W, D>(&self, jobs: Vec<J>, work: W, mut on_done: D) -> Result<(), Error>
    where
        J: Send,
        R: Send,
        W: Fn(J) -> R + Sync,
        D: FnMut(R),
    {
        let num_jobs = jobs.len();
        let (job_sender, job_receiver) = crossbeam_channel::unbounded();
        for job in jobs {
            job_sender
                .send(job)
                .map_err(|_| anyhow!("The job queue is closed"))?;
        }
        drop(job_sender);
        let (result_sender, result_receiver) = crossbeam_channel::unbounded();

        let num_workers = self.num_workers.min(num_jobs.max(1));
        debug!("Processing {} jobs on {} workers", num_jobs, num_workers);
        let work = &work;
        thread::scope(|scope| {
            for i in 0..num_workers {
                let job_receiver = job_receiver.clone();
                let result_sender = result_sender.clone();
                thread::Builder::new()
                    .name(format!("Worker {}", i))
                    .spawn_scoped(scope, move || {
                        while let Ok(job) = job_receiver.recv() {
                            if result_sender.send(work(job)).is_err() {
                                break;
                            }
                        }
                    })
                    .context("Failed to spawn worker thread")?;
            }
            drop(result_sender);
            for result in result_receiver.iter() {
                on_done(result);
            }
            Ok(())
        })
    }
}
