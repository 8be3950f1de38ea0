//! Bounded worker pool for independent per-item work.
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::core::report::{BatchReport, ItemStatus};
use crate::error::{Error, Result};

pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidArgument {
                arg: "workers",
                value: workers.to_string(),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("eoprocess-worker-{}", i))
            .build()
            .map_err(Error::processing)?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f` on every `(key, item)` pair and collect a report sorted by key.
    ///
    /// An `Err` from `f` becomes a skipped entry carrying the error message.
    pub fn run_keyed<I, T, F>(&self, items: Vec<(String, I)>, f: F) -> BatchReport<T>
    where
        I: Send,
        T: Send,
        F: Fn(&str, I) -> Result<T> + Sync,
    {
        let mut outcomes: Vec<(String, ItemStatus<T>)> = self.pool.install(|| {
            items
                .into_par_iter()
                .map(|(key, item)| {
                    let status = match f(&key, item) {
                        Ok(v) => ItemStatus::Succeeded(v),
                        Err(e) => ItemStatus::Skipped {
                            reason: e.to_string(),
                        },
                    };
                    (key, status)
                })
                .collect()
        });
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        let mut report = BatchReport::default();
        for (key, status) in outcomes {
            report.push(key, status);
        }
        report
    }
}
