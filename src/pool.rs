//! Fixed-size worker pool mapping a fallible function over keyed work units.
//!
//! Units are processed in parallel and collected in completion order by the
//! calling thread, which is the only place results are gathered. A failing
//! unit does not stop the others: its error is kept alongside the successful
//! results.

use {
    anyhow::{bail, Error, Result},
    rayon::{prelude::*, ThreadPoolBuilder},
    std::{
        collections::BTreeMap,
        sync::mpsc,
        time::{Duration, Instant},
    },
};

/// Number of workers used when none is requested: the available hardware
/// threads, whatever rayon pool the caller runs in.
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Completion accounting of a batch of work units.
#[derive(Debug, Clone)]
pub struct Progress {
    total: usize,
    completed: usize,
    start: Instant,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            start: Instant::now(),
        }
    }

    pub fn complete_one(&mut self) {
        self.completed += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        estimate_remaining(self.percent(), self.elapsed())
    }
}

/// Remaining time assuming the rate observed so far holds.
pub fn estimate_remaining(percent: f64, elapsed: Duration) -> Duration {
    if percent <= 0.0 {
        return Duration::from_secs(0);
    }

    Duration::from_secs_f64(((100.0 - percent) * elapsed.as_secs_f64() / percent).max(0.0))
}

/// Results of a pool run.
#[derive(Debug)]
pub struct PoolOutcome<K: Ord, R> {
    pub results: BTreeMap<K, R>,
    pub failures: BTreeMap<K, Error>,
}

impl<K: Ord, R> Default for PoolOutcome<K, R> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }
}

/// Applies `f` to every unit on a pool of `workers` threads (the available
/// parallelism by default). `on_complete` is called on the calling thread
/// after each completed unit, successful or not.
pub fn map_unordered<K, P, R, F, C>(
    units: Vec<(K, P)>,
    workers: Option<usize>,
    f: F,
    mut on_complete: C,
) -> Result<PoolOutcome<K, R>>
where
    K: Ord + Send,
    P: Send,
    R: Send,
    F: Fn(&K, P) -> Result<R> + Sync,
    C: FnMut(&Progress),
{
    let workers = match workers {
        Some(0) => bail!("At least one worker is required"),
        Some(n) => n,
        None => default_workers(),
    };
    let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;

    let mut progress = Progress::new(units.len());
    let mut outcome = PoolOutcome::default();

    let (tx, rx) = mpsc::channel();
    let f = &f;

    pool.in_place_scope(|scope| {
        scope.spawn(move |_| {
            units.into_par_iter().for_each_with(tx, |tx, (key, params)| {
                let result = f(&key, params);
                // The receiver outlives every sender
                tx.send((key, result)).ok();
            });
        });

        for (key, result) in rx {
            progress.complete_one();
            match result {
                Ok(value) => {
                    outcome.results.insert(key, value);
                }
                Err(e) => {
                    outcome.failures.insert(key, e);
                }
            }
            on_complete(&progress);
        }
    });

    Ok(outcome)
}
