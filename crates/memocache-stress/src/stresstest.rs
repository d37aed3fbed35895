use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use memocache::{Cache, CacheConfig, ExpirationSweeper};
use sketches_ddsketch::DDSketch;

use crate::config::Config;
use crate::workloads::{SimulatedCreator, Workload, WorkloadsConfig};

type StressCache = Cache<String, SimulatedCreator>;

/// Outcomes of all operations of one workload.
#[derive(Default)]
struct WorkloadStats {
    durations: DDSketch,
    hits: usize,
    creations: usize,
    failures: usize,
}

/// Outcomes of the operations of a single worker thread.
#[derive(Default)]
struct WorkerStats {
    durations: Vec<f64>,
    hits: usize,
    creations: usize,
    failures: usize,
}

impl WorkloadStats {
    fn merge(&mut self, worker: WorkerStats) {
        for duration in worker.durations {
            self.durations.add(duration);
        }
        self.hits += worker.hits;
        self.creations += worker.creations;
        self.failures += worker.failures;
    }
}

pub fn perform_stresstest(
    config: Config,
    workloads: WorkloadsConfig,
    duration: Duration,
) -> Result<()> {
    // initialize workloads, each with its own cache
    let workloads: Vec<_> = workloads
        .workloads
        .into_iter()
        .enumerate()
        .map(|(i, workload)| {
            let cache_config = CacheConfig {
                name: format!("workload-{i}"),
                ..config.cache.clone()
            };
            let creator = SimulatedCreator::new(&workload);
            let cache = Arc::new(Cache::with_config(cache_config, creator));
            (workload, cache)
        })
        .collect();

    let _sweepers = match config.sweep_interval {
        Some(interval) => workloads
            .iter()
            .map(|(_, cache)| ExpirationSweeper::spawn(cache, interval))
            .collect::<Result<Vec<_>, _>>()
            .context("failed to start expiration sweeper")?,
        None => Vec::new(),
    };

    // warmup: request one key of each workload to make sure all threads and caches are set up
    {
        let start = Instant::now();

        thread::scope(|scope| {
            for (workload, cache) in &workloads {
                scope.spawn(move || {
                    let key = workload.keys.sample(&mut rand::rng());
                    let _result = cache.get(key);
                });
            }
        });

        println!("Warmup: {:?}", start.elapsed());
    };
    println!();

    // run the workloads concurrently
    let deadline = Instant::now() + duration;
    let finished = thread::scope(|scope| {
        let tasks: Vec<_> = workloads
            .iter()
            .map(|(workload, cache)| scope.spawn(move || run_workload(workload, cache, deadline)))
            .collect();

        tasks
            .into_iter()
            .map(|task| {
                task.join()
                    .map_err(|_| anyhow::anyhow!("workload thread panicked"))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    for (i, ((workload, cache), stats)) in workloads.iter().zip(finished).enumerate() {
        let concurrency = workload.concurrency;
        let ops = stats.durations.count();
        let ops_ps = ops as f32 / duration.as_secs_f32();
        println!("Workload {i} (concurrency: {concurrency}): {ops} operations, {ops_ps:.2} ops/s");
        if ops == 0 {
            continue;
        }

        let hit_ratio = stats.hits as f64 / ops as f64 * 100.0;
        let entries = cache.len();
        println!(
            "  hits: {hit_ratio:.1}%; creations: {}; failures: {}; entries: {entries}",
            stats.creations, stats.failures
        );

        let avg = Duration::from_secs_f64(stats.durations.sum().unwrap_or_default() / ops as f64);
        let p50 = quantile(&stats.durations, 0.5);
        let p90 = quantile(&stats.durations, 0.9);
        let p99 = quantile(&stats.durations, 0.99);
        println!("  avg: {avg:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}");
    }

    Ok(())
}

/// Calls into the cache from `concurrency` threads until `deadline`.
fn run_workload(workload: &Workload, cache: &StressCache, deadline: Instant) -> WorkloadStats {
    let stats = Mutex::new(WorkloadStats::default());

    thread::scope(|scope| {
        for _ in 0..workload.concurrency.max(1) {
            scope.spawn(|| {
                let mut rng = rand::rng();
                let mut worker = WorkerStats::default();

                while Instant::now() < deadline {
                    let key = workload.keys.sample(&mut rng);
                    let start = Instant::now();
                    let result = cache.get(key);
                    worker.durations.push(start.elapsed().as_secs_f64());

                    match result {
                        Ok(lookup) if lookup.cached => worker.hits += 1,
                        Ok(_) => worker.creations += 1,
                        Err(error) => {
                            tracing::trace!(%error, "creation failed");
                            if !error.cached() {
                                worker.creations += 1;
                            }
                            worker.failures += 1;
                        }
                    }
                }

                stats.lock().unwrap().merge(worker);
            });
        }
    });

    stats.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn quantile(sketch: &DDSketch, q: f64) -> Duration {
    let seconds = sketch.quantile(q).ok().flatten().unwrap_or_default();
    Duration::from_secs_f64(seconds)
}
