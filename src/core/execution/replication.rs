use super::config::{ConcurrencyMode, SimulationConfig};
use super::environment::Environment;
use crate::core::errors::SimResult;
use crate::core::report::RunReport;
use crate::core::scheduling::SequencingOracle;
use log::{info, warn};
use rayon::prelude::*;

/// Builds the sequencing oracle of one replication from its index
pub type OracleFactory = dyn Fn(usize) -> Box<dyn SequencingOracle + Send> + Send + Sync;

/// Outcome of one replication. A failed replication does not affect the others.
#[derive(Debug)]
pub struct ReplicationResult {
    pub replication: usize,
    pub seed: u64,
    pub outcome: SimResult<RunReport>,
}

/// Runs independent replications of one configuration
pub struct ReplicationRunner {
    config: SimulationConfig,
    oracle_factory: Option<Box<OracleFactory>>,
}

impl ReplicationRunner {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            oracle_factory: None,
        }
    }

    /// Give every replication its own oracle instead of the built-in one
    pub fn with_oracle_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(usize) -> Box<dyn SequencingOracle + Send> + Send + Sync + 'static,
    {
        self.oracle_factory = Some(Box::new(factory));
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Generate the orders of replication `replication` and simulate them
    pub fn run_one(&self, replication: usize) -> SimResult<RunReport> {
        let mut env = Environment::for_replication(&self.config, replication)?;
        if let Some(factory) = &self.oracle_factory {
            env = env.with_oracle(factory(replication));
        }
        env.generate_orders()?;
        env.run()
    }

    /// Run every configured replication, in parallel when the concurrency
    /// mode is Rayon. Results come back in replication order.
    pub fn run(&self) -> Vec<ReplicationResult> {
        let count = self.config.replications;
        info!(
            "running {} replications ({:?}, seed {})",
            count, self.config.concurrency_mode, self.config.seed
        );

        let results: Vec<ReplicationResult> = match self.config.concurrency_mode {
            ConcurrencyMode::Sequential => (0..count).map(|i| self.result_of(i)).collect(),
            ConcurrencyMode::Rayon => {
                let parallel = || {
                    (0..count)
                        .into_par_iter()
                        .map(|i| self.result_of(i))
                        .collect::<Vec<_>>()
                };
                match self.dedicated_pool() {
                    Some(pool) => pool.install(parallel),
                    None => parallel(),
                }
            }
        };

        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        if failed > 0 {
            warn!("{} of {} replications failed", failed, count);
        }
        results
    }

    fn result_of(&self, replication: usize) -> ReplicationResult {
        let outcome = self.run_one(replication);
        if let Err(e) = &outcome {
            warn!("replication {} failed: {}", replication, e);
        }
        ReplicationResult {
            replication,
            seed: self.config.seed.wrapping_add(replication as u64),
            outcome,
        }
    }

    fn dedicated_pool(&self) -> Option<rayon::ThreadPool> {
        let threads = self.config.thread_pool_size?;
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("cannot build a {}-thread pool, using the global one: {}", threads, e);
                None
            }
        }
    }
}
