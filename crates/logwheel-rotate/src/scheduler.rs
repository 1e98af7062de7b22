//! Polling loop over all configured policies.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, Timelike};
use tokio::time::MissedTickBehavior;

use crate::engine::RetentionEngine;
use crate::logger::Logger;
use crate::RotationPolicy;

/// Default interval between two ticks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Owns the policies and checks each of them once per tick.
pub struct Orchestrator {
    policies: Vec<RotationPolicy>,
    engine: RetentionEngine,
    logger: Arc<dyn Logger>,
}

impl Orchestrator {
    /// Create an orchestrator; policies are visited in the given order.
    pub fn new(policies: Vec<RotationPolicy>, logger: Arc<dyn Logger>) -> Self {
        Self {
            policies,
            engine: RetentionEngine::new(logger.clone()),
            logger,
        }
    }

    pub fn policies(&self) -> &[RotationPolicy] {
        &self.policies
    }

    /// One pass against the local wall clock.
    pub fn tick(&mut self) -> usize {
        self.tick_at(&Local::now())
    }

    /// One pass: every due policy rotates its files.
    ///
    /// A panic inside one policy is logged and the remaining policies still
    /// run.
    pub fn tick_at<T: Datelike + Timelike>(&mut self, now: &T) -> usize {
        if self.policies.is_empty() {
            self.logger.error("No policies configured");
            return 0;
        }

        let mut total = 0;
        for policy in &mut self.policies {
            let engine = &self.engine;
            let result =
                panic::catch_unwind(AssertUnwindSafe(|| engine.check_and_rotate_at(policy, now)));
            match result {
                Ok(count) => total += count,
                Err(_) => self.logger.error(&format!(
                    "Unknown error while rotating policy [{}]",
                    policy.name
                )),
            }
        }
        total
    }

    /// Rotate every policy once, bypassing schedules when `force` is set.
    pub fn run_once(&mut self, force: bool) -> usize {
        if !force {
            return self.tick();
        }
        self.policies
            .iter()
            .map(|policy| self.engine.rotate_logged(policy))
            .sum()
    }

    /// Tick every `period` until `shutdown` resolves.
    ///
    /// A running tick is always completed before shutdown is observed.
    pub async fn run<F>(mut self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.logger.info(&format!(
            "Scheduler started with {} policies, tick every {}ms",
            self.policies.len(),
            period.as_millis()
        ));

        tokio::pin!(shutdown);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        self.logger.info("Scheduler stopped");
    }
}
