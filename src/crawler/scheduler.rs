//! Request scheduler
//!
//! A single actor task owns the outbound queue and the pacing state. Callers
//! hold a cloneable [`SchedulerHandle`] and submit URLs over a bounded channel;
//! each reply travels back on its own oneshot channel. Jobs are served strictly
//! one at a time in FIFO order, so at most one request is ever in flight.

use crate::config::{default_identities, IdentityProfile, SchedulerConfig};
use crate::crawler::fetcher::{Transport, TransportResponse};
use crate::robots::RobotsPolicy;
use crate::state::PacingState;
use crate::{HarvestError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Factor applied to the carried retry delay after every wait
pub const BACKOFF_GROWTH: f64 = 1.5;

/// Status-dependent factor applied to the carried delay
pub fn status_multiplier(status: Option<u16>) -> f64 {
    match status {
        Some(429) => 2.0,
        Some(503) => 1.5,
        _ => 1.0,
    }
}

/// Wait before the next attempt, given the failure status and the carried delay
///
/// The caller carries `wait * BACKOFF_GROWTH` into the following failure.
pub fn next_delay(status: Option<u16>, previous: Duration) -> Duration {
    previous.mul_f64(status_multiplier(status))
}

struct Job {
    url: String,
    reply: oneshot::Sender<Result<String>>,
}

/// Cloneable submission side of the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Job>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("url", &self.url).finish()
    }
}

impl SchedulerHandle {
    /// Queues a GET and waits for its body
    ///
    /// Resolves once the request succeeded or the retry budget is spent.
    pub async fn enqueue(&self, url: &str) -> Result<String> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Job {
                url: url.to_string(),
                reply,
            })
            .await
            .map_err(|_| HarvestError::SchedulerClosed)?;

        response.await.map_err(|_| HarvestError::SchedulerClosed)?
    }
}

/// The actor serving queued requests
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
    identities: Vec<IdentityProfile>,
    pacing: PacingState,
    /// Fetched lazily before the first job when robots are respected
    robots: Option<RobotsPolicy>,
    rx: mpsc::Receiver<Job>,
}

impl Scheduler {
    /// Starts the actor task
    ///
    /// The task ends once every handle is dropped and the queue is drained;
    /// its join handle yields the number of requests sent.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        config: SchedulerConfig,
        identities: Vec<IdentityProfile>,
    ) -> (SchedulerHandle, JoinHandle<u64>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let identities = if identities.is_empty() {
            default_identities()
        } else {
            identities
        };

        let scheduler = Self {
            transport,
            pacing: PacingState::new(&config),
            config,
            identities,
            robots: None,
            rx,
        };

        let task = tokio::spawn(scheduler.run());
        (SchedulerHandle { tx }, task)
    }

    async fn run(mut self) -> u64 {
        while let Some(job) = self.rx.recv().await {
            let result = self.process(&job.url).await;
            if job.reply.send(result).is_err() {
                tracing::debug!(url = %job.url, "Caller went away before its reply");
            }
        }

        tracing::debug!(
            requests = self.pacing.request_count,
            "Scheduler queue closed"
        );
        self.pacing.request_count
    }

    async fn process(&mut self, url: &str) -> Result<String> {
        ::url::Url::parse(url)?;

        if self.config.respect_robots {
            self.check_robots(url).await?;
        }

        let mut delay = Duration::from_millis(self.config.base_retry_delay_ms);
        let mut retries = 0;

        loop {
            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    let wait = next_delay(err.status(), delay);
                    tracing::warn!(
                        url,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "Request failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(wait).await;
                    delay = wait.mul_f64(BACKOFF_GROWTH);
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::error!(url, retries, "Retry budget exhausted: {}", err);
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&mut self, url: &str) -> Result<String> {
        let response = self.send(url).await?;
        if !response.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }

    /// One paced transport call under the wall-clock timeout
    async fn send(&mut self, url: &str) -> Result<TransportResponse> {
        while let Some(wait) = self.pacing.time_until_next_request(Instant::now()) {
            tokio::time::sleep(wait).await;
        }

        let profile = self.pick_identity();
        self.pacing.record_request(Instant::now());
        tracing::trace!(url, user_agent = %profile.user_agent, "Sending request");

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        match tokio::time::timeout(timeout, self.transport.get(url, &profile)).await {
            Ok(result) => result,
            Err(_) => Err(HarvestError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    fn pick_identity(&self) -> IdentityProfile {
        let index = fastrand::usize(..self.identities.len());
        self.identities[index].clone()
    }

    async fn check_robots(&mut self, url: &str) -> Result<()> {
        if self.robots.is_none() {
            let policy = self.fetch_robots(url).await;
            if let Some(delay) = policy.crawl_delay(&self.config.robots_user_agent) {
                tracing::info!(
                    crawl_delay_ms = delay.as_millis() as u64,
                    "Honouring robots.txt crawl delay"
                );
                self.pacing.widen_interval(delay);
            }
            self.robots = Some(policy);
        }

        let allowed = self
            .robots
            .as_ref()
            .map_or(true, |policy| {
                policy.is_allowed(url, &self.config.robots_user_agent)
            });
        if !allowed {
            return Err(HarvestError::RobotsDenied {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Fetches robots.txt once; any failure means allow-all
    async fn fetch_robots(&mut self, url: &str) -> RobotsPolicy {
        let robots_url = match crate::url::robots_url(url) {
            Ok(robots_url) => robots_url,
            Err(e) => {
                tracing::warn!("Cannot derive robots.txt location: {}", e);
                return RobotsPolicy::allow_all();
            }
        };

        match self.send(&robots_url).await {
            Ok(response) => {
                tracing::debug!(status = response.status, "Fetched robots.txt");
                RobotsPolicy::from_response(response.status, &response.body)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch robots.txt, allowing all: {}", e);
                RobotsPolicy::allow_all()
            }
        }
    }
}
