use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;

use crate::config::TrackerConfig;
use crate::gateway::Gateway;
use crate::state::{AppState, Delta, ProviderCommand};

const FETCH_THREADS: usize = 3;

pub struct SyncScheduler;

impl SyncScheduler {
    /// Spawns the sync worker. It refreshes immediately, then every `poll_interval`
    /// until the returned handle is stopped or dropped.
    pub fn start<G: Gateway>(gateway: G, config: TrackerConfig, tx: Sender<Delta>) -> SyncHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let gateway = Arc::new(gateway);
        let worker = thread::spawn(move || run_worker(gateway, config, tx, cmd_rx));
        SyncHandle {
            cmd_tx,
            worker: Some(worker),
        }
    }
}

/// Outcome of asking for a manual collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionRequest {
    Started,
    AlreadyRunning,
    WorkerUnavailable,
}

pub struct SyncHandle {
    cmd_tx: Sender<ProviderCommand>,
    worker: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn send(&self, cmd: ProviderCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn refresh_now(&self) -> bool {
        self.send(ProviderCommand::RefreshNow)
    }

    pub fn fetch_history(&self, player: &str) -> bool {
        self.send(ProviderCommand::FetchHistory {
            player: player.to_string(),
        })
    }

    /// Raises the busy flag and queues the collection command. The flag stays up
    /// until the worker sends `Delta::CollectionFinished`.
    pub fn trigger_manual_collection(&self, state: &mut AppState) -> CollectionRequest {
        if !state.begin_collection() {
            return CollectionRequest::AlreadyRunning;
        }
        if self.send(ProviderCommand::TriggerCollection) {
            CollectionRequest::Started
        } else {
            state.finish_collection();
            CollectionRequest::WorkerUnavailable
        }
    }

    /// Stops the timer and waits for the worker. A fetch already running finishes first;
    /// nothing is fetched after this returns.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.cmd_tx.send(ProviderCommand::Shutdown);
        let _ = worker.join();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<G: Gateway>(
    gateway: Arc<G>,
    config: TrackerConfig,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) {
    let pool = build_fetch_pool();

    bulk_refresh(gateway.as_ref(), &config, &tx, &pool);
    let mut next_poll = Instant::now() + config.poll_interval;
    let mut collection_due: Option<Instant> = None;

    loop {
        let deadline = collection_due.map_or(next_poll, |due| due.min(next_poll));
        let wait = deadline.saturating_duration_since(Instant::now());

        match cmd_rx.recv_timeout(wait) {
            Ok(ProviderCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(ProviderCommand::RefreshNow) => {
                bulk_refresh(gateway.as_ref(), &config, &tx, &pool);
            }
            Ok(ProviderCommand::FetchHistory { player }) => {
                fetch_history(gateway.as_ref(), &config, &tx, player);
            }
            Ok(ProviderCommand::TriggerCollection) => {
                if collection_due.is_some() {
                    let _ = tx.send(Delta::Log(
                        "[INFO] Collection already pending, ignoring trigger".to_string(),
                    ));
                    continue;
                }
                match gateway.trigger_collection() {
                    Ok(()) => {
                        let _ = tx.send(Delta::Log(format!(
                            "[INFO] Collection triggered, refreshing in {}s",
                            config.grace_delay.as_secs_f32()
                        )));
                        collection_due = Some(Instant::now() + config.grace_delay);
                    }
                    Err(err) => {
                        let _ = tx.send(Delta::Log(format!("[WARN] Collection error: {err:#}")));
                        let _ = tx.send(Delta::CollectionFinished);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        if let Some(due) = collection_due
            && now >= due
        {
            collection_due = None;
            bulk_refresh(gateway.as_ref(), &config, &tx, &pool);
            let _ = tx.send(Delta::CollectionFinished);
        }

        let now = Instant::now();
        if now >= next_poll {
            bulk_refresh(gateway.as_ref(), &config, &tx, &pool);
            next_poll = next_deadline(next_poll, now, config.poll_interval);
        }
    }
}

/// Keeps polls on a fixed grid; if the worker fell a whole interval behind it
/// restarts the grid from `now` instead of firing a burst.
pub fn next_deadline(previous: Instant, now: Instant, interval: Duration) -> Instant {
    let next = previous + interval;
    if next <= now { now + interval } else { next }
}

/// Ranking, gains and top gainers in parallel. Each result lands on its own,
/// so one failure never holds back the other two.
fn bulk_refresh<G: Gateway>(
    gateway: &G,
    config: &TrackerConfig,
    tx: &Sender<Delta>,
    pool: &Option<rayon::ThreadPool>,
) {
    with_fetch_pool(pool, || {
        rayon::join(
            || publish(tx, "Ranking", gateway.current_ranking().map(Delta::SetRanking)),
            || {
                rayon::join(
                    || publish(tx, "Daily gains", gateway.daily_gains().map(Delta::SetGains)),
                    || {
                        publish(
                            tx,
                            "Top gainers",
                            gateway
                                .top_gainers(config.top_gainers_days)
                                .map(Delta::SetTopGainers),
                        )
                    },
                )
            },
        )
    });
    let _ = tx.send(Delta::Refreshed(Local::now()));
}

fn fetch_history<G: Gateway>(
    gateway: &G,
    config: &TrackerConfig,
    tx: &Sender<Delta>,
    player: String,
) {
    let result = gateway
        .player_history(&player, config.history_days)
        .map(|days| Delta::SetHistory {
            player: player.clone(),
            days,
        });
    publish(tx, &format!("History ({player})"), result);
}

fn publish(tx: &Sender<Delta>, what: &str, result: Result<Delta>) {
    let delta = match result {
        Ok(delta) => delta,
        Err(err) => Delta::Log(format!("[WARN] {what} fetch error: {err:#}")),
    };
    let _ = tx.send(delta);
}

fn build_fetch_pool() -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(FETCH_THREADS)
        .thread_name(|idx| format!("tracker-fetch-{idx}"))
        .build()
        .ok()
}

fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
