use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use tibia_tracker::config::TrackerConfig;
use tibia_tracker::gateway::Gateway;
use tibia_tracker::nav::{self, NavAction};
use tibia_tracker::state::{
    AppState, Delta, GainEntry, HistoryDay, ProviderCommand, RankingEntry, TopGainerEntry,
    apply_delta,
};
use tibia_tracker::sync::{CollectionRequest, SyncScheduler, next_deadline};

#[derive(Clone, Default)]
struct Calls {
    ranking: Arc<AtomicUsize>,
    gains: Arc<AtomicUsize>,
    top: Arc<AtomicUsize>,
    history: Arc<AtomicUsize>,
    trigger: Arc<AtomicUsize>,
}

#[derive(Clone, Default)]
struct MockGateway {
    calls: Calls,
    empty: bool,
    fail_top: bool,
    fail_trigger: bool,
}

impl Gateway for MockGateway {
    fn current_ranking(&self) -> Result<Vec<RankingEntry>> {
        self.calls.ranking.fetch_add(1, Ordering::SeqCst);
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(vec![RankingEntry {
            rank: 1,
            name: "Bubble".to_string(),
            level: 1200,
            experience: 28_000_000_000,
            vocation: None,
        }])
    }

    fn daily_gains(&self) -> Result<Vec<GainEntry>> {
        self.calls.gains.fetch_add(1, Ordering::SeqCst);
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(vec![GainEntry {
            rank: 1,
            name: "Bubble".to_string(),
            current_level: 1200,
            current_experience: 28_000_000_000,
            exp_gained_today: 1_000,
            level_gained_today: 0,
        }])
    }

    fn top_gainers(&self, days: u32) -> Result<Vec<TopGainerEntry>> {
        self.calls.top.fetch_add(1, Ordering::SeqCst);
        if self.fail_top {
            return Err(anyhow!("http 500 Internal Server Error: boom"));
        }
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(vec![TopGainerEntry {
            rank: Some(4),
            name: "Bubble".to_string(),
            total_exp_gained: 7_000,
            total_levels_gained: 0,
            avg_daily_exp: 1_000.0,
            days_tracked: days,
        }])
    }

    fn player_history(&self, player: &str, days: u32) -> Result<Vec<HistoryDay>> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        if player != "Bubble" {
            return Err(anyhow!("http 404 Not Found: unknown player"));
        }
        Ok((0..days)
            .map(|offset| HistoryDay {
                date: NaiveDate::from_ymd_opt(2026, 10, 18 - offset).unwrap(),
                level: 1200,
                experience: 28_000_000_000 - i64::from(offset) * 1_000,
                exp_gained: Some(1_000),
                level_gained: Some(0),
            })
            .collect())
    }

    fn trigger_collection(&self) -> Result<()> {
        self.calls.trigger.fetch_add(1, Ordering::SeqCst);
        if self.fail_trigger {
            return Err(anyhow!("request failed"));
        }
        Ok(())
    }
}

fn test_config(poll: Duration, grace: Duration) -> TrackerConfig {
    TrackerConfig {
        poll_interval: poll,
        grace_delay: grace,
        history_days: 5,
        ..TrackerConfig::default()
    }
}

/// Applies deltas until `done` holds or the timeout passes.
fn pump_until(
    rx: &Receiver<Delta>,
    state: &mut AppState,
    timeout: Duration,
    mut done: impl FnMut(&AppState, &Delta) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(delta) => {
                let stop = done(state, &delta);
                apply_delta(state, delta);
                if stop {
                    return true;
                }
            }
            Err(_) => return false,
        }
    }
    false
}

fn wait_for_refresh(rx: &Receiver<Delta>, state: &mut AppState) {
    assert!(
        pump_until(rx, state, Duration::from_secs(5), |_, d| matches!(
            d,
            Delta::Refreshed(_)
        )),
        "expected a bulk refresh"
    );
}

#[test]
fn activation_refreshes_all_three_immediately() {
    let gateway = MockGateway::default();
    let calls = gateway.calls.clone();
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_secs(3600), Duration::from_millis(50)),
        tx,
    );

    let mut state = AppState::new();
    wait_for_refresh(&rx, &mut state);

    assert_eq!(state.ranking.len(), 1);
    assert_eq!(state.gains.len(), 1);
    assert_eq!(state.top_gainers.len(), 1);
    assert_eq!(state.top_gainers[0].days_tracked, 7);
    assert!(state.last_update.is_some());
    assert_eq!(calls.ranking.load(Ordering::SeqCst), 1);
    handle.stop();
}

#[test]
fn empty_backend_leaves_every_bulk_view_empty() {
    let gateway = MockGateway {
        empty: true,
        ..MockGateway::default()
    };
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_secs(3600), Duration::from_millis(50)),
        tx,
    );

    let mut state = AppState::new();
    wait_for_refresh(&rx, &mut state);
    handle.stop();

    assert!(state.ranking.is_empty());
    assert!(state.gains.is_empty());
    assert!(state.top_gainers.is_empty());
    assert!(nav::show_empty_state(&state));
}

#[test]
fn one_failing_fetch_does_not_block_the_others() {
    let gateway = MockGateway {
        fail_top: true,
        ..MockGateway::default()
    };
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_secs(3600), Duration::from_millis(50)),
        tx,
    );

    let mut state = AppState::new();
    state.set_top_gainers(vec![TopGainerEntry {
        rank: None,
        name: "Stale".to_string(),
        total_exp_gained: 1,
        total_levels_gained: 0,
        avg_daily_exp: 0.1,
        days_tracked: 7,
    }]);
    wait_for_refresh(&rx, &mut state);
    handle.stop();

    assert_eq!(state.ranking.len(), 1);
    assert_eq!(state.gains.len(), 1);
    assert_eq!(state.top_gainers[0].name, "Stale");
    assert!(
        state
            .logs
            .iter()
            .any(|line| line.starts_with("[WARN] Top gainers fetch error"))
    );
}

#[test]
fn polls_repeat_and_stop_is_final() {
    let gateway = MockGateway::default();
    let calls = gateway.calls.clone();
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_millis(40), Duration::from_millis(50)),
        tx,
    );

    let mut state = AppState::new();
    for _ in 0..3 {
        wait_for_refresh(&rx, &mut state);
    }
    handle.stop();

    let after_stop = calls.ranking.load(Ordering::SeqCst);
    assert!(after_stop >= 3);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(calls.ranking.load(Ordering::SeqCst), after_stop);
    assert_eq!(calls.gains.load(Ordering::SeqCst), after_stop);
    assert_eq!(calls.top.load(Ordering::SeqCst), after_stop);
}

#[test]
fn dropping_the_handle_stops_the_worker() {
    let gateway = MockGateway::default();
    let calls = gateway.calls.clone();
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_millis(30), Duration::from_millis(50)),
        tx,
    );
    let mut state = AppState::new();
    wait_for_refresh(&rx, &mut state);
    drop(handle);

    let after_drop = calls.ranking.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
    assert_eq!(calls.ranking.load(Ordering::SeqCst), after_drop);
}

#[test]
fn manual_collection_refreshes_once_after_grace_delay() {
    let gateway = MockGateway::default();
    let calls = gateway.calls.clone();
    let (tx, rx) = mpsc::channel();
    let grace = Duration::from_millis(150);
    let handle = SyncScheduler::start(gateway, test_config(Duration::from_secs(3600), grace), tx);

    let mut state = AppState::new();
    wait_for_refresh(&rx, &mut state);
    assert_eq!(calls.ranking.load(Ordering::SeqCst), 1);

    let started = Instant::now();
    assert_eq!(
        handle.trigger_manual_collection(&mut state),
        CollectionRequest::Started
    );
    assert!(state.collecting);
    assert_eq!(
        handle.trigger_manual_collection(&mut state),
        CollectionRequest::AlreadyRunning
    );
    // A raw command arriving during the grace window is ignored by the worker too.
    assert!(handle.send(ProviderCommand::TriggerCollection));

    let finished = pump_until(&rx, &mut state, Duration::from_secs(5), |s, d| {
        if matches!(d, Delta::CollectionFinished) {
            return true;
        }
        assert!(s.collecting, "busy flag cleared before the refresh");
        false
    });
    assert!(finished);
    assert!(started.elapsed() >= grace);
    assert!(!state.collecting);
    assert_eq!(calls.trigger.load(Ordering::SeqCst), 1);
    assert_eq!(calls.ranking.load(Ordering::SeqCst), 2);

    thread::sleep(grace * 2);
    assert_eq!(calls.ranking.load(Ordering::SeqCst), 2);
    handle.stop();
}

#[test]
fn busy_flag_is_up_for_the_whole_grace_window() {
    let gateway = MockGateway::default();
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_secs(3600), Duration::from_millis(300)),
        tx,
    );

    let mut state = AppState::new();
    wait_for_refresh(&rx, &mut state);
    handle.trigger_manual_collection(&mut state);

    thread::sleep(Duration::from_millis(100));
    while let Ok(delta) = rx.try_recv() {
        apply_delta(&mut state, delta);
    }
    assert!(state.collecting);

    assert!(pump_until(&rx, &mut state, Duration::from_secs(5), |_, d| {
        matches!(d, Delta::CollectionFinished)
    }));
    assert!(!state.collecting);
    handle.stop();
}

#[test]
fn failed_collection_clears_busy_flag() {
    let gateway = MockGateway {
        fail_trigger: true,
        ..MockGateway::default()
    };
    let calls = gateway.calls.clone();
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_secs(3600), Duration::from_millis(50)),
        tx,
    );

    let mut state = AppState::new();
    wait_for_refresh(&rx, &mut state);
    assert_eq!(
        handle.trigger_manual_collection(&mut state),
        CollectionRequest::Started
    );

    assert!(pump_until(&rx, &mut state, Duration::from_secs(5), |_, d| {
        matches!(d, Delta::CollectionFinished)
    }));
    handle.stop();

    assert!(!state.collecting);
    assert_eq!(calls.ranking.load(Ordering::SeqCst), 1);
    assert!(
        state
            .logs
            .iter()
            .any(|line| line.starts_with("[WARN] Collection error"))
    );
}

#[test]
fn player_selection_routes_history_into_store() {
    let gateway = MockGateway::default();
    let calls = gateway.calls.clone();
    let (tx, rx) = mpsc::channel();
    let handle = SyncScheduler::start(
        gateway,
        test_config(Duration::from_secs(3600), Duration::from_millis(50)),
        tx,
    );

    let mut state = AppState::new();
    wait_for_refresh(&rx, &mut state);

    let cmd = nav::navigate(&mut state, NavAction::SelectPlayer("Bubble".to_string()))
        .expect("selection issues a fetch");
    assert!(handle.send(cmd));
    assert!(pump_until(&rx, &mut state, Duration::from_secs(5), |_, d| {
        matches!(d, Delta::SetHistory { .. })
    }));

    assert_eq!(calls.history.load(Ordering::SeqCst), 1);
    assert!(state.history_is_current());
    assert_eq!(state.history.len(), 5);
    assert!(state.history.windows(2).all(|w| w[0].date < w[1].date));

    let cmd = nav::navigate(&mut state, NavAction::SelectPlayer("Nobody".to_string()))
        .expect("selection issues a fetch");
    assert!(handle.send(cmd));
    assert!(pump_until(&rx, &mut state, Duration::from_secs(5), |_, d| {
        matches!(d, Delta::Log(line) if line.contains("History (Nobody)"))
    }));
    handle.stop();

    assert_eq!(state.history.len(), 5);
    assert_eq!(state.history_player.as_deref(), Some("Bubble"));
    assert!(!state.history_is_current());
}

#[test]
fn deadlines_stay_on_grid_unless_far_behind() {
    let start = Instant::now();
    let interval = Duration::from_secs(120);

    let next = next_deadline(start, start + Duration::from_secs(1), interval);
    assert_eq!(next, start + interval);

    let late = start + Duration::from_secs(300);
    assert_eq!(next_deadline(start, late, interval), late + interval);
}
