use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use chrono::{Duration as ChronoDuration, Local};
use rand::Rng;

use crate::gateway::Gateway;
use crate::state::{GainEntry, HistoryDay, RankingEntry, TopGainerEntry};

const SEED_PLAYERS: [(&str, &str); 20] = [
    ("Bubble", "Elite Knight"),
    ("Eternal Oblivion", "Elite Knight"),
    ("Mateusz Dragon Wielki", "Master Sorcerer"),
    ("Goraca Kiszka", "Elder Druid"),
    ("Tripida", "Royal Paladin"),
    ("Kharsek", "Master Sorcerer"),
    ("Lord Paulistinha", "Elite Knight"),
    ("Arieswar", "Royal Paladin"),
    ("Dark Lulu", "Elder Druid"),
    ("Moonzinn", "Royal Paladin"),
    ("Sir Valient", "Elite Knight"),
    ("Nattank Fazendo Historia", "Elite Knight"),
    ("Rexis Bravo", "Master Sorcerer"),
    ("Zaypher", "Elder Druid"),
    ("Kinki Rush", "Royal Paladin"),
    ("Druida Bombado", "Elder Druid"),
    ("Seromontis", "Master Sorcerer"),
    ("Jotape Dunkel", "Elite Knight"),
    ("Hydro Blast", "Master Sorcerer"),
    ("Loni Sem Sorte", "Royal Paladin"),
];

/// Simulated scrape cadence. Reads inside one window share a snapshot.
const SCRAPE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct DemoPlayer {
    name: String,
    vocation: String,
    experience: i64,
    exp_today: i64,
    levels_today: i32,
}

struct DemoWorld {
    players: Vec<DemoPlayer>,
    last_scrape: Instant,
}

/// Offline stand-in for the remote service. The world advances on a manual
/// collection or once per scrape interval, so the three reads of one bulk
/// refresh see the same players.
pub struct DemoGateway {
    world: Mutex<DemoWorld>,
}

impl Default for DemoGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoGateway {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let players = SEED_PLAYERS
            .iter()
            .enumerate()
            .map(|(idx, (name, vocation))| {
                let level = 900 - (idx as u32) * 25 + rng.gen_range(0..20);
                DemoPlayer {
                    name: name.to_string(),
                    vocation: vocation.to_string(),
                    experience: exp_for_level(level) + rng.gen_range(0..1_000_000),
                    exp_today: 0,
                    levels_today: 0,
                }
            })
            .collect();
        Self {
            world: Mutex::new(DemoWorld {
                players,
                last_scrape: Instant::now(),
            }),
        }
    }

    fn snapshot(&self) -> Result<Vec<DemoPlayer>> {
        let mut world = self
            .world
            .lock()
            .map_err(|_| anyhow!("demo feed lock poisoned"))?;
        if world.last_scrape.elapsed() >= SCRAPE_INTERVAL {
            scrape(&mut world);
        }
        Ok(world.players.clone())
    }

    fn scrape_now(&self) -> Result<()> {
        let mut world = self
            .world
            .lock()
            .map_err(|_| anyhow!("demo feed lock poisoned"))?;
        scrape(&mut world);
        Ok(())
    }
}

fn scrape(world: &mut DemoWorld) {
    let mut rng = rand::thread_rng();
    for player in world.players.iter_mut() {
        if rng.gen_bool(0.35) {
            continue;
        }
        let before = level_for_exp(player.experience);
        let gained = rng.gen_range(20_000..2_500_000);
        player.experience += gained;
        player.exp_today += gained;
        player.levels_today += (level_for_exp(player.experience) - before) as i32;
    }
    world.players.sort_by(|a, b| b.experience.cmp(&a.experience));
    world.last_scrape = Instant::now();
}

impl Gateway for DemoGateway {
    fn current_ranking(&self) -> Result<Vec<RankingEntry>> {
        let players = self.snapshot()?;
        Ok(players
            .into_iter()
            .enumerate()
            .map(|(idx, p)| RankingEntry {
                rank: idx as u32 + 1,
                level: level_for_exp(p.experience),
                experience: p.experience,
                vocation: Some(p.vocation),
                name: p.name,
            })
            .collect())
    }

    fn daily_gains(&self) -> Result<Vec<GainEntry>> {
        let players = self.snapshot()?;
        Ok(players
            .into_iter()
            .enumerate()
            .map(|(idx, p)| GainEntry {
                rank: idx as u32 + 1,
                current_level: level_for_exp(p.experience),
                current_experience: p.experience,
                exp_gained_today: p.exp_today,
                level_gained_today: p.levels_today,
                name: p.name,
            })
            .collect())
    }

    fn top_gainers(&self, days: u32) -> Result<Vec<TopGainerEntry>> {
        let players = self.snapshot()?;
        let mut rng = rand::thread_rng();
        let mut rows: Vec<TopGainerEntry> = players
            .into_iter()
            .map(|p| {
                let total = p.exp_today + rng.gen_range(0..8_000_000) * i64::from(days.max(1));
                TopGainerEntry {
                    rank: None,
                    total_levels_gained: (total / 4_000_000) as i32,
                    avg_daily_exp: total as f64 / f64::from(days.max(1)),
                    days_tracked: days,
                    total_exp_gained: total,
                    name: p.name,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.total_exp_gained.cmp(&a.total_exp_gained));
        for (idx, row) in rows.iter_mut().enumerate() {
            row.rank = Some(idx as u32 + 1);
        }
        Ok(rows)
    }

    fn player_history(&self, player: &str, days: u32) -> Result<Vec<HistoryDay>> {
        let players = self.snapshot()?;
        let current = players
            .iter()
            .find(|p| p.name == player)
            .ok_or_else(|| anyhow!("unknown player: {player}"))?;

        let mut rng = rand::thread_rng();
        let today = Local::now().date_naive();
        let mut experience = current.experience;
        let mut out = Vec::with_capacity(days as usize);
        for offset in 0..i64::from(days.max(1)) {
            let Some(date) = today.checked_sub_signed(ChronoDuration::days(offset)) else {
                break;
            };
            let gained = if rng.gen_bool(0.2) {
                0
            } else {
                rng.gen_range(50_000..3_000_000).min(experience)
            };
            let prev_experience = experience - gained;
            let level = level_for_exp(experience);
            out.push(HistoryDay {
                date,
                level,
                experience,
                exp_gained: Some(gained),
                level_gained: Some((level - level_for_exp(prev_experience)) as i32),
            });
            experience = prev_experience;
        }
        // Oldest day has nothing to diff against.
        if let Some(oldest) = out.last_mut() {
            oldest.exp_gained = None;
            oldest.level_gained = None;
        }
        Ok(out)
    }

    fn trigger_collection(&self) -> Result<()> {
        self.scrape_now()
    }
}

fn exp_for_level(level: u32) -> i64 {
    let l = i64::from(level);
    (50 * (l * l * l - 6 * l * l + 17 * l - 12)) / 3
}

fn level_for_exp(experience: i64) -> u32 {
    let mut level = 1;
    while exp_for_level(level + 1) <= experience {
        level += 1;
    }
    level
}
