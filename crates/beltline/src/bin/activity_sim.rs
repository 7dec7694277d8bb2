//! Headless activity simulation.
//!
//! Builds `chains` miner -> storage pairs where storages drain slower than
//! miners produce, so miners spend most of their time blocked and idled.
//! Logs how much of the factory stays active.
//!
//! Usage: `activity_sim [config.toml] [--ticks N] [--chains N]`
//! Log level follows `RUST_LOG` (default `info`).

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use parking_lot::Mutex;

use beltline::core::{ComponentKind, EntityId, Signature, SimulationConfig};
use beltline::{GameLoop, GameSystem, SystemPhase, SystemResult, TickContext};

const STORAGE_CAPACITY: u32 = 4;
const MINE_INTERVAL: u64 = 5;
const DRAIN_INTERVAL: u64 = 40;

type Levels = Arc<Mutex<HashMap<EntityId, u32>>>;

struct MinerSystem {
    targets: HashMap<EntityId, EntityId>,
    levels: Levels,
}

impl GameSystem for MinerSystem {
    fn name(&self) -> &'static str {
        "miner"
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::Miner
    }

    fn signature(&self) -> Option<Signature> {
        Some(Signature::single(ComponentKind::Miner))
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> SystemResult {
        if ctx.frame % MINE_INTERVAL != 0 {
            return Ok(());
        }
        let mut levels = self.levels.lock();
        for &miner in ctx.active(ComponentKind::Miner) {
            let Some(&storage) = self.targets.get(&miner) else {
                continue;
            };
            let level = levels.entry(storage).or_insert(0);
            if *level < STORAGE_CAPACITY {
                *level += 1;
                ctx.reports.ejected(miner, Some(storage.into()));
            } else {
                ctx.reports.full(miner, Some(storage.into()));
            }
        }
        Ok(())
    }
}

struct StorageSystem {
    levels: Levels,
}

impl GameSystem for StorageSystem {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn phase(&self) -> SystemPhase {
        SystemPhase::Storage
    }

    fn signature(&self) -> Option<Signature> {
        Some(Signature::single(ComponentKind::Storage))
    }

    fn on_unregister(&mut self, entity: EntityId) {
        self.levels.lock().remove(&entity);
    }

    fn update(&mut self, ctx: &TickContext<'_>) -> SystemResult {
        if ctx.frame % DRAIN_INTERVAL != 0 {
            return Ok(());
        }
        let mut levels = self.levels.lock();
        for &storage in ctx.matched {
            if let Some(level) = levels.get_mut(&storage).filter(|level| **level > 0) {
                *level -= 1;
                ctx.reports.resolved(storage, None);
            }
        }
        Ok(())
    }
}

struct Args {
    config: SimulationConfig,
    ticks: u64,
    chains: usize,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: SimulationConfig::default(),
        ticks: 600,
        chains: 1_000,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--ticks" => {
                args.ticks = iter
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("--ticks needs a number")?;
            }
            "--chains" => {
                args.chains = iter
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or("--chains needs a number")?;
            }
            path => {
                args.config = SimulationConfig::load(path).map_err(|e| e.to_string())?;
            }
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            tracing::error!(%message, "invalid arguments");
            return ExitCode::FAILURE;
        }
    };

    let mut game = match GameLoop::new(args.config, args.chains * 2) {
        Ok(game) => game,
        Err(error) => {
            tracing::error!(%error, "failed to create game loop");
            return ExitCode::FAILURE;
        }
    };

    let targets: HashMap<EntityId, EntityId> = game.load(|world| {
        (0..args.chains)
            .map(|_| {
                let storage = world.spawn(&[ComponentKind::Storage, ComponentKind::StaticMapEntity]);
                let miner = world.spawn(&[ComponentKind::Miner, ComponentKind::StaticMapEntity]);
                (miner, storage)
            })
            .collect()
    });

    let levels = Levels::default();
    game.add_system(Box::new(MinerSystem {
        targets,
        levels: Arc::clone(&levels),
    }));
    game.add_system(Box::new(StorageSystem { levels }));

    tracing::info!(
        chains = args.chains,
        ticks = args.ticks,
        order = ?game.systems().execution_order(),
        "starting simulation"
    );

    let last = game.run_ticks(args.ticks);
    let activity = last.dispatch.activity;
    tracing::info!(
        frame = last.dispatch.frame,
        matched = activity.matched,
        active = activity.active,
        waiting = activity.waiting,
        idled = activity.idled,
        edges = activity.edges,
        "final activity"
    );
    game.stats().log_summary();
    ExitCode::SUCCESS
}
