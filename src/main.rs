//! autoscript - Main entry point
//!
//! Compiles scripts and drives them against the simulated robot.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use autoscript::cli::{Cli, Commands};
use autoscript::hardware::{Mechanism, Sensor};
use autoscript::sim::SimRobot;
use autoscript::{
    compiler, engine, Alliance, CommandRegistry, Context, Engine, HostLoop, RobotConfig,
    ScriptSource, TaskRuntime,
};

/// Initialize the tracing subscriber; RUST_LOG overrides the default filter
fn init_logger(verbose: bool) {
    let default = if verbose {
        "autoscript=debug"
    } else {
        "autoscript=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RobotConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            RobotConfig::load_from_file(path)
        }
        None => Ok(RobotConfig::default()),
    }
}

/// Simulated robot, task runtime and context for one invocation
struct Rig {
    sim: SimRobot,
    ctx: Context,
    _runtime: TaskRuntime,
}

impl Rig {
    fn new(config: &RobotConfig) -> Result<Self> {
        let sim = SimRobot::with_params(config.sim);
        let runtime = TaskRuntime::new().context("Failed to start threaded task runtime")?;
        let ctx = Context::new(sim.hardware(), config.tuning, runtime.spawner());
        Ok(Self {
            sim,
            ctx,
            _runtime: runtime,
        })
    }
}

fn check(script: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let rig = Rig::new(&config)?;
    let registry = CommandRegistry::with_builtins();

    let root = compiler::load(&ScriptSource::new(script), &registry, &rig.ctx)
        .with_context(|| format!("Script {:?} failed to compile", script))?;

    print!("{}", root.describe());
    println!("✓ Script is valid: {}", script.display());
    Ok(())
}

fn run(
    script: Option<PathBuf>,
    config: Option<&Path>,
    alliance: Option<Alliance>,
    realtime: bool,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(alliance) = alliance {
        config.alliance = alliance;
    }
    let source = script
        .map(ScriptSource::new)
        .unwrap_or_else(|| config.script_source());

    let rig = Rig::new(&config)?;
    let registry = CommandRegistry::with_builtins();

    // A script that cannot be loaded leaves the robot idle for the phase
    let root = match compiler::load(&source, &registry, &rig.ctx) {
        Ok(root) => root,
        Err(e) => {
            error!("No routine will run: {}", e);
            return Err(e).context("Failed to load routine");
        }
    };
    debug!("Command tree:\n{}", root.describe());

    let stop = engine::stop_flag_on_signals().unwrap_or_else(|e| {
        warn!("Failed to initialize signal handlers: {}", e);
        Arc::new(AtomicBool::new(false))
    });

    let host = HostLoop::new(config.period(), config.budget());
    let mut engine = Engine::new(root, rig.ctx.clone());
    info!(
        alliance = %config.alliance,
        period_ms = config.period_ms,
        budget_secs = config.budget_secs,
        "Autonomous phase starting"
    );

    let result = host.run(&mut engine, &stop, |dt| {
        if realtime {
            std::thread::sleep(dt);
        }
        rig.sim.advance(dt);
    });
    drop(engine);
    rig.ctx.hardware.make_safe();

    let summary = result.context("Routine faulted")?;
    println!(
        "Routine {} after {} ticks ({:.2}s)",
        summary.outcome,
        summary.ticks,
        summary.elapsed.as_secs_f64()
    );
    println!(
        "Distance: {:.1}  Heading: {:.1}  Bucket: {}  Gear guard: {}",
        rig.sim.encoder.read().unwrap_or(f64::NAN),
        rig.sim.gyro.read().unwrap_or(f64::NAN),
        position_label(rig.sim.bucket.position()),
        position_label(rig.sim.gear_guard.position()),
    );
    Ok(())
}

fn position_label(position: Option<autoscript::MechanismPosition>) -> String {
    position.map_or_else(|| "untouched".to_string(), |p| p.to_string())
}

fn list_commands() {
    let registry = CommandRegistry::with_builtins();
    for spec in registry.specs() {
        println!("{:<40} {:<26} {}", spec.usage, spec.arity.to_string(), spec.description);
    }
}

fn init_config(path: &Path) -> Result<()> {
    RobotConfig::default().save_to_file(path)?;
    println!("✓ Default configuration written to {}", path.display());
    Ok(())
}

/// Main application entry point
fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed");

    match cli.command {
        Commands::Check { script, config } => check(&script, config.as_deref()),
        Commands::Run {
            script,
            config,
            alliance,
            realtime,
        } => run(script, config.as_deref(), alliance, realtime),
        Commands::Commands => {
            list_commands();
            Ok(())
        }
        Commands::InitConfig { path } => init_config(&path),
    }
}
