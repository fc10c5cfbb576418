// Keydance CLI
// Replays a key trace through the engine and prints what the host would see

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use keydance_core::sim::{OutputEvent, Script, Simulator};
use keydance_core::Config;

/// Tap/hold/sequence trace replayer
#[derive(Parser, Debug)]
#[command(name = "keydance")]
#[command(version)]
#[command(about = "Replay key traces through the tap/hold engine", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: PathBuf,

    /// Event script to replay ("-" reads stdin)
    #[arg(short, long, value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Time to let pass after the last step so pending timers fire
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    tail_ms: u64,

    /// Print the live records after every step
    #[arg(long)]
    state: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("reading script from stdin")?;
        return Ok(source);
    }
    fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))
}

fn print_config(config: &Config) {
    let t = config.engine.timeouts.defaults();
    println!("capacity: {}", config.engine.capacity);
    println!(
        "timeouts: tap={}ms sequence={}ms following_tap={}ms release={}ms",
        t.tap, t.sequence, t.following_tap, t.release
    );
    println!(
        "simultaneous presses delay: {}ms",
        config.engine.simultaneous_presses_delay_ms
    );
    for (key, kind, ms) in config.engine.timeouts.overrides() {
        println!("override {}: {}={}ms", key, kind, ms);
    }
    for (key, feature, enabled) in config.engine.features.overrides() {
        println!("override {}: {}={}", key, feature, enabled);
    }
    let mut keys: Vec<_> = config.engine.macro_keys.iter().copied().collect();
    keys.sort();
    for key in keys {
        match config.behaviors.get(key) {
            Some(behavior) => println!("macro {}: {}", key, behavior),
            None => println!("macro {}", key),
        }
    }
    for (idx, name) in config.layer_names.iter().enumerate() {
        println!(
            "layer {}: {} ({} keys)",
            idx,
            name.as_deref().unwrap_or("-"),
            config.layers[idx].len()
        );
    }
}

fn flush<W: Write>(
    out: &mut W,
    sim: &mut Simulator,
    at_ms: u64,
    show_state: bool,
) -> io::Result<()> {
    for event in sim.drain_output() {
        writeln!(out, "{:>6}ms  {}", at_ms, event)?;
    }
    if show_state {
        for state in sim.engine().active().iter() {
            writeln!(out, "{:>8}   | {}", "", state)?;
        }
    }
    Ok(())
}

/// Fire due timers one by one so their output carries the time they fired
fn fire_until<W: Write>(
    out: &mut W,
    sim: &mut Simulator,
    at_ms: u64,
    show_state: bool,
) -> io::Result<()> {
    while let Some(fired_ms) = sim.fire_next(at_ms) {
        flush(out, sim, fired_ms, show_state)?;
    }
    sim.advance_to(at_ms);
    Ok(())
}

fn replay<W: Write>(
    out: &mut W,
    sim: &mut Simulator,
    script: &Script,
    tail_ms: u64,
    show_state: bool,
) -> io::Result<()> {
    for step in script.steps() {
        fire_until(out, sim, step.at_ms, show_state)?;

        log::debug!("line {}: {}", step.line, step.command);
        sim.apply(step.command);
        flush(out, sim, step.at_ms, show_state)?;
    }

    let end_ms = sim.now() + tail_ms;
    fire_until(out, sim, end_ms, show_state)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::from_toml_path(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;

    if args.check_config {
        print_config(&config);
        println!("Config OK");
        return Ok(());
    }

    let Some(script_path) = &args.script else {
        bail!("--script is required unless --check-config is given");
    };
    let source = read_script(script_path)?;
    let script = Script::parse(&source)
        .with_context(|| format!("parsing script {}", script_path.display()))?;

    if config.layers.is_empty() {
        log::warn!("config has no [[layer]] tables; every position resolves to KEY 0");
    }

    let mut sim = config.build_simulator();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    replay(&mut out, &mut sim, &script, args.tail_ms, args.state).context("writing output")?;
    Ok(())
}
