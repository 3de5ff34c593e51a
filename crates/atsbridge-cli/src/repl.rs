//! REPL – interactive driving shell for the bridge.
//!
//! Supported slash-commands:
//!   /help                      – show this list
//!   /load <folder|builtin>     – load the train folder's module, or the built-in one
//!   /unload                    – unload the module
//!   /tick [n]                  – advance the simulation by n ticks
//!   /speed <km/h>              – set the simulated speed
//!   /power <notch>             – move the power handle
//!   /brake <code>              – move the brake handle (protocol code)
//!   /reverser <-1|0|1>         – move the reverser
//!   /constspeed <on|off>       – toggle constant speed control
//!   /key <name> [down|up]      – press an ATS key
//!   /horn <primary|secondary|music>
//!   /door <none|left|right|both>
//!   /beacon <kind> <section> [optional]
//!   /jump <meters>             – move the train
//!   /status                    – print the bridge state as JSON
//!   /config                    – print the active configuration
//!   /quit | /exit              – leave the shell

use colored::Colorize;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use atsbridge_hal::sim::{SimAudio, SimRoute};
use atsbridge_hal::{Section, SectionGraph};
use atsbridge_kernel::{decode_brake, section_signal_aspect};
use atsbridge_runtime::{
    BuiltinModule, LifecycleState, LoadOutcome, LoadingOutcome, LoadingPipeline, LoadingStage,
    PluginManager, StageRunner, TickReport, UpdateCycle, resolve_encoding,
};
use atsbridge_types::{
    BridgeError, DoorState, HornType, MessageSeverity, NO_SIGNAL_ASPECT, SafetyMode, StartMode,
    TrainControls, TrainId, TrainPosition, VehicleState, VirtualKey,
};
use encoding_rs::Encoding;

use crate::config::Config;

const PLAYER: TrainId = TrainId(0);

/// Flags shared with the Ctrl-C handler.
#[derive(Clone, Default)]
pub struct Signals {
    /// Set to leave the shell.
    pub shutdown: Arc<AtomicBool>,
    /// Cancels the load in progress.
    pub cancel: Arc<AtomicBool>,
    /// `true` while a load is running.
    pub loading: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Entry point for the interactive REPL.
///
/// `signals.shutdown` is polled each iteration; when set the REPL exits.
pub fn run(cfg: Config, signals: Signals, initial_folder: Option<PathBuf>) {
    let mut shell = Shell::new(cfg, &signals);
    if let Some(folder) = initial_folder {
        shell.execute(&format!("/load {}", folder.display()));
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if signals.shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "atsbridge>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if shell.execute(&line) == Flow::Quit {
            signals.shutdown.store(true, Ordering::SeqCst);
            break;
        }
    }
    shell.cycle.unload();
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell state
// ─────────────────────────────────────────────────────────────────────────────

pub struct Shell {
    cfg: Config,
    encoding: &'static Encoding,
    cycle: UpdateCycle<SimAudio>,
    route: Vec<Section>,
    state: VehicleState,
    last_report: Option<TickReport>,
    pipeline: LoadingPipeline,
    loading: Arc<AtomicBool>,
}

#[derive(Serialize)]
struct Status<'a> {
    mode: SafetyMode,
    lifecycle: LifecycleState,
    plugin: Option<&'a str>,
    location_m: f64,
    speed_kmh: f64,
    time_s: f64,
    section: Option<usize>,
    controls: &'a TrainControls,
    last_tick: Option<&'a TickReport>,
    panel: Vec<(usize, i32)>,
}

impl Shell {
    pub fn new(cfg: Config, signals: &Signals) -> Self {
        let encoding = resolve_encoding(&cfg.train_encoding).unwrap_or_else(|e| {
            println!("{}: {} – using UTF-8", "Config error".red(), e);
            encoding_rs::UTF_8
        });
        let cycle = idle_cycle(&cfg);
        let mut shell = Self {
            cfg,
            encoding,
            cycle,
            route: demo_route(),
            state: VehicleState::default(),
            last_report: None,
            pipeline: LoadingPipeline::with_cancel_flag(Arc::clone(&signals.cancel)),
            loading: Arc::clone(&signals.loading),
        };
        shell.place_train();
        shell
    }

    /// Run one command line.
    pub fn execute(&mut self, line: &str) -> Flow {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return Flow::Continue;
        };
        let args: Vec<&str> = words.collect();

        let result = match cmd {
            "/help" => {
                cmd_help();
                Ok(())
            }
            "/load" => self.cmd_load(&args),
            "/unload" => {
                self.cycle.unload();
                println!("{}", "Module unloaded.".green());
                Ok(())
            }
            "/tick" => self.cmd_tick(&args),
            "/speed" => self.cmd_speed(&args),
            "/power" => self.cmd_power(&args),
            "/brake" => self.cmd_brake(&args),
            "/reverser" => self.cmd_reverser(&args),
            "/constspeed" => self.cmd_const_speed(&args),
            "/key" => self.cmd_key(&args),
            "/horn" => self.cmd_horn(&args),
            "/door" => self.cmd_door(&args),
            "/beacon" => self.cmd_beacon(&args),
            "/jump" => self.cmd_jump(&args),
            "/status" => {
                self.cmd_status();
                Ok(())
            }
            "/config" => {
                cmd_config(&self.cfg);
                Ok(())
            }
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                return Flow::Quit;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("{}: {}", "Error".red(), e);
        }
        self.flush_messages();
        Flow::Continue
    }

    // ── commands ────────────────────────────────────────────────────────────

    fn cmd_load(&mut self, args: &[&str]) -> Result<(), String> {
        let target = match args.first() {
            None => return Err("usage: /load <folder|builtin>".to_string()),
            Some(&"builtin") => LoadTarget::Builtin,
            Some(_) => LoadTarget::Folder(PathBuf::from(args.join(" "))),
        };

        // The worker owns the cycle until it is joined.
        self.cycle.unload();
        let job = ShellLoad {
            cycle: std::mem::replace(&mut self.cycle, idle_cycle(&self.cfg)),
            route: self.route.clone(),
            target,
            encoding: self.encoding,
            start: self.cfg.start_mode,
            loaded: false,
        };

        self.pipeline.reset();
        self.loading.store(true, Ordering::SeqCst);
        let joined = self
            .pipeline
            .spawn(job)
            .map_err(|e| format!("could not start the loader: {e}"))
            .and_then(|handle| handle.join().map_err(|_| "the loader thread panicked".to_string()));
        self.loading.store(false, Ordering::SeqCst);

        let (job, outcome) = joined?;
        self.cycle = job.cycle;
        self.route = job.route;
        self.place_train();

        match outcome {
            LoadingOutcome::Completed if job.loaded => {
                let title = self
                    .cycle
                    .manager()
                    .session()
                    .map(|s| s.title().to_string())
                    .unwrap_or_default();
                println!("{} {}", "✓ Module active:".green(), title.bold());
            }
            LoadingOutcome::Completed => {
                println!("  {}", "No module loaded; running on built-in control.".yellow());
            }
            LoadingOutcome::Cancelled { completed } => {
                println!("{} after {} stage(s).", "Load cancelled".yellow(), completed.len());
            }
            LoadingOutcome::Failed { stage, error } => {
                return Err(format!("{stage:?} failed: {error}"));
            }
        }
        Ok(())
    }

    fn cmd_tick(&mut self, args: &[&str]) -> Result<(), String> {
        let count = match args.first() {
            Some(raw) => raw.parse::<u32>().map_err(|_| format!("'{raw}' is not a tick count"))?,
            None => 1,
        };
        let dt = self.cfg.tick_interval_ms as f64 / 1000.0;
        for _ in 0..count {
            self.state.total_time_s += dt;
            self.state.location += self.state.speed_mps * dt;
            self.place_train();

            self.cycle
                .update_signal(self.signal_ahead())
                .map_err(|e| e.to_string())?;
            let report = self.cycle.tick(&self.state).map_err(|e| e.to_string())?;
            self.last_report = Some(report);
        }
        if let Some(report) = &self.last_report {
            let validity = if report.valid { "valid".green() } else { "out of range".red() };
            println!(
                "  t={:.1}s  x={:.1}m  power={}  brake={:?}  [{}]",
                self.state.total_time_s, self.state.location, report.security.power, report.security.brake, validity
            );
        }
        Ok(())
    }

    fn cmd_speed(&mut self, args: &[&str]) -> Result<(), String> {
        let kmh: f64 = parse_arg(args, "usage: /speed <km/h>")?;
        self.state.speed_mps = kmh / 3.6;
        Ok(())
    }

    fn cmd_power(&mut self, args: &[&str]) -> Result<(), String> {
        let notch: i32 = parse_arg(args, "usage: /power <notch>")?;
        if notch < 0 || notch > self.cfg.train.max_power_notch as i32 {
            return Err(format!("power notch must be 0..={}", self.cfg.train.max_power_notch));
        }
        let mut driver = self.cycle.controls().driver;
        driver.power = notch;
        self.cycle.set_driver(driver).map_err(|e| e.to_string())
    }

    fn cmd_brake(&mut self, args: &[&str]) -> Result<(), String> {
        let code: i32 = parse_arg(args, "usage: /brake <code>")?;
        let architecture = self.cfg.train.brake_architecture();
        let brake = decode_brake(code, architecture)
            .ok_or_else(|| format!("brake code {code} is not valid for {architecture:?}"))?;
        let mut driver = self.cycle.controls().driver;
        driver.brake = brake;
        self.cycle.set_driver(driver).map_err(|e| e.to_string())
    }

    fn cmd_reverser(&mut self, args: &[&str]) -> Result<(), String> {
        let position: i32 = parse_arg(args, "usage: /reverser <-1|0|1>")?;
        if !(-1..=1).contains(&position) {
            return Err("reverser must be -1, 0 or 1".to_string());
        }
        let mut driver = self.cycle.controls().driver;
        driver.reverser = position;
        self.cycle.set_driver(driver).map_err(|e| e.to_string())
    }

    fn cmd_const_speed(&mut self, args: &[&str]) -> Result<(), String> {
        let on = match args.first().copied() {
            Some("on") => true,
            Some("off") => false,
            _ => return Err("usage: /constspeed <on|off>".to_string()),
        };
        let mut driver = self.cycle.controls().driver;
        driver.const_speed = on;
        self.cycle.set_driver(driver).map_err(|e| e.to_string())
    }

    fn cmd_key(&mut self, args: &[&str]) -> Result<(), String> {
        let key = args
            .first()
            .and_then(|name| VirtualKey::from_name(name))
            .ok_or("usage: /key <S|A1|A2|B1|B2|C1|C2|D..L> [down|up]")?;
        let result = match args.get(1).copied() {
            Some("down") => self.cycle.key_down(key),
            Some("up") => self.cycle.key_up(key),
            _ => self.cycle.key_down(key).and_then(|()| self.cycle.key_up(key)),
        };
        result.map_err(|e| e.to_string())
    }

    fn cmd_horn(&mut self, args: &[&str]) -> Result<(), String> {
        let horn = args
            .first()
            .and_then(|s| parse_horn(s))
            .ok_or("usage: /horn <primary|secondary|music>")?;
        self.cycle.horn_blow(horn).map_err(|e| e.to_string())
    }

    fn cmd_door(&mut self, args: &[&str]) -> Result<(), String> {
        let doors = args
            .first()
            .and_then(|s| parse_doors(s))
            .ok_or("usage: /door <none|left|right|both>")?;
        self.cycle.door_change(doors).map_err(|e| e.to_string())
    }

    fn cmd_beacon(&mut self, args: &[&str]) -> Result<(), String> {
        const USAGE: &str = "usage: /beacon <kind> <section> [optional]";
        let kind: i32 = parse_arg(args, USAGE)?;
        let section: i32 = parse_arg(args.get(1..).unwrap_or_default(), USAGE)?;
        let optional: i32 = match args.get(2) {
            Some(raw) => raw.parse().map_err(|_| USAGE.to_string())?,
            None => 0,
        };
        let position = self.position();
        self.cycle
            .beacon(self.route.as_slice(), &position, kind, section, optional)
            .map_err(|e| e.to_string())
    }

    fn cmd_jump(&mut self, args: &[&str]) -> Result<(), String> {
        let location: f64 = parse_arg(args, "usage: /jump <meters>")?;
        self.cycle.begin_jump(self.cfg.start_mode).map_err(|e| e.to_string())?;
        self.state.location = location;
        self.state.speed_mps = 0.0;
        self.place_train();
        self.cycle.end_jump();
        Ok(())
    }

    fn cmd_status(&self) {
        let manager = self.cycle.manager();
        let status = Status {
            mode: manager.safety_mode(),
            lifecycle: manager.state(),
            plugin: manager.session().map(|s| s.title()),
            location_m: self.state.location,
            speed_kmh: self.state.speed_mps * 3.6,
            time_s: self.state.total_time_s,
            section: self.current_section(),
            controls: self.cycle.controls(),
            last_tick: self.last_report.as_ref(),
            panel: manager
                .session()
                .map(|s| {
                    s.panel()
                        .iter()
                        .copied()
                        .enumerate()
                        .filter(|&(_, v)| v != 0)
                        .collect()
                })
                .unwrap_or_default(),
        };
        match serde_json::to_string_pretty(&status) {
            Ok(json) => println!("{json}"),
            Err(e) => println!("{}: {}", "Error".red(), e),
        }
    }

    // ── simulation helpers ──────────────────────────────────────────────────

    fn current_section(&self) -> Option<usize> {
        self.route
            .iter()
            .rposition(|s| s.track_position <= self.state.location)
    }

    fn position(&self) -> TrainPosition {
        TrainPosition {
            train: PLAYER,
            current_section: self.current_section(),
            reference_point: self.state.location,
        }
    }

    /// Record the player train in the section it currently occupies.
    fn place_train(&mut self) {
        let current = self.current_section();
        for (index, section) in self.route.iter_mut().enumerate() {
            section.trains.retain(|&t| t != PLAYER);
            if Some(index) == current {
                section.trains.push(PLAYER);
            }
        }
    }

    /// Aspect of the signal protecting the next section.
    fn signal_ahead(&self) -> i32 {
        self.current_section()
            .and_then(|i| self.route.section(i))
            .and_then(|s| s.next)
            .map(|next| section_signal_aspect(self.route.as_slice(), next))
            .unwrap_or(NO_SIGNAL_ASPECT)
    }

    fn flush_messages(&mut self) {
        for message in self.cycle.manager_mut().messages_mut().drain() {
            let label = match message.severity {
                MessageSeverity::Information => "info".normal(),
                MessageSeverity::Warning => "warning".yellow(),
                MessageSeverity::Error => "error".red(),
            };
            println!("  [{}] {}", label, message.text);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading stages
// ─────────────────────────────────────────────────────────────────────────────

enum LoadTarget {
    Builtin,
    Folder(PathBuf),
}

/// Loading work handed to the pipeline's worker thread.
struct ShellLoad {
    cycle: UpdateCycle<SimAudio>,
    route: Vec<Section>,
    target: LoadTarget,
    encoding: &'static Encoding,
    start: StartMode,
    loaded: bool,
}

impl StageRunner for ShellLoad {
    fn run(&mut self, stage: LoadingStage) -> Result<(), BridgeError> {
        match stage {
            LoadingStage::RouteParse => {
                self.route = demo_route();
                Ok(())
            }
            LoadingStage::TrainParse | LoadingStage::PanelParse | LoadingStage::ObjectPlacement => Ok(()),
            LoadingStage::PluginLoad => {
                self.loaded = match &self.target {
                    LoadTarget::Builtin => {
                        self.cycle
                            .load_module(Box::new(BuiltinModule::new()), self.start)?
                            == LoadOutcome::Successful
                    }
                    LoadTarget::Folder(folder) => self.cycle.load_from_train_folder(folder, self.encoding, self.start),
                };
                Ok(())
            }
        }
    }
}

/// Update cycle with no module loaded.
fn idle_cycle(cfg: &Config) -> UpdateCycle<SimAudio> {
    let manager = PluginManager::new().with_config_file_name(cfg.plugin_config_file.clone());
    UpdateCycle::new(manager, cfg.train.clone(), SimAudio::new())
}

/// Straight test track: five signals 600 m apart, the fourth showing red.
fn demo_route() -> Vec<Section> {
    const ASPECTS: [i32; 5] = [0, 1, 2, 3, 4];
    SimRoute::new()
        .with_section(0.0, &ASPECTS, Some(4))
        .with_section(600.0, &ASPECTS, Some(3))
        .with_section(1200.0, &ASPECTS, Some(1))
        .with_section(1800.0, &ASPECTS, Some(0))
        .with_section(2400.0, &ASPECTS, Some(4))
        .build()
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers without state
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "ATS Bridge Commands".bold().underline());
    println!("  {}  – load a train folder's module, or the built-in one", "/load <folder|builtin>".bold().cyan());
    println!("  {}                 – unload the module", "/unload".bold().cyan());
    println!("  {}               – advance the simulation", "/tick [n]".bold().cyan());
    println!("  {}            – set the speed", "/speed <km/h>".bold().cyan());
    println!("  {}   – driver handles", "/power /brake /reverser /constspeed".bold().cyan());
    println!("  {}       – keys, horn and doors", "/key /horn /door".bold().cyan());
    println!("  {}  – pass a beacon", "/beacon <kind> <section> [opt]".bold().cyan());
    println!("  {}          – move the train", "/jump <meters>".bold().cyan());
    println!("  {}       – bridge state / settings", "/status /config".bold().cyan());
    println!("  {}            – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_config(cfg: &Config) {
    match toml::to_string_pretty(cfg) {
        Ok(raw) => println!("{raw}"),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_arg<T: std::str::FromStr>(args: &[&str], usage: &str) -> Result<T, String> {
    args.first()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| usage.to_string())
}

fn parse_horn(raw: &str) -> Option<HornType> {
    match raw.to_ascii_lowercase().as_str() {
        "primary" => Some(HornType::Primary),
        "secondary" => Some(HornType::Secondary),
        "music" => Some(HornType::Music),
        _ => None,
    }
}

fn parse_doors(raw: &str) -> Option<DoorState> {
    match raw.to_ascii_lowercase().as_str() {
        "none" | "closed" => Some(DoorState::None),
        "left" => Some(DoorState::Left),
        "right" => Some(DoorState::Right),
        "both" => Some(DoorState::Both),
        _ => None,
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atsbridge_types::BrakeState;

    fn shell() -> Shell {
        Shell::new(Config::default(), &Signals::default())
    }

    #[test]
    fn builtin_module_follows_driver() {
        let mut sh = shell();
        assert_eq!(sh.execute("/load builtin"), Flow::Continue);
        assert_eq!(sh.cycle.manager().safety_mode(), SafetyMode::Plugin);

        sh.execute("/power 3");
        sh.execute("/brake 2");
        sh.execute("/tick 5");

        let report = sh.last_report.expect("ticked");
        assert_eq!(report.mode, SafetyMode::Plugin);
        assert_eq!(report.security.power, 3);
        assert_eq!(
            report.security.brake,
            BrakeState::Notched { notch: 2, hold: false, emergency: false }
        );
        assert!((sh.state.total_time_s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn folder_without_config_stays_builtin() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut sh = shell();
        sh.execute(&format!("/load {}", dir.path().display()));
        assert_eq!(sh.cycle.manager().safety_mode(), SafetyMode::Builtin);
        assert_eq!(sh.cycle.manager().state(), LifecycleState::Unloaded);
    }

    #[test]
    fn cancelled_load_leaves_no_module() {
        let signals = Signals::default();
        let mut sh = Shell::new(Config::default(), &signals);
        let job = ShellLoad {
            cycle: idle_cycle(&sh.cfg),
            route: Vec::new(),
            target: LoadTarget::Builtin,
            encoding: encoding_rs::UTF_8,
            start: StartMode::default(),
            loaded: false,
        };
        signals.cancel.store(true, Ordering::SeqCst);
        let (job, outcome) = sh.pipeline.spawn(job).unwrap().join().unwrap();
        assert_eq!(outcome, LoadingOutcome::Cancelled { completed: vec![] });
        assert!(!job.loaded);
        assert!(job.cycle.manager().session().is_none());

        // /load clears the flag left by an earlier interrupt.
        sh.execute("/load builtin");
        assert_eq!(sh.cycle.manager().safety_mode(), SafetyMode::Plugin);
        assert!(!signals.loading.load(Ordering::SeqCst));
    }

    #[test]
    fn load_runs_on_worker_and_hands_state_back() {
        let mut sh = shell();
        sh.execute("/jump 700");
        sh.execute("/load builtin");
        assert_eq!(sh.cycle.manager().state(), LifecycleState::Active);
        assert_eq!(sh.route.len(), 5);
        assert_eq!(sh.current_section(), Some(1));
        assert!(sh.route[1].is_occupied_by(PLAYER));

        // A second load replaces the first module.
        sh.execute("/load builtin");
        assert_eq!(sh.cycle.manager().safety_mode(), SafetyMode::Plugin);
        assert!(sh.cycle.manager().session().is_some());
    }

    #[test]
    fn signal_ahead_follows_location() {
        let mut sh = shell();
        assert_eq!(sh.current_section(), Some(0));
        assert_eq!(sh.signal_ahead(), 3);
        sh.execute("/jump 1300");
        assert_eq!(sh.current_section(), Some(2));
        assert_eq!(sh.signal_ahead(), 0);
        assert!(sh.route[2].is_occupied_by(PLAYER));
        assert!(!sh.route[0].is_occupied_by(PLAYER));
        sh.execute("/jump 5000");
        assert_eq!(sh.signal_ahead(), NO_SIGNAL_ASPECT);
    }

    #[test]
    fn invalid_brake_code_is_rejected() {
        let mut sh = shell();
        let before = sh.cycle.controls().driver;
        sh.execute("/brake 42");
        assert_eq!(sh.cycle.controls().driver, before);
    }

    #[test]
    fn quit_and_unknown_commands() {
        let mut sh = shell();
        assert_eq!(sh.execute("/frobnicate"), Flow::Continue);
        assert_eq!(sh.execute("   "), Flow::Continue);
        assert_eq!(sh.execute("/exit"), Flow::Quit);
    }

    #[test]
    fn word_parsers() {
        assert_eq!(parse_horn("Music"), Some(HornType::Music));
        assert_eq!(parse_horn("siren"), None);
        assert_eq!(parse_doors("both"), Some(DoorState::Both));
        assert_eq!(parse_doors("closed"), Some(DoorState::None));
        assert_eq!(parse_arg::<i32>(&["-1"], "usage"), Ok(-1));
        assert_eq!(parse_arg::<i32>(&[], "usage"), Err("usage".to_string()));
    }
}
