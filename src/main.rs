//! Headless demo: trains on a synthetic camera and races a scripted driver.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use lightsout::camera::{GestureControl, SyntheticCamera};
use lightsout::app_dirs;
use lightsout::config;
use lightsout::label::Label;
use lightsout::logging;
use lightsout::ml::EpochReport;
use lightsout::session::{
    ClassifierState, RoundOutcome, Session, SessionEvent, SystemState, TrainerEvent,
};

/// Frames to wait after switching gesture before capturing.
const SETTLE_FRAMES: u32 = 3;
const CAMERA_TIMEOUT: Duration = Duration::from_secs(5);
const TRAINING_TIMEOUT: Duration = Duration::from_secs(120);
/// Give up on a round this long after lights out.
const ROUND_TIMEOUT: Duration = Duration::from_secs(5);

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

struct CliOptions {
    home: Option<PathBuf>,
    config_path: Option<PathBuf>,
    rounds: usize,
    jump_start_round: Option<usize>,
    seed: Option<u64>,
    json: bool,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Some(home) = &options.home {
        app_dirs::set_config_base_override(home.clone());
    }
    let mut config = match &options.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    if options.seed.is_some() {
        config.training.seed = options.seed;
    }
    if let Err(err) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {err}");
    }

    let camera = SyntheticCamera::new(&config.camera);
    let gesture = camera.gesture();
    let settle = Duration::from_secs_f64(f64::from(SETTLE_FRAMES) / f64::from(config.camera.fps.max(1)));
    let refresh = Duration::from_millis(config.prediction.refresh_interval_ms.max(1));
    let mut session = Session::with_default_models(config, Box::new(camera));
    session
        .acquire_camera()
        .map_err(|err| format!("Camera unavailable: {err}"))?;
    wait_for_camera(&mut session, refresh)?;

    for label in Label::ALL {
        gesture.set(label);
        session.start_capture(label, Instant::now() + settle);
        drain_timers(&mut session, refresh);
        let counts = session.training_set().counts();
        println!("Captured {label}: {} examples", counts.get(label));
    }
    report_status(&session, options.json)?;

    train(&mut session)?;
    report_status(&session, options.json)?;

    let mut rng = rand::rng();
    for round in 1..=options.rounds {
        let jump_start = options.jump_start_round == Some(round);
        let reaction = Duration::from_millis(rng.random_range(150..=400));
        match run_round(&mut session, &gesture, refresh, reaction, jump_start) {
            Some(RoundOutcome::Qualified { elapsed_ms }) => {
                println!("Round {round}: qualified in {elapsed_ms} ms");
            }
            Some(RoundOutcome::Disqualified) => println!("Round {round}: disqualified (jump start)"),
            None => println!("Round {round}: no reaction detected"),
        }
        report_status(&session, options.json)?;
    }

    session.shutdown();
    Ok(())
}

fn wait_for_camera(session: &mut Session, refresh: Duration) -> Result<(), String> {
    let deadline = Instant::now() + CAMERA_TIMEOUT;
    loop {
        session.tick(Instant::now());
        match session.status().camera_status {
            SystemState::DriverCameraReady => return Ok(()),
            SystemState::Error => return Err("Camera failed".to_string()),
            _ if Instant::now() >= deadline => {
                return Err("Camera produced no frames".to_string());
            }
            _ => thread::sleep(refresh),
        }
    }
}

/// Tick until every scheduled capture has fired.
fn drain_timers(session: &mut Session, refresh: Duration) {
    while let Some(deadline) = session.next_deadline() {
        let now = Instant::now();
        if deadline > now {
            thread::sleep((deadline - now).min(refresh));
        }
        session.tick(Instant::now());
    }
}

fn train(session: &mut Session) -> Result<(), String> {
    session
        .train()
        .map_err(|err| format!("Training rejected: {err}"))?;
    for event in session.wait_for_training(TRAINING_TIMEOUT) {
        match event {
            SessionEvent::Training(TrainerEvent::Epoch(EpochReport { epoch, metrics })) => {
                println!(
                    "Epoch {epoch}: loss {:.4}, accuracy {:.2}",
                    metrics.loss, metrics.accuracy
                );
            }
            SessionEvent::Training(TrainerEvent::Failed(err)) => {
                return Err(format!("Training failed: {err}"));
            }
            _ => {}
        }
    }
    if session.classifier_state() != ClassifierState::Ready {
        return Err("Training did not finish".to_string());
    }
    Ok(())
}

fn run_round(
    session: &mut Session,
    gesture: &GestureControl,
    refresh: Duration,
    reaction: Duration,
    jump_start: bool,
) -> Option<RoundOutcome> {
    gesture.set(Label::Hold);
    let started = Instant::now();
    session.start_round(started);
    let mut ready_at: Option<Instant> = None;
    loop {
        let now = Instant::now();
        for event in session.tick(now) {
            match event {
                SessionEvent::Ready => ready_at = session.ready_at(),
                SessionEvent::RoundFinished(outcome) => return Some(outcome),
                _ => {}
            }
        }
        if jump_start && now >= started + Duration::from_secs(1) {
            gesture.set(Label::Go);
        }
        if let Some(ready_at) = ready_at {
            if now >= ready_at + reaction {
                gesture.set(Label::Go);
            }
            if now >= ready_at + ROUND_TIMEOUT {
                return None;
            }
        }
        thread::sleep(refresh);
    }
}

fn report_status(session: &Session, json: bool) -> Result<(), String> {
    let status = session.status();
    if json {
        let line = serde_json::to_string(&status).map_err(|err| err.to_string())?;
        println!("{line}");
    } else {
        println!(
            "Status: {:?} (HOLD {}, GO {})",
            status.overall(),
            status.training_counts.hold,
            status.training_counts.go
        );
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        home: None,
        config_path: None,
        rounds: 3,
        jump_start_round: None,
        seed: None,
        json: false,
    };
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--home" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--home requires a value".to_string())?;
                options.home = Some(PathBuf::from(value));
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--rounds" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--rounds requires a value".to_string())?;
                options.rounds = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --rounds value: {value}"))?;
            }
            "--jump-start" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--jump-start requires a value".to_string())?;
                options.jump_start_round = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --jump-start value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                options.seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            "--json" => options.json = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "lightsout",
        "",
        "Trains a HOLD/GO classifier on a synthetic camera and races a scripted driver.",
        "",
        "Usage:",
        "  lightsout [--home <dir>] [--config <path>] [--rounds <n>] [--jump-start <round>] [--seed <n>] [--json]",
        "",
        "Options:",
        "  --home <dir>         Base directory for .lightsout (config and logs).",
        "  --config <path>      Config file (default: <config dir>/.lightsout/config.toml).",
        "  --rounds <n>         Number of rounds to race (default: 3).",
        "  --jump-start <round> Show GO one second into that round's countdown.",
        "  --seed <n>           Fixed seed for shuffling and weight init.",
        "  --json               Print status snapshots as JSON lines.",
    ]
    .join("\n")
}
