use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::{
    error::Error,
    fs::File,
    io::{self, IsTerminal},
    path::PathBuf,
    time::Duration,
};
use uma_stable::{
    advisor::{hints_or_unavailable, opponents_or_fallback, Advisor, Hints, OpponentRequest, RuleBasedAdvisor},
    autoplay::Autopilot,
    beat::{BeatEvent, Judgement},
    character::{Character, RaceDistance},
    config::{Config, ConfigStore, FileConfigStore},
    runtime::{FixedTicker, HostClock, HostEvent, Runner, StdinEventSource},
    scoring::{Scorer, SessionReport, StatRaceEntry, StatRaceScorer},
    session::{ActionOutcome, SessionController, SessionEvent, SessionKind, SessionPlan, SessionResult},
    store::{ResultSink, SqliteStore, Stable},
};

const AUTOPLAY_ACCURACY: f64 = 0.8;

/// train and race a small stable of runners from the terminal
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Keep your runner's tension in the comfort zone during sprints, hit the beat in races, and watch the stable grow."
)]
pub struct Cli {
    /// stable database to use instead of the default state dir
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// config file to use instead of the default config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// more logging (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list the stable's runners
    Roster,
    /// tension sprint: tap to keep tension inside the comfort band
    Sprint {
        id: String,
        /// let the autopilot play, without waiting on real time
        #[arg(long)]
        autoplay: bool,
        #[arg(long)]
        seed: Option<u64>,
        /// override the sprint length for this run
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// beat race against generated opponents
    Race {
        id: String,
        #[arg(long, value_enum, default_value_t = RaceDistance::Mid)]
        distance: RaceDistance,
        /// settle the race on stats alone, no input
        #[arg(long)]
        formula: bool,
        #[arg(long)]
        autoplay: bool,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// past sessions, newest first
    History {
        /// write the history as CSV instead of printing it
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// strategy hints for a runner
    Hints { id: String },
    /// show the effective config
    Config {
        /// save it to the config file, filling in any missing keys
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let mut config = config_store.load();

    let db = match &cli.db {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };
    let mut stable = Stable::open(db)?;

    match cli.command {
        Command::Roster => print_roster(stable.roster()),
        Command::Sprint {
            id,
            autoplay,
            seed,
            duration_ms,
        } => {
            let character = stable.find(&id)?.clone();
            if let Some(d) = duration_ms {
                config.sprint.duration_ms = d;
            }
            ensure_interactive(autoplay);
            let seed = seed.unwrap_or_else(rand::random);
            let result = run_session(config, SessionPlan::Sprint, character, autoplay, seed)?;
            record(&mut stable, result)?;
        }
        Command::Race {
            id,
            distance,
            formula,
            autoplay,
            seed,
            duration_ms,
        } => {
            let character = stable.find(&id)?.clone();
            if let Some(d) = duration_ms {
                config.race.duration_ms = d;
            }
            let seed = seed.unwrap_or_else(rand::random);
            let advisor = RuleBasedAdvisor::new(seed);
            let request = OpponentRequest {
                count: config.race.opponents,
                distance,
            };
            let opponents = opponents_or_fallback(&advisor, &advisor, &request);

            let result = if formula {
                let report = SessionReport::StatRace(StatRaceEntry {
                    distance,
                    opponents,
                    seed,
                });
                let card = StatRaceScorer.score(&report, &character);
                Some(SessionResult::from_card(
                    card,
                    SessionKind::StatRace,
                    &character,
                    Some(distance),
                    0.0,
                ))
            } else {
                ensure_interactive(autoplay);
                let plan = SessionPlan::BeatRace {
                    distance,
                    opponents,
                };
                run_session(config, plan, character, autoplay, seed)?
            };
            record(&mut stable, result)?;
        }
        Command::History { csv } => match csv {
            Some(path) => {
                stable.export_csv(File::create(&path)?)?;
                println!("wrote {}", path.display());
            }
            None => print_history(&stable),
        },
        Command::Hints { id } => print_hints(stable.find(&id)?, &config),
        Command::Config { write: true } => {
            config_store.save(&config)?;
            println!("wrote {}", config_store.path().display());
        }
        Command::Config { write: false } => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn ensure_interactive(autoplay: bool) {
    if !autoplay && !io::stdin().is_terminal() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty (or pass --autoplay)")
            .exit();
    }
}

fn run_session(
    config: Config,
    plan: SessionPlan,
    character: Character,
    autoplay: bool,
    seed: u64,
) -> Result<Option<SessionResult>, Box<dyn Error>> {
    let tick = Duration::from_millis(config.tick_rate_ms.max(1));
    let mut session = SessionController::new(config).with_seed(seed);

    if autoplay {
        // synthetic clock: as fast as the CPU allows
        let step_ms = tick.as_secs_f64() * 1000.0;
        let mut pilot = Autopilot::new(seed, AUTOPLAY_ACCURACY);
        session.start(plan, character, 0.0)?;
        let mut t = 0.0;
        loop {
            for ev in session.on_tick(t) {
                if let SessionEvent::Finished(result) = ev {
                    return Ok(Some(*result));
                }
            }
            if pilot.decide(&session, t) {
                session.on_player_action(t);
            }
            t += step_ms;
        }
    }

    let runner = Runner::new(StdinEventSource::new(), FixedTicker::new(tick));
    let clock = HostClock::new();
    println!("Enter to act, q + Enter to give up");
    session.start(plan, character, clock.now_ms())?;
    if let Some(n) = session.countdown() {
        println!("{n}...");
    }

    loop {
        match runner.step() {
            HostEvent::Quit => {
                session.cancel();
                println!("session abandoned");
                return Ok(None);
            }
            HostEvent::Action => {
                if let Some(outcome) = session.on_player_action(clock.now_ms()) {
                    report_action(&outcome);
                }
            }
            HostEvent::Tick => {}
        }
        for ev in session.on_tick(clock.now_ms()) {
            match ev {
                SessionEvent::Finished(result) => return Ok(Some(*result)),
                other => report_event(&other),
            }
        }
    }
}

fn report_event(ev: &SessionEvent) {
    match ev {
        SessionEvent::Countdown(n) => println!("{n}..."),
        SessionEvent::Started => println!("Go!"),
        SessionEvent::ZoneChanged(zone) => println!("  tension {zone}"),
        SessionEvent::Beat(BeatEvent::BurstStarted { .. }) => println!("  BURST!"),
        SessionEvent::Beat(BeatEvent::BurstEnded) => println!("  burst spent"),
        SessionEvent::Beat(_) | SessionEvent::Finished(_) => {}
    }
}

fn report_action(outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Tension(t) => println!("  tension {t:.0}"),
        ActionOutcome::Beat { outcome, lane } => match (outcome.judgement, lane) {
            (Judgement::Hit, _) => println!("  on beat ({:.0}%)", outcome.progress * 100.0),
            (Judgement::Miss, Some(lane)) => println!("  off beat, drifted to lane {}", lane + 1),
            (Judgement::Miss, None) => println!("  off beat"),
        },
    }
}

fn record(stable: &mut Stable<SqliteStore>, result: Option<SessionResult>) -> Result<(), Box<dyn Error>> {
    let Some(result) = result else {
        return Ok(());
    };
    print_result(&result);
    stable.apply_result(&result)?;
    let c = stable.find(&result.character_id)?;
    println!(
        "  {} is level {} ({}/{} xp)",
        c.name, c.level, c.xp, c.xp_to_next_level
    );
    Ok(())
}

fn print_result(r: &SessionResult) {
    println!("{} finished a {}", r.character_name, r.kind);
    println!("  score {}", r.score);
    let p = r.percentages;
    println!("  good {}% / over {}% / under {}%", p.good, p.over, p.under);
    if !r.stat_changes.is_empty() {
        let changes = r
            .stat_changes
            .iter()
            .map(|(stat, delta)| format!("{stat} {delta:+}"))
            .join(", ");
        println!("  {changes}");
    }
    if let Some(place) = r.placement {
        println!("  placed {place} of {}", r.standings.len());
        for s in &r.standings {
            let you = if s.is_player { " (you)" } else { "" };
            println!("    {}. {}{you}", s.placement, s.name);
        }
    }
    println!("  +{} xp", r.xp_gained);
}

fn print_roster(roster: &[Character]) {
    for c in roster {
        let s = c.base_stats;
        println!(
            "{:<16} {:<18} Lv{:<3} SPD {:>3} STA {:>3} POW {:>3} TEC {:>3}  band {:.0}-{:.0}  {} / {}",
            c.id,
            c.name,
            c.level,
            s.speed,
            s.stamina,
            s.power,
            s.technique,
            c.comfort_min,
            c.comfort_max,
            c.temperament,
            c.trait_
        );
    }
}

fn print_history(stable: &Stable<SqliteStore>) {
    let all = stable.all_history();
    if all.is_empty() {
        println!("no sessions yet");
        return;
    }
    for r in all {
        let place = r.placement.map(|p| format!("#{p}")).unwrap_or_default();
        println!(
            "{}  {:<9} {:<16} {:>6} {}",
            r.date.format("%Y-%m-%d %H:%M"),
            r.kind.to_string(),
            r.character_id,
            r.score,
            place
        );
    }
    for kind in [SessionKind::Sprint, SessionKind::BeatRace] {
        let summary = stable.summary(kind);
        if let (Some(mean), Some(sd)) = (summary.mean_score, summary.std_dev) {
            println!(
                "{kind}: {} sessions, mean {mean:.1} (sd {sd:.1}), best {}",
                summary.count,
                summary.best.unwrap_or_default()
            );
        }
    }
}

fn print_hints(character: &Character, config: &Config) {
    let advisor = RuleBasedAdvisor::default();
    let distance = match hints_or_unavailable(&advisor, &character.base_stats) {
        Hints::Ready(h) => {
            println!(
                "{}: best over {} running {}",
                character.name, h.best_distance, h.preferred_style
            );
            println!("  {}", h.opponent_analysis);
            h.best_distance
        }
        Hints::Unavailable => {
            println!("hints unavailable");
            RaceDistance::Mid
        }
    };
    let request = OpponentRequest {
        count: config.race.opponents,
        distance,
    };
    for op in opponents_or_fallback(&advisor, &advisor, &request) {
        match advisor.counter_hint(&op.stats) {
            Ok(hint) => println!("  vs {}: {hint}", op.name),
            Err(e) => log::warn!("no counter hint for {}: {e}", op.name),
        }
    }
}
