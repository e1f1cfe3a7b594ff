use tempfile::tempdir;

use uma_stable::autoplay::Autopilot;
use uma_stable::character::{Character, Stat};
use uma_stable::config::Config;
use uma_stable::session::{Phase, SessionController, SessionKind, SessionPlan, SessionResult};
use uma_stable::store::{KeyValueStore, ResultSink, SqliteStore, Stable, RACE_HISTORY_KEY, SPRINT_HISTORY_KEY};

fn autoplay_sprint(character: Character, duration_ms: u64) -> SessionResult {
    let mut cfg = Config {
        countdown_secs: 0,
        ..Config::default()
    };
    cfg.sprint.duration_ms = duration_ms;
    let mut session = SessionController::new(cfg).with_seed(1);
    session.start(SessionPlan::Sprint, character, 0.0).unwrap();
    let mut pilot = Autopilot::new(1, 1.0);
    let mut t = 0.0;
    while session.phase() != Phase::Finished {
        session.on_tick(t);
        if pilot.decide(&session, t) {
            session.on_player_action(t);
        }
        t += 16.0;
    }
    session.result().cloned().unwrap()
}

#[test]
fn sprint_result_survives_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("state").join("stable.db");

    let result = {
        let mut stable = Stable::open(SqliteStore::open(&db).unwrap()).unwrap();
        let special = stable.find("special-week").unwrap().clone();
        let result = autoplay_sprint(special, 12_000);
        stable.apply_result(&result).unwrap();
        result
    };
    // a perfect sprint: +10 speed and no stamina change
    assert_eq!(result.percentages.good, 100);
    assert_eq!(result.stat_changes.get(&Stat::Speed), Some(&10));

    let stable = Stable::open(SqliteStore::open(&db).unwrap()).unwrap();
    let special = stable.find("special-week").unwrap();
    assert_eq!(special.base_stats.speed, 90);
    assert_eq!(special.xp, 20);

    let history = stable.history(SessionKind::Sprint);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, result.id);
    assert_eq!(history[0].score, result.score);
    assert_eq!(history[0].date, result.date);
    assert!(stable.store().get(SPRINT_HISTORY_KEY).unwrap().is_some());
    assert!(stable.store().get(RACE_HISTORY_KEY).unwrap().is_none());
}

#[test]
fn sprint_history_is_newest_first() {
    let dir = tempdir().unwrap();
    let mut stable = Stable::open(SqliteStore::open(dir.path().join("stable.db")).unwrap()).unwrap();
    let vodka = stable.find("vodka").unwrap().clone();

    let first = autoplay_sprint(vodka.clone(), 500);
    let second = autoplay_sprint(vodka, 500);
    stable.apply_result(&first).unwrap();
    stable.apply_result(&second).unwrap();

    let ids: Vec<&str> = stable
        .history(SessionKind::Sprint)
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    assert_eq!(stable.all_history().len(), 2);
    assert_eq!(stable.summary(SessionKind::Sprint).count, 2);
}

#[test]
fn csv_export_writes_one_row_per_session() {
    let dir = tempdir().unwrap();
    let mut stable = Stable::open(SqliteStore::open_in_memory().unwrap()).unwrap();
    let urara = stable.find("haru-urara").unwrap().clone();
    stable.apply_result(&autoplay_sprint(urara, 1_000)).unwrap();

    let path = dir.path().join("history.csv");
    stable
        .export_csv(std::fs::File::create(&path).unwrap())
        .unwrap();
    let mut rdr = csv::Reader::from_path(&path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(&headers[1], "kind");
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "Sprint");
    assert_eq!(&rows[0][2], "haru-urara");
}
