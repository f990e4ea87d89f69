use chrono::{DateTime, TimeZone, Utc};
use delaymon_agent::config::AgentConfig;
use delaymon_agent::runner::{build_dispatcher, build_engines, restore, run_tick, snapshot};
use delaymon_agent::state_store::JsonStateStore;
use delaymon_common::types::{DelayAlert, Direction};
use delaymon_notify::plugin::SinkRegistry;
use std::path::Path;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 8, 1, 15).unwrap()
}

fn write_queue(path: &Path) {
    std::fs::write(
        path,
        r#"[
            {"entity_id": 0, "status": "new", "date_time": "2024-05-06T08:00:00Z"},
            {"entity_id": 1, "status": "new", "date_time": "2024-05-06T08:00:00Z"},
            {"entity_id": 2, "status": "pending", "date_time": "2024-05-06T07:00:00Z",
             "analysis_end": "2024-05-06T08:01:00Z"}
        ]"#,
    )
    .unwrap();
}

fn config(dir: &Path) -> AgentConfig {
    let toml = format!(
        r#"
state_file = "{states}"

[[sinks]]
type = "json_lines"
config = {{ path = "{alerts}" }}

[[sinks]]
type = "no_such_sink"

[[rules]]
name = "global"
thresholds = "0:01:00=WARNING"
source = "{queue}"
entity = 0

[[rules]]
name = "per-machine"
thresholds = "0:00:30=WARNING;0:01:00=ERROR"
source = "{queue}"

[[rules]]
name = "broken"
thresholds = "0:01:00=WARNING"
margin = 150
source = "{queue}"
"#,
        states = dir.join("states.json").display(),
        alerts = dir.join("alerts.jsonl").display(),
        queue = dir.join("pending.json").display(),
    );
    toml::from_str(&toml).unwrap()
}

fn read_alerts(path: &Path) -> Vec<DelayAlert> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn tick_dispatches_and_skips_invalid_entries() {
    let dir = tempfile::tempdir().unwrap();
    write_queue(&dir.path().join("pending.json"));
    let config = config(dir.path());

    let mut engines = build_engines(&config.rules);
    assert_eq!(engines.len(), 2, "rule with margin 150 is skipped");

    let dispatcher = build_dispatcher(&config, &SinkRegistry::default());
    assert_eq!(dispatcher.sinks().len(), 1, "unknown sink type is skipped");

    let raised = run_tick(&mut engines, &dispatcher, config.max_alerts_per_tick, now()).await;
    // global: entity 0 at 75 s; per-machine: entities 0 and 1 at 75 s, 2 at 15 s.
    assert_eq!(raised, 3);

    let alerts = read_alerts(&dir.path().join("alerts.jsonl"));
    assert_eq!(alerts.len(), 3);
    assert!(alerts.iter().all(|a| a.direction == Direction::Down));
    assert_eq!(alerts[0].rule_name, "global");
    assert_eq!(alerts[0].label, "WARNING");
    assert_eq!(alerts[1].rule_name, "per-machine");
    assert_eq!(alerts[1].label, "ERROR");

    // Same ages again: nothing new.
    assert_eq!(run_tick(&mut engines, &dispatcher, 32, now()).await, 0);
}

#[tokio::test]
async fn restored_states_suppress_repeated_alerts() {
    let dir = tempfile::tempdir().unwrap();
    write_queue(&dir.path().join("pending.json"));
    let config = config(dir.path());
    let dispatcher = build_dispatcher(&config, &SinkRegistry::default());
    let store = JsonStateStore::new(config.state_file.clone().unwrap());

    let mut engines = build_engines(&config.rules);
    run_tick(&mut engines, &dispatcher, 32, now()).await;
    store.save(&snapshot(&engines)).unwrap();

    let mut restarted = build_engines(&config.rules);
    restore(&mut restarted, store.load().unwrap());
    assert_eq!(restarted[1].states().len(), 3);

    assert_eq!(run_tick(&mut restarted, &dispatcher, 32, now()).await, 0);
    assert_eq!(read_alerts(&dir.path().join("alerts.jsonl")).len(), 3);
}

#[tokio::test]
async fn max_alerts_per_tick_bounds_draining() {
    let dir = tempfile::tempdir().unwrap();
    write_queue(&dir.path().join("pending.json"));
    let config = config(dir.path());
    let dispatcher = build_dispatcher(&config, &SinkRegistry::default());
    let mut engines = build_engines(&config.rules);

    // One alert per engine per tick.
    assert_eq!(run_tick(&mut engines, &dispatcher, 1, now()).await, 2);
    assert_eq!(run_tick(&mut engines, &dispatcher, 1, now()).await, 1);
    assert_eq!(run_tick(&mut engines, &dispatcher, 1, now()).await, 0);
}
