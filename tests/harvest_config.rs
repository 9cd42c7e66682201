// tests/harvest_config.rs
use member_harvester::config::{load_config_default, load_config_from};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("harvest.toml");
    fs::write(
        &p_toml,
        r#"
fixture_path = "fx.json"

[batch]
page_cap = 100
delay_ms = 250
"#,
    )
    .unwrap();
    let c = load_config_from(&p_toml).unwrap();
    assert_eq!(c.batch.paging().page_cap, 100);
    assert_eq!(c.batch.paging().delay, Duration::from_millis(250));
    assert_eq!(c.streaming.page_cap, 50);
    assert_eq!(c.fixture_path, PathBuf::from("fx.json"));

    let p_json = dir.path().join("harvest.json");
    fs::write(&p_json, r#"{"streaming": {"page_cap": 5, "delay_ms": 0}}"#).unwrap();
    let cj = load_config_from(&p_json).unwrap();
    assert_eq!(cj.streaming.page_cap, 5);
    assert_eq!(cj.batch.page_cap, 200);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "batch = 3").unwrap();
    assert!(load_config_from(&bad).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var("HARVEST_CONFIG_PATH");
    env::remove_var("HARVEST_FIXTURE_PATH");

    // 1) Nothing → defaults
    let d = load_config_default().unwrap();
    assert_eq!(d.batch.page_cap, 200);
    assert_eq!(d.streaming.delay_ms, 500);

    // 2) Fallback TOML in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("harvest.toml"), "[batch]\npage_cap = 7\n").unwrap();
    assert_eq!(load_config_default().unwrap().batch.page_cap, 7);

    // 3) Env wins
    let p_env = tmp.path().join("env.json");
    fs::write(&p_env, r#"{"batch": {"page_cap": 9}}"#).unwrap();
    env::set_var("HARVEST_CONFIG_PATH", p_env.display().to_string());
    assert_eq!(load_config_default().unwrap().batch.page_cap, 9);

    // 4) Env pointing nowhere is an error
    env::set_var("HARVEST_CONFIG_PATH", tmp.path().join("nope.toml"));
    assert!(load_config_default().is_err());
    env::remove_var("HARVEST_CONFIG_PATH");

    env::set_current_dir(&old).unwrap();
}
