use super::settings::Settings;
use super::{PublishMode, load_config};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.server.db_path, "lastsub_db");
    assert_eq!(settings.engine.backend_url, "ws://127.0.0.1:8080");
    assert_eq!(settings.engine.publish_mode, PublishMode::Acknowledged);
    assert_eq!(settings.log.level, "info");
}

#[test]
fn test_publish_mode_parsing() {
    assert_eq!(
        "fire_and_forget".parse::<PublishMode>(),
        Ok(PublishMode::FireAndForget)
    );
    assert_eq!(
        "Fire-And-Forget".parse::<PublishMode>(),
        Ok(PublishMode::FireAndForget)
    );
    assert_eq!("ack".parse::<PublishMode>(), Ok(PublishMode::Acknowledged));
    assert!("sometimes".parse::<PublishMode>().is_err());
    assert_eq!(PublishMode::FireAndForget.to_string(), "fire_and_forget");
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    temp_env::with_vars_unset(
        [
            "LASTSUB__SERVER__PORT",
            "LASTSUB__ENGINE__PUBLISH_MODE",
            "LASTSUB__LOG__LEVEL",
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg, Settings::default());
        },
    );
}

#[test]
#[serial]
fn test_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("LASTSUB__SERVER__PORT", Some("9100")),
            ("LASTSUB__SERVER__DB_PATH", Some("/tmp/lastsub-env")),
            ("LASTSUB__ENGINE__PUBLISH_MODE", Some("fire_and_forget")),
            ("LASTSUB__LOG__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.server.db_path, "/tmp/lastsub-env");
            assert_eq!(cfg.server.host, "127.0.0.1");
            assert_eq!(cfg.engine.publish_mode, PublishMode::FireAndForget);
            assert_eq!(cfg.log.level, "debug");
        },
    );
}

#[test]
#[serial]
fn test_invalid_publish_mode_is_rejected() {
    temp_env::with_var("LASTSUB__ENGINE__PUBLISH_MODE", Some("sometimes"), || {
        let err = load_config().expect_err("bad publish mode accepted");
        assert!(err.to_string().contains("sometimes"));
    });
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    // load_config reads config/default.* relative to the working directory
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [engine]
        backend_url = "ws://backend:9000"
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.db_path, "lastsub_db");
    assert_eq!(cfg.engine.backend_url, "ws://backend:9000");
    assert_eq!(cfg.engine.publish_mode, PublishMode::Acknowledged);
}
