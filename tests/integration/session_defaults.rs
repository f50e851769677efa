// Startup settings chosen from config file and preset file together

use hbctl::config::Config;
use hbctl::engine::{
    EncodeConfig, PostAction, PresetStore, encode_query, initial_config, save_user_defaults,
};
use tempfile::TempDir;

use crate::common::helpers::*;

#[test]
fn test_saved_defaults_survive_config_reload() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");

    let mut config = Config::load_from(&config_path).unwrap();
    config.presets.file = Some(dir.path().join("presets.dat"));
    config.defaults.after_encode = PostAction::Suspend;
    save_user_defaults(&mut config, &encode_query(&sample_config())).unwrap();
    config.save_to(&config_path).unwrap();

    let reloaded = Config::load_from(&config_path).unwrap();
    assert_eq!(reloaded, config);

    let store = PresetStore::open(reloaded.presets_path().unwrap());
    store.add("Normal", "-e xvid -b 900").unwrap();
    assert_eq!(initial_config(&reloaded, &store.snapshot()), sample_config());
}

#[test]
fn test_normal_preset_without_user_defaults() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.presets.file = Some(dir.path().join("presets.dat"));

    let store = PresetStore::open(config.presets_path().unwrap());
    assert_eq!(initial_config(&config, &store.snapshot()), EncodeConfig::default());

    store.add("Normal", "-e xvid -b 900").unwrap();
    assert_eq!(initial_config(&config, &store.snapshot()).bitrate(), Some(900));
}
