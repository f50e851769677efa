// Preset catalog save/load workflows against real files

use hbctl::engine::{PresetCatalog, PresetStore, decode_query, encode_query};
use std::fs;
use std::sync::Arc;
use std::thread;

use crate::common::helpers::*;

#[test]
fn test_preset_roundtrip_through_file() {
    let (_dir, path) = temp_presets();
    let config = sample_config();

    let store = PresetStore::open(&path);
    store.add("Normal", &encode_query(&config)).unwrap();

    let reloaded = PresetCatalog::load(&path);
    let restored = reloaded.decode("Normal").unwrap().unwrap();
    assert_eq!(restored, config);
}

#[test]
fn test_missing_file_then_add_normal() {
    let (_dir, path) = temp_presets();
    let mut catalog = PresetCatalog::load(&path);
    assert!(catalog.is_empty());
    assert_eq!(catalog.default_preset_name(), None);

    catalog.add("Normal", "-e x264 -b 1500").unwrap();
    assert_eq!(catalog.default_preset_name(), Some("Normal"));
}

#[test]
fn test_replacing_preset_keeps_file_order() {
    let (_dir, path) = temp_presets();
    fs::write(&path, "Normal\t-b 1000\niPod\t-e x264b30 -b 700\nFilm\t-q 0.6\n").unwrap();

    let store = PresetStore::open(&path);
    store.add("iPod", "-e x264b30 -b 768 -I").unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "Normal\t-b 1000\niPod\t-e x264b30 -b 768 -I\nFilm\t-q 0.6\n"
    );
}

#[test]
fn test_corrupt_lines_do_not_lose_good_presets() {
    let (_dir, path) = temp_presets();
    fs::write(&path, "garbage without tab\nNormal\t-b 1000\n\t-b 5\n").unwrap();

    let catalog = PresetCatalog::load(&path);
    assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["Normal"]);
    assert_eq!(decode_query(catalog.apply("Normal").unwrap()).unwrap().bitrate(), Some(1000));
}

#[test]
fn test_failed_save_leaves_old_file() {
    let (dir, path) = temp_presets();
    let mut catalog = PresetCatalog::new();
    catalog.add("Normal", "-b 1000").unwrap();
    catalog.save(&path).unwrap();

    // A directory where the file should be makes the final rename fail
    let blocked = dir.path().join("blocked");
    fs::create_dir(&blocked).unwrap();
    assert!(catalog.save(&blocked).is_err());

    assert_eq!(fs::read_to_string(&path).unwrap(), "Normal\t-b 1000\n");
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 2, "temp file left behind: {:?}", leftovers);
}

#[test]
fn test_racing_add_and_reset_leave_consistent_file() {
    let (_dir, path) = temp_presets();
    let store = Arc::new(PresetStore::open(&path));

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                if i % 3 == 0 {
                    store.reset().unwrap();
                } else {
                    store.add(&format!("Preset {}", i), &format!("-b {}", 1000 + i)).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Whatever order they ran in, the file matches the in-memory catalog
    assert_eq!(PresetCatalog::load(&path), store.snapshot());
}
