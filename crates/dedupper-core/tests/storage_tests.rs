use dedupper_core::config::PHashConfig;
use dedupper_core::model::{ClassifyType, FileRecord, FileState};
use dedupper_core::storage::{sqlite::database_path, Database, Store};
use dedupper_core::AppConfig;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn make_image(hash: &str, p_hash: &str, ratio: f64, from: &str) -> FileRecord {
    FileRecord {
        hash: hash.to_string(),
        p_hash: Some(p_hash.to_string()),
        d_hash: Some(p_hash.to_string()),
        width: 300,
        height: 200,
        ratio,
        damaged: false,
        size: 50_000,
        timestamp: 1_600_000_000_000,
        name: format!("{}.jpg", hash),
        from_path: PathBuf::from(from),
        to_path: PathBuf::from(format!("/library/image/{}.jpg", hash)),
        file_type: ClassifyType::Image,
        state: FileState::Accepted,
    }
}

fn image_db() -> Database {
    Database::open_in_memory(ClassifyType::Image, PHashConfig::default()).unwrap()
}

#[test]
fn test_insert_and_query_by_hash() {
    let db = image_db();
    db.insert(&make_image("aaa", "1", 1.5, "/in/a.jpg"), true).unwrap();

    let row = db.query_by_hash("aaa").unwrap().unwrap();
    assert_eq!(row.state, FileState::Accepted);
    assert_eq!(row.to_path, PathBuf::from("/library/image/aaa.jpg"));
    assert_eq!(row.p_hash_distance, None);
    assert!(db.query_by_hash("bbb").unwrap().is_none());
    assert!(db.query_by_hash("").unwrap().is_none());
}

#[test]
fn test_insert_rejects_image_without_numeric_hashes() {
    let db = image_db();
    let mut record = make_image("aaa", "1", 1.5, "/in/a.jpg");
    record.p_hash = Some("not-a-number".to_string());
    assert!(matches!(
        db.insert(&record, true),
        Err(dedupper_core::Error::InvalidRecord(_))
    ));
    record.p_hash = None;
    assert!(db.insert(&record, true).is_err());
    assert_eq!(db.count().unwrap(), 0);
}

#[test]
fn test_video_rows_need_no_perceptual_hash() {
    let db = Database::open_in_memory(ClassifyType::Video, PHashConfig::default()).unwrap();
    let mut record = make_image("vid", "1", 1.0, "/in/v.mp4");
    record.file_type = ClassifyType::Video;
    record.p_hash = None;
    record.d_hash = None;
    record.name = "v.mp4".to_string();
    db.insert(&record, true).unwrap();
    assert_eq!(db.query_by_name("v.mp4").unwrap().len(), 1);
    assert!(db.query_by_name("other.mp4").unwrap().is_empty());
}

#[test]
fn test_insert_strips_markers_from_source() {
    let db = image_db();
    db.insert(&make_image("aaa", "1", 1.5, "/in/photo.!hr2.jpg"), true)
        .unwrap();
    let row = db.query_by_hash("aaa").unwrap().unwrap();
    assert_eq!(row.from_path, PathBuf::from("/in/photo.jpg"));
}

#[test]
fn test_upsert_and_ignore() {
    let db = image_db();
    let mut record = make_image("aaa", "1", 1.5, "/in/a.jpg");
    db.insert(&record, true).unwrap();

    record.state = FileState::Keeping;
    db.insert(&record, false).unwrap();
    assert_eq!(db.query_by_hash("aaa").unwrap().unwrap().state, FileState::Accepted);

    db.insert(&record, true).unwrap();
    assert_eq!(db.query_by_hash("aaa").unwrap().unwrap().state, FileState::Keeping);
    assert_eq!(db.count().unwrap(), 1);
}

#[test]
fn test_query_by_p_hash_window_threshold_and_order() {
    let db = image_db();
    // distances from "0": 3 -> 2 bits, 1 -> 1 bit, 4095 -> 12 bits
    db.insert(&make_image("two", "3", 1.5, "/a/two.jpg"), true).unwrap();
    db.insert(&make_image("one", "1", 1.52, "/a/one.jpg"), true).unwrap();
    db.insert(&make_image("far", "4095", 1.5, "/a/far.jpg"), true).unwrap();
    db.insert(&make_image("wide", "1", 1.7, "/a/wide.jpg"), true).unwrap();
    let mut blocked = make_image("blocked", "0", 1.5, "/a/blocked.jpg");
    blocked.state = FileState::Blocked;
    db.insert(&blocked, true).unwrap();

    let hits = db
        .query_by_p_hash("0", Some("0"), 1.5, Path::new("/in/q.jpg"))
        .unwrap();
    let hashes: Vec<&str> = hits.iter().map(|h| h.hash.as_str()).collect();
    assert_eq!(hashes, vec!["one", "two"]);
    assert_eq!(hits[0].p_hash_distance, Some(1));
    assert_eq!(hits[1].p_hash_distance, Some(2));
    assert_eq!(hits[1].d_hash_distance, Some(2));
    for hit in &hits {
        assert!((hit.ratio - 1.5).abs() <= PHashConfig::default().ratio_epsilon);
    }
}

#[test]
fn test_query_by_p_hash_without_d_hash_has_no_d_distance() {
    let db = image_db();
    db.insert(&make_image("one", "1", 1.5, "/a/one.jpg"), true).unwrap();
    let hits = db.query_by_p_hash("0", None, 1.5, Path::new("/in/q.jpg")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].p_hash_distance, Some(1));
    assert_eq!(hits[0].d_hash_distance, None);
}

#[test]
fn test_query_by_p_hash_ignores_same_dir() {
    let search = PHashConfig {
        ignore_same_dir: true,
        ..PHashConfig::default()
    };
    let db = Database::open_in_memory(ClassifyType::Image, search).unwrap();
    db.insert(&make_image("same", "1", 1.5, "/in/same.jpg"), true).unwrap();
    db.insert(&make_image("other", "1", 1.5, "/other/x.jpg"), true).unwrap();
    let hits = db.query_by_p_hash("0", Some("0"), 1.5, Path::new("/in/q.jpg")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].hash, "other");
}

#[test]
fn test_update_state_and_delete() {
    let db = image_db();
    db.insert(&make_image("aaa", "1", 1.5, "/in/a.jpg"), true).unwrap();
    assert_eq!(db.update_state("aaa", FileState::Deduped).unwrap(), 1);
    assert_eq!(db.query_by_hash("aaa").unwrap().unwrap().state, FileState::Deduped);
    db.delete("aaa").unwrap();
    db.delete("aaa").unwrap();
    assert!(db.query_by_hash("aaa").unwrap().is_none());
}

#[test]
fn test_store_files_per_type_and_dry_run() {
    let tmp = tempdir().unwrap();
    let config = AppConfig {
        db_base_path: tmp.path().join("db"),
        ..AppConfig::default()
    };
    let store = Store::new(&config);
    store
        .with_database(ClassifyType::Image, |db| {
            db.insert(&make_image("aaa", "1", 1.5, "/in/a.jpg"), true)
        })
        .unwrap();
    assert!(database_path(&config.db_base_path, ClassifyType::Image).exists());
    let count = store
        .with_database(ClassifyType::Image, |db| db.count())
        .unwrap();
    assert_eq!(count, 1);
    let videos = store
        .with_database(ClassifyType::Video, |db| db.count())
        .unwrap();
    assert_eq!(videos, 0);

    let dry = Store::new(&AppConfig {
        dry_run: true,
        ..config.clone()
    });
    dry.with_database(ClassifyType::Image, |db| {
        db.insert(&make_image("bbb", "1", 1.5, "/in/b.jpg"), true)?;
        db.delete("aaa")
    })
    .unwrap();
    let count = store
        .with_database(ClassifyType::Image, |db| db.count())
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_truncate() {
    let db = image_db();
    db.insert(&make_image("aaa", "1", 1.5, "/in/a.jpg"), true).unwrap();
    db.truncate().unwrap();
    assert_eq!(db.count().unwrap(), 0);
}
