use std::fs;

use parking_occupancy::{
    AnnotationSession, FileRegionStore, Point, PointerEvent, Region, RegionCollection, RegionStore,
};

fn sample() -> RegionCollection {
    vec![
        Region::new(10, 10, 50, 30).unwrap(),
        Region::new(-5, 40, 107, 48).unwrap(),
        Region::new(300, 200, 60, 110).unwrap(),
    ]
    .into()
}

#[test]
fn save_then_load_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileRegionStore::new(dir.path().join("spaces.json"));

    store.save(&sample()).unwrap();
    let loaded = store.load();
    assert_eq!(loaded, sample());

    store.save(&loaded).unwrap();
    assert_eq!(store.load(), sample());
}

#[test]
fn legacy_points_upgrade_once_and_stay_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CarParkPos.json");
    fs::write(&path, "[[100, 120], [5, 6, 70, 40], [1, 2, 3]]").unwrap();

    let mut store = FileRegionStore::new(&path);
    let first = store.load();
    assert_eq!(
        first.as_slice(),
        &[
            Region::new(100, 120, 50, 50).unwrap(),
            Region::new(5, 6, 70, 40).unwrap()
        ]
    );

    store.save(&first).unwrap();
    let second = store.load();
    assert_eq!(second, first);
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"version\": 1"));
}

#[test]
fn missing_or_corrupt_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut missing = FileRegionStore::new(dir.path().join("nothing-here.json"));
    assert!(missing.load().is_empty());

    let path = dir.path().join("garbage.json");
    fs::write(&path, b"\x00\x01pickle").unwrap();
    assert!(FileRegionStore::new(&path).load().is_empty());
}

#[test]
fn save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("lot").join("spaces.json");
    let mut store = FileRegionStore::new(&path);
    store.save(&sample()).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn unwritable_path_surfaces_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"file").unwrap();

    let mut store = FileRegionStore::new(blocker.join("spaces.json"));
    assert!(store.save(&sample()).is_err());
}

#[test]
fn annotation_drag_is_persisted_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spaces.json");

    let mut session = AnnotationSession::open(FileRegionStore::new(&path));
    session.handle(PointerEvent::Down(Point::new(10, 10))).unwrap();
    session.handle(PointerEvent::Move(Point::new(35, 22))).unwrap();
    let index = session.handle(PointerEvent::Up(Point::new(60, 40))).unwrap();
    assert_eq!(index, Some(0));

    let reloaded = FileRegionStore::new(&path).load();
    assert_eq!(reloaded.as_slice(), &[Region::new(10, 10, 50, 30).unwrap()]);

    // A fresh session continues after the stored spaces.
    let mut session = AnnotationSession::open(FileRegionStore::new(&path));
    let index = session.drag(Point::new(100, 10), Point::new(160, 120)).unwrap();
    assert_eq!(index, Some(1));
    assert_eq!(FileRegionStore::new(&path).load().len(), 2);
}

#[test]
fn newer_version_file_is_kept_aside_before_replacement() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spaces.json");
    let newer = r#"{"version":2,"regions":[[1,2,3,4],[5,6,7,8]]}"#;
    fs::write(&path, newer).unwrap();

    let mut session = AnnotationSession::open(FileRegionStore::new(&path));
    assert!(session.regions().is_empty());
    let index = session.drag(Point::new(10, 10), Point::new(60, 40)).unwrap();
    assert_eq!(index, Some(0));

    let backup = FileRegionStore::new(&path).backup_path();
    assert_eq!(backup, dir.path().join("spaces.json.bak"));
    assert_eq!(fs::read_to_string(&backup).unwrap(), newer);
    assert_eq!(
        FileRegionStore::new(&path).load().as_slice(),
        &[Region::new(10, 10, 50, 30).unwrap()]
    );
}

#[test]
fn corrupt_file_is_kept_aside_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CarParkPos.json");
    fs::write(&path, b"\x80\x04pickle").unwrap();

    let mut store = FileRegionStore::new(&path);
    let mut regions = store.load();
    store.append(&mut regions, Region::new(0, 0, 20, 20).unwrap()).unwrap();
    let backup = store.backup_path();
    assert_eq!(fs::read(&backup).unwrap(), b"\x80\x04pickle");

    // Later saves replace a readable file and leave the backup alone.
    fs::remove_file(&backup).unwrap();
    store.append(&mut regions, Region::new(30, 0, 20, 20).unwrap()).unwrap();
    assert!(!backup.exists());
    assert_eq!(store.load().len(), 2);
}

#[test]
fn readable_file_is_replaced_without_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spaces.json");
    let mut store = FileRegionStore::new(&path);
    store.save(&sample()).unwrap();

    let mut regions = store.load();
    store.append(&mut regions, Region::new(0, 0, 20, 20).unwrap()).unwrap();
    assert!(!store.backup_path().exists());
    assert_eq!(store.load().len(), 4);
}
