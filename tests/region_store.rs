use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parkwatch::regions::{self, RegionError};
use parkwatch::{
    AnnotateOptions, Annotator, CachePolicy, DetectOptions, Detection, BoundingBox, Frame,
    FrameEngine, Point, Region, RegionCache, RegionSet, RegionStore, Session,
};

fn lot() -> RegionSet {
    RegionSet::from_regions([
        Region::new(
            "A",
            Some("near gate".to_string()),
            vec![
                Point::new(0.5, 0.25),
                Point::new(10.0, 0.0),
                Point::new(12.0, 6.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
        )
        .expect("pentagon"),
        Region::from_rect("B", None, Point::new(20.0, 0.0), Point::new(30.0, 10.0)).expect("rect"),
    ])
    .expect("lot")
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bounding_boxes.json");
    let set = lot();

    regions::save(&path, &set).expect("save");
    let loaded = regions::load(&path).expect("load");

    assert_eq!(loaded, set);
    assert_eq!(loaded.fingerprint(), set.fingerprint());
    assert_eq!(loaded.get("A").unwrap().points(), set.get("A").unwrap().points());
}

#[test]
fn two_point_region_document_fails_validation() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("regions.json");
    std::fs::write(&path, r#"{"regions": [{"id": "A", "points": [[0, 0], [10, 10]]}]}"#)
        .expect("write");

    let err = regions::load(&path).expect_err("two points");
    let region_err = err.downcast_ref::<RegionError>().expect("region error");
    assert!(region_err.is_validation());
}

#[test]
fn self_intersecting_region_fails_validation() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("regions.json");
    std::fs::write(
        &path,
        r#"{"regions": [{"id": "bowtie", "points": [[0, 0], [10, 10], [10, 0], [0, 10]]}]}"#,
    )
    .expect("write");

    let err = regions::load(&path).expect_err("bowtie");
    assert_eq!(
        err.downcast_ref::<RegionError>().map(RegionError::code),
        Some("REGION_VALIDATION")
    );
}

#[test]
fn concurrent_loads_never_see_partial_documents() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("regions.json");
    let small = RegionSet::from_regions([
        Region::from_rect("A", None, Point::new(0.0, 0.0), Point::new(5.0, 5.0)).unwrap(),
    ])
    .unwrap();
    let large = lot();
    regions::save(&path, &small).expect("initial save");

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let path = path.clone();
        let done = Arc::clone(&done);
        let (small, large) = (small.clone(), large.clone());
        thread::spawn(move || {
            for i in 0..200 {
                let set = if i % 2 == 0 { &large } else { &small };
                regions::save(&path, set).expect("save");
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut reads = 0;
    while !done.load(Ordering::SeqCst) || reads == 0 {
        let loaded = regions::load(&path).expect("load during rewrite");
        assert!(loaded == small || loaded == large);
        reads += 1;
    }
    writer.join().expect("writer thread");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn session_sees_region_edits_between_frames() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = RegionStore::new(dir.path().join("regions.json"));
    store.save(&lot()).expect("save");

    let engine = FrameEngine::new(DetectOptions::default(), Annotator::new(AnnotateOptions::default()));
    let mut session = Session::start(engine, RegionCache::from_store(store.clone(), CachePolicy::Cached));
    let car = Detection::new(BoundingBox::new(22.0, 2.0, 26.0, 6.0), 3, 0.9).with_track_id(5);

    let before = session.process(&Frame::blank(0, 40, 20), &[car.clone()]).unwrap();
    assert_eq!(before.summary.total, 2);
    assert_eq!(before.summary.occupied_ids, vec!["B".to_string()]);

    store
        .update(|set| {
            set.remove("B");
            Ok(())
        })
        .expect("edit");
    session.regions_changed();

    let after = session.process(&Frame::blank(1, 40, 20), &[car]).unwrap();
    assert_eq!(after.summary.total, 1);
    assert_eq!(after.summary.occupied, 0);
    assert!(session.region_state("B").is_none());
    assert_ne!(before.summary.regions_fingerprint, after.summary.regions_fingerprint);
}

#[test]
fn legacy_document_imports_as_slots() {
    let dir = tempfile::tempdir().expect("temp dir");
    let legacy = dir.path().join("bounding_boxes.json");
    std::fs::write(
        &legacy,
        r#"[{"points": [[10, 10], [10, 50], [60, 50], [60, 10]]}, {"points": [[70, 10], [120, 50]]}]"#,
    )
    .expect("write");

    let set = regions::load(&legacy).expect("legacy load");
    let converted = dir.path().join("regions.json");
    regions::save(&converted, &set).expect("save");

    let reloaded = regions::load(&converted).expect("reload");
    assert_eq!(reloaded.ids().collect::<Vec<_>>(), vec!["slot-1", "slot-2"]);
    assert!(reloaded.get("slot-2").unwrap().contains(Point::new(95.0, 30.0)));
    let raw = std::fs::read_to_string(&converted).unwrap();
    assert!(raw.contains("\"regions\""));
}
