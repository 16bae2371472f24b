mod common;

use std::sync::Arc;

use common::{config_for, png, write_reference, FakeExtractor, FAILING_TAG};
use rollcall::{FaceExtractor, MatchPolicy, Presence, RecognitionError, Recognizer};

const ALICE: u8 = 1;
const BOB: u8 = 2;
const QUERY_NEAR_ALICE: u8 = 10;
const QUERY_NO_FACES: u8 = 11;
const QUERY_CROWD: u8 = 12;
const QUERY_WRONG_MODEL: u8 = 13;
const CAROL: u8 = 20;
const ALICE_ALT: u8 = 21;

fn extractor() -> FakeExtractor {
    FakeExtractor::new()
        .with(ALICE, &[&[6.0, 8.0]])
        .with(BOB, &[&[18.0, 24.0]])
        .with(CAROL, &[&[-6.0, -8.0]])
        .with(ALICE_ALT, &[&[600.0, 800.0]])
        .with(QUERY_NEAR_ALICE, &[&[0.0, 0.0]])
        .with(QUERY_CROWD, &[&[5.0, 8.0], &[6.0, 9.0], &[17.0, 24.0]])
        .with(QUERY_WRONG_MODEL, &[&[0.0, 0.0, 0.0]])
}

struct Fixture {
    _dir: tempfile::TempDir,
    extractor: Arc<FakeExtractor>,
    recognizer: Recognizer,
}

fn fixture(configure: impl FnOnce(&mut rollcall::config::Config)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    write_reference(dir.path(), "alice.png", ALICE);
    write_reference(dir.path(), "bob.png", BOB);

    let mut cfg = config_for(dir.path());
    configure(&mut cfg);

    let extractor = Arc::new(extractor());
    let recognizer = Recognizer::new(extractor.clone() as Arc<dyn FaceExtractor>, &cfg);
    Fixture {
        _dir: dir,
        extractor,
        recognizer,
    }
}

#[test]
fn recognizes_close_identity_only() {
    let f = fixture(|_| {});
    let result = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();

    assert_eq!(result.identities(), vec!["alice"]);
    assert_eq!(result.presence(), Presence::Present);
    assert_eq!(result.recognized()[0].distance, 10.0);
}

#[test]
fn query_without_faces_is_absent_and_skips_gallery() {
    let f = fixture(|_| {});
    let result = f.recognizer.recognize(&png(QUERY_NO_FACES)).unwrap();

    assert!(result.is_empty());
    assert_eq!(result.presence(), Presence::Absent);
    // Only the query image went through the extractor.
    assert_eq!(f.extractor.calls(), 1);
}

#[test]
fn corrupted_query_is_an_error_not_absent() {
    let f = fixture(|_| {});
    let err = f.recognizer.recognize(b"\xff\xd8\xff garbage").unwrap_err();
    assert!(matches!(err, RecognitionError::ImageDecode(_)));
}

#[test]
fn extractor_failure_on_query_is_an_error() {
    let f = fixture(|_| {});
    let err = f.recognizer.recognize(&png(FAILING_TAG)).unwrap_err();
    assert!(matches!(err, RecognitionError::Extraction(_)));
}

#[test]
fn query_from_other_model_is_a_dimension_mismatch() {
    let f = fixture(|_| {});
    let err = f.recognizer.recognize(&png(QUERY_WRONG_MODEL)).unwrap_err();
    assert!(matches!(
        err,
        RecognitionError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    ));
}

#[test]
fn crowd_reports_each_identity_once() {
    let f = fixture(|_| {});
    let result = f.recognizer.recognize(&png(QUERY_CROWD)).unwrap();

    assert_eq!(result.identities(), vec!["alice", "bob"]);
    assert_eq!(result.face_count(), 3);
}

#[test]
fn threshold_comes_from_config() {
    let f = fixture(|cfg| cfg.matching.threshold = 5.0);
    let result = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert!(result.is_empty());

    let f = fixture(|cfg| cfg.matching.threshold = 40.0);
    let result = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(result.identities(), vec!["alice", "bob"]);
}

#[test]
fn nearest_policy_picks_single_identity() {
    let f = fixture(|cfg| {
        cfg.matching.threshold = 40.0;
        cfg.matching.policy = MatchPolicy::NearestWithinThreshold;
    });
    let result = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(result.identities(), vec!["alice"]);
}

#[test]
fn duplicate_identity_keeps_first_reference() {
    let f = fixture(|_| {});
    // The "alice" folder sorts before "alice.png", so its photo wins.
    write_reference(f.recognizer.references_dir(), "alice/other.png", ALICE_ALT);

    let gallery = f.recognizer.gallery().unwrap();
    assert_eq!(gallery.identities(), vec!["alice", "bob"]);
    assert_eq!(
        gallery.get("alice").unwrap().embedding.to_vec(),
        vec![600.0, 800.0]
    );

    let result = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert!(result.is_empty());
}

#[test]
fn unusable_references_are_skipped() {
    let f = fixture(|_| {});
    let refs = f.recognizer.references_dir().to_path_buf();
    std::fs::write(refs.join("corrupt.jpg"), b"not a jpeg").unwrap();
    write_reference(&refs, "faceless.png", QUERY_NO_FACES);
    write_reference(&refs, "exploding.png", FAILING_TAG);
    write_reference(&refs, "carol/1.png", CAROL);

    let gallery = f.recognizer.gallery().unwrap();
    assert_eq!(gallery.identities(), vec!["alice", "bob", "carol"]);

    let result = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(result.identities(), vec!["alice", "carol"]);
}

#[test]
fn cached_gallery_is_reused_until_references_change() {
    let f = fixture(|_| {});
    f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    // query + 2 references
    assert_eq!(f.extractor.calls(), 3);
    assert_eq!(f.recognizer.cached_gallery_size(), Some(2));

    f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(f.extractor.calls(), 4);

    write_reference(f.recognizer.references_dir(), "carol.png", CAROL);
    let result = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(f.extractor.calls(), 4 + 1 + 3);
    assert_eq!(result.identities(), vec!["alice", "carol"]);
    assert_eq!(f.recognizer.cached_gallery_size(), Some(3));
}

#[test]
fn uncached_recognizer_rebuilds_every_request() {
    let f = fixture(|cfg| cfg.cache.enabled = false);
    f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(f.extractor.calls(), 6);
    assert_eq!(f.recognizer.cached_gallery_size(), None);
}

#[test]
fn snapshot_spares_extractor_after_restart() {
    let snapshot_dir = tempfile::tempdir().unwrap();
    let snapshot = snapshot_dir.path().join("gallery.bin");

    let f = fixture(|cfg| cfg.cache.snapshot_path = Some(snapshot.clone()));
    f.recognizer.gallery().unwrap();
    assert_eq!(f.extractor.calls(), 2);
    assert!(snapshot.exists());

    let mut cfg = config_for(f.recognizer.references_dir());
    cfg.cache.snapshot_path = Some(snapshot.clone());
    let fresh = Arc::new(extractor());
    let restarted = Recognizer::new(fresh.clone() as Arc<dyn FaceExtractor>, &cfg);

    let result = restarted.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(result.identities(), vec!["alice"]);
    assert_eq!(fresh.calls(), 1);
}

#[test]
fn snapshot_is_rebuilt_after_extractor_settings_change() {
    let snapshot_dir = tempfile::tempdir().unwrap();
    let snapshot = snapshot_dir.path().join("gallery.bin");

    let f = fixture(|cfg| cfg.cache.snapshot_path = Some(snapshot.clone()));
    f.recognizer.gallery().unwrap();
    assert!(snapshot.exists());

    let mut cfg = config_for(f.recognizer.references_dir());
    cfg.cache.snapshot_path = Some(snapshot.clone());
    cfg.detector.normalize_embeddings = true;
    cfg.matching.threshold = 0.1;
    let unit = Arc::new(
        FakeExtractor::new()
            .with(ALICE, &[&[0.6, 0.8]])
            .with(BOB, &[&[0.8, 0.6]])
            .with(QUERY_NEAR_ALICE, &[&[0.6, 0.8]]),
    );
    let restarted = Recognizer::new(unit.clone() as Arc<dyn FaceExtractor>, &cfg);

    let gallery = restarted.gallery().unwrap();
    assert_eq!(
        gallery.get("alice").unwrap().embedding.to_vec(),
        vec![0.6, 0.8]
    );
    assert_eq!(unit.calls(), 2);

    let result = restarted.recognize(&png(QUERY_NEAR_ALICE)).unwrap();
    assert_eq!(result.identities(), vec!["alice"]);
}

#[test]
fn missing_reference_folder_is_an_error() {
    let f = fixture(|cfg| cfg.gallery.references_dir = "/nonexistent/rollcall".into());
    let err = f.recognizer.recognize(&png(QUERY_NEAR_ALICE)).unwrap_err();
    assert!(matches!(err, RecognitionError::References { .. }));
}
