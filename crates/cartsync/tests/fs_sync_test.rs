use cartsync::api::{Engine, RefreshSource};
use cartsync::codec::HEADER;
use cartsync::model::{Feature, PickedRemote, Record};
use cartsync::remote::FsRemote;
use cartsync::settings::{JsonKvStore, KvStore, PENDING_SYNC_KEY};
use cartsync::store::backend::Handle;
use cartsync::store::fs_backend::FsBackend;
use cartsync::store::record_store::MirrorOutcome;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn engine(data: &Path) -> Engine {
    let kv = Arc::new(JsonKvStore::open(data.join("settings.json")).unwrap());
    Engine::new(
        Arc::new(FsBackend::new()),
        Arc::new(FsRemote::new()),
        kv,
        Handle::from_path(&data.join("documents")),
        Duration::from_secs(30),
    )
    .unwrap()
}

fn local_file(data: &Path) -> PathBuf {
    data.join("documents").join("shopping_list.csv")
}

#[test]
fn test_append_read_remove_on_disk() {
    let data = TempDir::new().unwrap();
    let list = engine(data.path()).list(Feature::shopping_list());

    list.append(
        Record::new("Milk")
            .with_id("1")
            .quantity("2")
            .store("Market")
            .price("3.50")
            .added_by("Alice"),
    )
    .unwrap();
    list.append(Record::new("Bread").with_id("2").added_by("Bob"))
        .unwrap();
    list.remove_by_id("1").unwrap();

    let on_disk = fs::read_to_string(local_file(data.path())).unwrap();
    assert_eq!(on_disk, format!("{HEADER}\n2,Bread,1,,,Bob\n"));
    let names: Vec<String> = list
        .read_all(true)
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["Bread"]);
}

#[test]
fn test_awkward_fields_survive_disk() {
    let data = TempDir::new().unwrap();
    let list = engine(data.path()).list(Feature::shopping_list());
    let awkward = Record::new("Eggs, \"free range\"\nlarge")
        .with_id("x")
        .store("Corner, Shop");
    list.append(awkward.clone()).unwrap();

    let fresh = engine(data.path()).list(Feature::shopping_list());
    assert_eq!(fresh.read_all(false).unwrap(), vec![awkward]);
}

#[test]
fn test_directory_in_place_of_file_is_replaced() {
    let data = TempDir::new().unwrap();
    fs::create_dir_all(local_file(data.path()).join("junk")).unwrap();
    let list = engine(data.path()).list(Feature::shopping_list());

    list.append(Record::new("Milk")).unwrap();

    let path = local_file(data.path());
    assert!(path.is_file());
    assert!(fs::read_to_string(path).unwrap().starts_with(HEADER));
}

#[test]
fn test_configured_location() {
    let data = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let list = engine(data.path()).list(Feature::shopping_list());

    list.set_location(elsewhere.path().to_str().unwrap()).unwrap();
    list.append(Record::new("Milk")).unwrap();

    assert!(elsewhere.path().join("shopping_list.csv").is_file());
    assert!(!local_file(data.path()).exists());
    assert_eq!(list.file_info().unwrap().item_count, 1);
}

#[test]
fn test_mirror_round_trip_through_remote_file() {
    let data = TempDir::new().unwrap();
    let cloud = TempDir::new().unwrap();
    let remote_path = cloud.path().join("groceries.csv");
    fs::write(&remote_path, format!("{HEADER}\n1,Milk,2,,,Alice\n")).unwrap();
    let remote_uri = format!("file://{}", remote_path.display());

    let list = engine(data.path()).list(Feature::shopping_list());
    list.attach_remote(&PickedRemote::new(&remote_uri, "Groceries"))
        .unwrap();
    assert_eq!(list.read_all(false).unwrap().len(), 1);

    let outcome = list.append(Record::new("Bread")).unwrap();
    assert_eq!(outcome, MirrorOutcome::Pushed);
    assert_eq!(
        fs::read_to_string(&remote_path).unwrap(),
        fs::read_to_string(local_file(data.path())).unwrap()
    );

    // Another device edits the remote.
    fs::write(&remote_path, format!("{HEADER}\n9,Tea,1,,,Carol\n")).unwrap();
    let refresh = list.refresh().unwrap();
    assert_eq!(refresh.source, RefreshSource::Remote);
    assert_eq!(refresh.records[0].name, "Tea");
}

#[test]
fn test_append_after_pulling_remote_without_final_newline() {
    let data = TempDir::new().unwrap();
    let cloud = TempDir::new().unwrap();
    let remote = cloud.path().join("list.csv");
    fs::write(&remote, format!("{HEADER}\n1,Milk,2,Market,3.50,Alice")).unwrap();
    let list = engine(data.path()).list(Feature::shopping_list());

    list.attach_remote(&PickedRemote::new(remote.to_str().unwrap(), "list.csv"))
        .unwrap();
    list.append(Record::new("Bread").with_id("2")).unwrap();

    let records = list.read_all(true).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].added_by, "Alice");
    assert_eq!(records[1].name, "Bread");
    assert_eq!(
        fs::read_to_string(local_file(data.path())).unwrap(),
        format!("{HEADER}\n1,Milk,2,Market,3.50,Alice\n2,Bread,1,,,\n")
    );
    assert_eq!(
        fs::read_to_string(&remote).unwrap(),
        fs::read_to_string(local_file(data.path())).unwrap()
    );
}

#[test]
fn test_unreachable_remote_is_retried_after_restart() {
    let data = TempDir::new().unwrap();
    let cloud = TempDir::new().unwrap();
    let cloud_dir = cloud.path().join("drive");
    fs::create_dir(&cloud_dir).unwrap();
    let remote_path = cloud_dir.join("list.csv");
    fs::write(&remote_path, format!("{HEADER}\n")).unwrap();
    let remote_uri = remote_path.to_str().unwrap().to_string();
    let feature = Feature::shopping_list();

    {
        let engine = engine(data.path());
        let list = engine.list(feature.clone());
        list.attach_remote(&PickedRemote::new(&remote_uri, "list.csv"))
            .unwrap();

        fs::remove_dir_all(&cloud_dir).unwrap();
        assert_eq!(
            list.append(Record::new("Milk")).unwrap(),
            MirrorOutcome::Queued
        );
        assert!(list.is_pending());
    }

    let kv = JsonKvStore::open(data.path().join("settings.json")).unwrap();
    assert_eq!(
        kv.get(PENDING_SYNC_KEY).unwrap().as_deref(),
        Some("[\"shopping_list\"]")
    );

    fs::create_dir(&cloud_dir).unwrap();
    let engine = engine(data.path());
    let connectivity = cartsync::triggers::Notifier::new();
    let foreground = cartsync::triggers::Notifier::new();
    let report = engine.start(&connectivity, &foreground).unwrap();

    assert_eq!(report.synced, vec![feature.clone()]);
    assert!(!engine.queue().is_pending(&feature));
    assert!(fs::read_to_string(&remote_path).unwrap().contains("Milk"));
}

#[test]
fn test_failed_attach_leaves_settings_untouched() {
    let data = TempDir::new().unwrap();
    let cloud = TempDir::new().unwrap();
    let missing = cloud.path().join("nope.csv");
    let list = engine(data.path()).list(Feature::shopping_list());

    let result = list.attach_remote(&PickedRemote::new(missing.to_str().unwrap(), "nope"));

    assert!(result.is_err());
    assert_eq!(list.remote().unwrap(), None);
    assert!(!list.is_mirrored().unwrap());
}
