//! Integration tests for the config directory updater.

#![cfg(unix)]

use dynflag::prelude::*;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier, OnceLock, Weak};
use std::time::Duration;
use tempfile::TempDir;

const FIRST_GOOD_DIR: &str = "..9989_09_09_07_32_32.099817316";
const SECOND_GOOD_DIR: &str = "..9289_09_10_03_32_32.039823124";
const BAD_STATIC_DIR: &str = "..1289_09_10_03_32_32.039823124";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Fixture {
    _temp_dir: TempDir,
    mount: PathBuf,
    flags: Arc<FlagSet>,
    static_int: StaticValue<i64>,
    dyn_int: DynamicValue<i64>,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mount = temp_dir.path().join("testdata");
        fs::create_dir(&mount).unwrap();

        publish(&mount, FIRST_GOOD_DIR, &[("some_dynint", "10001\n"), ("some_int", "1234\n")]);
        publish(&mount, SECOND_GOOD_DIR, &[("some_dynint", "20002\n"), ("some_int", "1234\n")]);
        publish(&mount, BAD_STATIC_DIR, &[("some_dynint", "10001\n"), ("some_int", "12a34\n")]);
        link_data_dir(&mount, FIRST_GOOD_DIR);

        let flags = Arc::new(FlagSet::new("updater_test"));
        let dyn_int = flags
            .add_dynamic("some_dynint", 1i64, "dynamic int for testing")
            .unwrap();
        let static_int = flags
            .add_static("some_int", 1i64, "static int for testing")
            .unwrap();

        Self {
            _temp_dir: temp_dir,
            mount,
            flags,
            static_int,
            dyn_int,
        }
    }

    fn updater(&self) -> Updater {
        Updater::builder(self.flags.clone(), &self.mount)
            .with_poll_interval(POLL_INTERVAL)
            .with_event_wakeups(false)
            .build()
            .unwrap()
    }
}

fn publish(mount: &Path, dir: &str, files: &[(&str, &str)]) {
    let target = mount.join(dir);
    fs::create_dir(&target).unwrap();
    for (name, content) in files {
        fs::write(target.join(name), content).unwrap();
    }
}

/// Repoint `..data` the way the kubelet does: new link, then rename over the old one.
fn link_data_dir(mount: &Path, dir: &str) {
    let staging = mount.join("..data_tmp");
    symlink(dir, &staging).unwrap();
    fs::rename(&staging, mount.join("..data")).unwrap();
}

async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let step = timeout / 20;
    for _ in 0..20 {
        if check() {
            return true;
        }
        tokio::time::sleep(step).await;
    }
    check()
}

#[test]
fn test_initialize_fails_on_bad_formed_flag() {
    let fixture = Fixture::new();
    link_data_dir(&fixture.mount, BAD_STATIC_DIR);

    let updater = fixture.updater();
    let err = updater.initialize().unwrap_err();
    assert!(matches!(err, FlagError::Parse { ref flag, .. } if flag == "some_int"));
    assert_eq!(updater.state(), UpdaterState::Failed);
}

#[test]
fn test_initialize_sets_values() {
    let fixture = Fixture::new();
    let updater = fixture.updater();

    updater.initialize().unwrap();
    assert_eq!(fixture.static_int.get(), 1234);
    assert_eq!(fixture.dyn_int.get(), 10001);
    assert_eq!(updater.state(), UpdaterState::Initialized);
    assert_eq!(
        updater.resolved_dir().unwrap(),
        fixture.mount.join(FIRST_GOOD_DIR).canonicalize().unwrap()
    );
}

#[test]
fn test_initialize_fails_on_unknown_flag_after_applying_earlier_files() {
    let fixture = Fixture::new();
    publish(&fixture.mount, "..v_unknown", &[("some_dynint", "555"), ("zz_not_registered", "1")]);
    link_data_dir(&fixture.mount, "..v_unknown");

    let updater = fixture.updater();
    let err = updater.initialize().unwrap_err();
    assert!(matches!(err, FlagError::UnknownFlag(ref name) if name == "zz_not_registered"));
    // Files before the failing one stay applied.
    assert_eq!(fixture.dyn_int.get(), 555);
    assert!(updater.resolved_dir().is_none());
}

#[tokio::test]
async fn test_setup_function() {
    let fixture = Fixture::new();

    let updater = Updater::setup(fixture.flags.clone(), &fixture.mount).unwrap();
    assert_eq!(updater.state(), UpdaterState::Running);
    assert!(matches!(updater.initialize(), Err(FlagError::Lifecycle { .. })));
    assert!(matches!(updater.start(), Err(FlagError::Lifecycle { .. })));
    assert!(updater.stop().is_ok());
    assert!(updater.stop().is_ok());
    updater.shutdown().await.unwrap();
}

#[test]
fn test_start_outside_runtime() {
    let fixture = Fixture::new();
    let updater = fixture.updater();
    updater.initialize().unwrap();
    assert!(matches!(updater.start(), Err(FlagError::NoRuntime)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dynamic_updates_propagate() {
    let fixture = Fixture::new();
    let updater = fixture.updater();
    updater.initialize().unwrap();
    updater.start().unwrap();

    link_data_dir(&fixture.mount, SECOND_GOOD_DIR);
    let dyn_int = fixture.dyn_int.clone();
    assert!(
        eventually(Duration::from_secs(2), || dyn_int.get() == 20002).await,
        "some_dynint value should change to the value from the second directory"
    );

    updater.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bad_key_does_not_block_siblings() {
    let fixture = Fixture::new();
    let level = fixture
        .flags
        .add_dynamic("level", String::from("info"), "log level")
        .unwrap();
    let updater = fixture.updater();
    updater.initialize().unwrap();
    updater.start().unwrap();

    publish(
        &fixture.mount,
        "..v3",
        &[
            ("level", "debug\n"),
            ("some_dynint", "not a number"),
            ("unknown_key", "1"),
        ],
    );
    link_data_dir(&fixture.mount, "..v3");

    assert!(eventually(Duration::from_secs(2), || level.get() == "debug").await);
    assert_eq!(fixture.dyn_int.get(), 10001);
    assert_eq!(updater.state(), UpdaterState::Running);

    updater.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_broken_link_keeps_values_and_recovers() {
    let fixture = Fixture::new();
    let updater = fixture.updater();
    updater.initialize().unwrap();
    updater.start().unwrap();

    link_data_dir(&fixture.mount, "..does_not_exist");
    tokio::time::sleep(POLL_INTERVAL * 4).await;
    assert_eq!(fixture.dyn_int.get(), 10001);

    link_data_dir(&fixture.mount, SECOND_GOOD_DIR);
    let dyn_int = fixture.dyn_int.clone();
    assert!(eventually(Duration::from_secs(2), || dyn_int.get() == 20002).await);

    updater.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_updates_after_stop() {
    let fixture = Fixture::new();
    let updater = fixture.updater();
    updater.initialize().unwrap();
    updater.start().unwrap();
    updater.shutdown().await.unwrap();
    assert_eq!(updater.state(), UpdaterState::Stopped);

    link_data_dir(&fixture.mount, SECOND_GOOD_DIR);
    tokio::time::sleep(POLL_INTERVAL * 4).await;
    assert_eq!(fixture.dyn_int.get(), 10001);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dynamic_only_reloads_skip_static_flags() {
    let fixture = Fixture::new();
    let updater = Updater::builder(fixture.flags.clone(), &fixture.mount)
        .with_poll_interval(POLL_INTERVAL)
        .with_event_wakeups(false)
        .with_dynamic_only_reloads(true)
        .build()
        .unwrap();
    updater.initialize().unwrap();
    updater.start().unwrap();

    publish(&fixture.mount, "..v4", &[("some_dynint", "30003"), ("some_int", "4321")]);
    link_data_dir(&fixture.mount, "..v4");

    let dyn_int = fixture.dyn_int.clone();
    assert!(eventually(Duration::from_secs(2), || dyn_int.get() == 30003).await);
    assert_eq!(fixture.static_int.get(), 1234);

    updater.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notifier_fires_on_reload() {
    let fixture = Fixture::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _dyn_int = fixture.dyn_int.clone().with_notifier(move |old, new| {
        let _ = tx.send((*old, *new));
    });

    let updater = fixture.updater();
    updater.initialize().unwrap();
    assert_eq!(rx.recv().await, Some((1, 10001)));

    updater.start().unwrap();
    link_data_dir(&fixture.mount, SECOND_GOOD_DIR);
    let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
    assert_eq!(next.unwrap(), Some((10001, 20002)));

    updater.shutdown().await.unwrap();
}

#[test]
fn test_notifier_can_call_back_into_updater_during_initialize() {
    let fixture = Fixture::new();
    let updater = Arc::new(fixture.updater());
    let handle: Arc<OnceLock<Weak<Updater>>> = Arc::new(OnceLock::new());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let _dyn_int = fixture.dyn_int.clone().with_notifier({
        let handle = Arc::clone(&handle);
        let seen = Arc::clone(&seen);
        move |_, _| {
            if let Some(updater) = handle.get().and_then(Weak::upgrade) {
                seen.lock().push(updater.state());
                updater.stop().unwrap();
            }
        }
    });
    handle.set(Arc::downgrade(&updater)).unwrap();

    updater.initialize().unwrap();
    assert_eq!(*seen.lock(), vec![UpdaterState::Initializing]);
    assert_eq!(fixture.dyn_int.get(), 10001);
    // The stop issued mid-pass is not overwritten.
    assert_eq!(updater.state(), UpdaterState::Stopped);
    assert!(matches!(updater.start(), Err(FlagError::Lifecycle { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_stop() {
    let fixture = Fixture::new();
    let updater = Arc::new(fixture.updater());
    updater.initialize().unwrap();
    updater.start().unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let stoppers: Vec<_> = (0..2)
        .map(|_| {
            let updater = Arc::clone(&updater);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                updater.stop()
            })
        })
        .collect();
    for stopper in stoppers {
        assert!(stopper.join().unwrap().is_ok());
    }
    assert_eq!(updater.state(), UpdaterState::Stopped);

    updater.shutdown().await.unwrap();
    link_data_dir(&fixture.mount, SECOND_GOOD_DIR);
    tokio::time::sleep(POLL_INTERVAL * 4).await;
    assert_eq!(fixture.dyn_int.get(), 10001);
}

#[cfg(feature = "file-watch")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_events_wake_updater_early() {
    let fixture = Fixture::new();
    let updater = Updater::builder(fixture.flags.clone(), &fixture.mount)
        .with_poll_interval(Duration::from_secs(3600))
        .with_event_wakeups(true)
        .build()
        .unwrap();
    updater.initialize().unwrap();
    updater.start().unwrap();

    link_data_dir(&fixture.mount, SECOND_GOOD_DIR);
    let dyn_int = fixture.dyn_int.clone();
    assert!(eventually(Duration::from_secs(3), || dyn_int.get() == 20002).await);

    updater.shutdown().await.unwrap();
}
