use dedupper_core::config::LockConfig;
use dedupper_core::lock::{is_stale, FileLock, KeyLocks, LockCoordinator};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn fast_config(max_retries: u32, force: bool) -> LockConfig {
    LockConfig {
        poll_interval_ms: 5,
        max_retries,
        force,
        stale_ms: 600_000,
    }
}

#[test]
fn test_release_makes_key_acquirable() {
    let locks = KeyLocks::new(&fast_config(3, false));
    let guard = locks.acquire("hash:abc").unwrap();
    assert!(locks.is_held("hash:abc"));
    drop(guard);
    assert!(!locks.is_held("hash:abc"));
    let again = locks.try_acquire("hash:abc");
    assert!(again.is_some());
}

#[test]
fn test_held_key_times_out() {
    let locks = KeyLocks::new(&fast_config(3, false));
    let _guard = locks.acquire("path:/lib/a.jpg").unwrap();
    match locks.acquire("path:/lib/a.jpg") {
        Err(dedupper_core::Error::LockTimeout { key, attempts }) => {
            assert_eq!(key, "path:/lib/a.jpg");
            assert_eq!(attempts, 4);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn test_force_proceeds_without_exclusivity() {
    let locks = KeyLocks::new(&fast_config(2, true));
    let first = locks.acquire("hash:abc").unwrap();
    let forced = locks.acquire("hash:abc").unwrap();
    assert!(first.is_exclusive());
    assert!(!forced.is_exclusive());
    drop(forced);
    // the forced guard must not release the real owner's key
    assert!(locks.is_held("hash:abc"));
    drop(first);
    assert!(!locks.is_held("hash:abc"));
}

#[test]
fn test_waiter_gets_key_after_release() {
    let locks = KeyLocks::new(&fast_config(1000, false));
    let guard = locks.acquire("hash:abc").unwrap();
    let waiter = {
        let locks = locks.clone();
        thread::spawn(move || locks.acquire("hash:abc").map(|g| g.is_exclusive()))
    };
    thread::sleep(Duration::from_millis(30));
    drop(guard);
    assert!(waiter.join().unwrap().unwrap());
}

#[test]
fn test_acquire_many_skips_empty_and_duplicates() {
    let locks = KeyLocks::new(&fast_config(3, false));
    let guards = locks
        .acquire_many(&[
            "path:/b".to_string(),
            String::new(),
            "hash:a".to_string(),
            "path:/b".to_string(),
        ])
        .unwrap();
    let keys: Vec<&str> = guards.iter().map(|g| g.key()).collect();
    assert_eq!(keys, vec!["hash:a", "path:/b"]);
}

#[test]
fn test_file_lock_excludes_and_releases() {
    let tmp = tempdir().unwrap();
    let lock = FileLock::named(tmp.path(), "process", &fast_config(3, false));
    assert_eq!(lock.path(), tmp.path().join("process.dplock"));

    let guard = lock.try_acquire().unwrap().unwrap();
    assert!(lock.path().exists());
    assert!(lock.try_acquire().unwrap().is_none());
    let record = fs::read_to_string(lock.path()).unwrap();
    assert_eq!(
        record.lines().next(),
        Some(std::process::id().to_string().as_str())
    );
    drop(guard);
    assert_eq!(fs::read_to_string(lock.path()).unwrap(), "");
    assert!(lock.try_acquire().unwrap().is_some());
}

#[test]
fn test_stale_holder_is_displaced() {
    let tmp = tempdir().unwrap();
    let config = LockConfig {
        stale_ms: 5,
        ..fast_config(3, false)
    };
    let lock = FileLock::named(tmp.path(), "process", &config);
    let _held = lock.try_acquire().unwrap().unwrap();
    thread::sleep(Duration::from_millis(30));
    let reclaimed = lock.try_acquire().unwrap();
    assert!(reclaimed.is_some());
}

#[test]
fn test_live_holder_blocks_other_acquirers() {
    let tmp = tempdir().unwrap();
    let lock = FileLock::named(tmp.path(), "process", &fast_config(3, false));
    let held = lock.try_acquire().unwrap().unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(lock.try_acquire().unwrap().is_none());
    drop(held);
    assert!(lock.try_acquire().unwrap().is_some());
}

#[test]
fn test_stale_file_lock_is_reclaimed() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("process.dplock");
    fs::write(&path, "12345\n0\n").unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(is_stale(&path, Duration::from_millis(5)));
    assert!(!is_stale(Path::new("/nonexistent/x.dplock"), Duration::from_millis(5)));

    let config = LockConfig {
        stale_ms: 5,
        ..fast_config(3, false)
    };
    let lock = FileLock::new(path.clone(), &config);
    let guard = lock.try_acquire().unwrap();
    assert!(guard.is_some());
}

#[test]
fn test_write_lock_serializes_workers() {
    let tmp = tempdir().unwrap();
    let coordinator = Arc::new(LockCoordinator::new(tmp.path(), &fast_config(3, false)));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            thread::spawn(move || {
                for _ in 0..5 {
                    let _guard = coordinator.lock_write().unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read_to_string(tmp.path().join("process.dplock")).unwrap(), "");
}

#[test]
fn test_lock_file_keys() {
    let tmp = tempdir().unwrap();
    let coordinator = LockCoordinator::new(tmp.path(), &fast_config(2, false));
    let guards = coordinator
        .lock_file("abc", Path::new("/lib/image/a.jpg"))
        .unwrap();
    assert_eq!(guards.len(), 2);
    assert!(coordinator.keys().is_held("hash:abc"));
    assert!(coordinator
        .lock_file("abc", Path::new("/lib/image/b.jpg"))
        .is_err());
    drop(guards);
    assert!(coordinator
        .lock_file("abc", Path::new("/lib/image/b.jpg"))
        .is_ok());
}
