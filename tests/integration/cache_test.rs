//! Cache persistence across runs and concurrent writers

use std::fs;
use std::sync::Arc;
use std::thread;

use codelens::analyzer::fingerprint::fingerprint_bytes;
use codelens::analyzer::{AnalysisCache, Fingerprint};
use tempfile::TempDir;

#[test]
fn entries_survive_reload() {
    let temp = TempDir::new().unwrap();
    let cache_path = temp.path().join("state").join("cache.json");
    let report = temp.path().join("a.py.md");
    fs::write(&report, "# report").unwrap();

    let cache = AnalysisCache::load(&cache_path);
    assert!(cache.is_empty());
    cache.record("a.py", fingerprint_bytes(b"print(1)"), report.clone());
    cache.persist().unwrap();

    let reloaded = AnalysisCache::load(&cache_path);
    let entry = reloaded.lookup("a.py").unwrap();
    assert_eq!(entry.fingerprint, fingerprint_bytes(b"print(1)"));
    assert_eq!(entry.report_path, report);
    assert!(AnalysisCache::is_fresh(&entry, &fingerprint_bytes(b"print(1)")));
    assert!(!AnalysisCache::is_fresh(&entry, &fingerprint_bytes(b"print(2)")));
}

#[test]
fn corrupt_cache_file_loads_empty() {
    let temp = TempDir::new().unwrap();
    let cache_path = temp.path().join("cache.json");
    fs::write(&cache_path, "{ not json").unwrap();

    let cache = AnalysisCache::load(&cache_path);
    assert!(cache.is_empty());

    // Still usable and overwrites the bad file
    cache.record("x.py", fingerprint_bytes(b"x"), temp.path().join("x.md"));
    cache.persist().unwrap();
    assert_eq!(AnalysisCache::load(&cache_path).len(), 1);
}

#[test]
fn error_sentinel_is_never_fresh() {
    let temp = TempDir::new().unwrap();
    let report = temp.path().join("r.md");
    fs::write(&report, "r").unwrap();
    let cache = AnalysisCache::new(temp.path().join("cache.json"));
    cache.record("r.py", Fingerprint::error(), report);

    let entry = cache.lookup("r.py").unwrap();
    assert!(!AnalysisCache::is_fresh(&entry, &Fingerprint::error()));
}

#[test]
fn concurrent_record_and_persist_keep_every_entry() {
    let temp = TempDir::new().unwrap();
    let cache_path = temp.path().join("cache.json");
    let cache = Arc::new(AnalysisCache::new(&cache_path));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let dir = temp.path().to_path_buf();
            thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("t{}/f{}.py", t, i);
                    cache.record(&key, fingerprint_bytes(key.as_bytes()), dir.join(&key));
                    cache.persist().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reloaded = AnalysisCache::load(&cache_path);
    assert_eq!(reloaded.len(), 200);
    let entry = reloaded.lookup("t3/f7.py").unwrap();
    assert_eq!(entry.fingerprint, fingerprint_bytes(b"t3/f7.py"));
}

#[test]
fn clear_removes_entries_and_file() {
    let temp = TempDir::new().unwrap();
    let cache_path = temp.path().join("cache.json");
    let cache = AnalysisCache::new(&cache_path);
    cache.record("a.py", fingerprint_bytes(b"a"), temp.path().join("a.md"));
    cache.record("b.py", fingerprint_bytes(b"b"), temp.path().join("b.md"));
    cache.persist().unwrap();

    assert_eq!(cache.clear().unwrap(), 2);
    assert!(cache.is_empty());
    assert!(!cache_path.exists());
}
