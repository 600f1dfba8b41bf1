//! End-to-end integration tests: whole-engine workloads across flushes,
//! restarts, and table boundaries.

use rand::Rng;
use rand::seq::SliceRandom;
use stratumdb::engine::{Engine, EngineConfig};
use stratumdb::types::{PrimitiveType, Value};
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

fn init_tracing() {
    let _ = Subscriber::builder()
        .with_max_level(Level::INFO)
        .try_init();
}

fn u64_config(memtable_threshold: usize, size: usize) -> EngineConfig {
    EngineConfig {
        size,
        block_size: 16,
        key_type: PrimitiveType::U64,
        value_type: PrimitiveType::U64,
        memtable_threshold,
        ..EngineConfig::default()
    }
}

#[test]
fn test_sustained_writes_roll_tables_and_stay_readable() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let mut engine = Engine::open(tmp.path(), u64_config(64, 1000)).unwrap();

    for i in 0..500u64 {
        engine.put(Value::U64(i), Value::U64(i * 3)).unwrap();
    }

    let stats = engine.stats();
    assert!(stats.table_count >= 7, "expected several flushes, got {}", stats.table_count);

    for i in 0..500u64 {
        assert_eq!(
            engine.get(&Value::U64(i)).unwrap(),
            Some(Value::U64(i * 3)),
            "key {i}"
        );
    }
    assert_eq!(engine.get(&Value::U64(500)).unwrap(), None);
}

#[test]
fn test_random_overwrites_resolve_to_latest() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let mut engine = Engine::open(tmp.path(), u64_config(32, 1000)).unwrap();
    let mut rng = rand::rng();

    let mut expected = std::collections::HashMap::new();
    for _ in 0..400 {
        let key = rng.random_range(0..50u64);
        let value = rng.random_range(0..1_000_000u64);
        engine.put(Value::U64(key), Value::U64(value)).unwrap();
        expected.insert(key, value);
    }

    for (key, value) in &expected {
        assert_eq!(
            engine.get(&Value::U64(*key)).unwrap(),
            Some(Value::U64(*value)),
            "key {key}"
        );
    }
}

#[test]
fn test_interleaved_deletes_across_flush_boundaries() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let mut engine = Engine::open(tmp.path(), u64_config(16, 1000)).unwrap();

    for i in 0..100u64 {
        engine.put(Value::U64(i), Value::U64(i)).unwrap();
    }
    for i in (0..100u64).step_by(2) {
        engine.delete(Value::U64(i)).unwrap();
    }

    for i in 0..100u64 {
        let found = engine.get(&Value::U64(i)).unwrap();
        if i % 2 == 0 {
            assert_eq!(found, None, "key {i} should be deleted");
        } else {
            assert_eq!(found, Some(Value::U64(i)), "key {i} should survive");
        }
    }
}

#[test]
fn test_restart_preserves_full_state() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    {
        let mut engine = Engine::open(tmp.path(), u64_config(32, 1000)).unwrap();
        for i in 0..120u64 {
            engine.put(Value::U64(i), Value::U64(i + 1000)).unwrap();
        }
        for i in 0..20u64 {
            engine.delete(Value::U64(i * 5)).unwrap();
        }
        engine.close().unwrap();
    }

    let mut engine = Engine::open(tmp.path(), u64_config(32, 1000)).unwrap();
    for i in 0..120u64 {
        let found = engine.get(&Value::U64(i)).unwrap();
        if i % 5 == 0 && i < 100 {
            assert_eq!(found, None, "key {i} was deleted before restart");
        } else {
            assert_eq!(found, Some(Value::U64(i + 1000)), "key {i}");
        }
    }
}

#[test]
fn test_several_restarts_with_writes_between() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    for round in 0..5u64 {
        let mut engine = Engine::open(tmp.path(), u64_config(16, 1000)).unwrap();
        for i in 0..30u64 {
            engine
                .put(Value::U64(round * 100 + i), Value::U64(round))
                .unwrap();
        }
        // Half the rounds crash (drop), half close cleanly.
        if round % 2 == 0 {
            engine.close().unwrap();
        }
    }

    let mut engine = Engine::open(tmp.path(), u64_config(16, 1000)).unwrap();
    for round in 0..5u64 {
        for i in 0..30u64 {
            assert_eq!(
                engine.get(&Value::U64(round * 100 + i)).unwrap(),
                Some(Value::U64(round)),
                "round {round} key {i}"
            );
        }
    }
}

#[test]
fn test_string_valued_store_with_shuffled_inserts() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let config = EngineConfig {
        size: 1000,
        block_size: 8,
        key_type: PrimitiveType::U32,
        value_type: PrimitiveType::Str(24),
        memtable_threshold: 20,
        ..EngineConfig::default()
    };
    let mut engine = Engine::open(tmp.path(), config).unwrap();

    let mut keys: Vec<u32> = (0..100).collect();
    keys.shuffle(&mut rand::rng());
    for key in &keys {
        engine
            .put(Value::U32(*key), Value::Str(format!("value-{key}")))
            .unwrap();
    }

    for key in 0..100u32 {
        assert_eq!(
            engine.get(&Value::U32(key)).unwrap(),
            Some(Value::Str(format!("value-{key}"))),
            "key {key}"
        );
    }
}

#[test]
fn test_table_collaborator_surface() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let mut engine = Engine::open(tmp.path(), u64_config(10, 1000)).unwrap();
    for i in 0..10u64 {
        engine.put(Value::U64(i), Value::U64(i)).unwrap();
    }
    assert_eq!(engine.stats().table_count, 1);

    // The per-table surface a compactor consumes.
    let table = &mut engine.tables_mut()[0];
    assert_eq!(table.len(), 10);
    assert_eq!(table.min_key(), Some(&Value::U64(0)));
    assert_eq!(table.max_key(), Some(&Value::U64(9)));
    assert!(table.path().exists());

    let first = table.read_first_n(3).unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].key(), &Value::U64(0));

    let all = table.read_all().unwrap();
    assert_eq!(all.len(), 10);

    assert!(table.may_have(&Value::U64(5)));
    assert!(table.has(&Value::U64(5)).unwrap());
    assert!(table.ping().is_some());
}
