//! Storage performance benchmarks
//!
//! Benchmarks for the hot paths of both backends:
//! - Appending a message
//! - Scanning with severity and source filters
//! - Counting over the timeline index
//! - Tailing the most recent messages
//!
//! Run with: cargo bench -p sevlog-storage

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sevlog_core::{EventStore, LevelId, MessageFilter, ScanOrder, SeverityRegistry};
use sevlog_storage::{
    InMemoryEventStore, InMemorySeverityRegistry, RedbEventStore, RedbSeverityRegistry,
    RedbStorage, RedbStorageConfig,
};
use tempfile::TempDir;

const PRELOADED: usize = 10_000;

fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn preload(store: &dyn EventStore, levels: &[LevelId]) {
    for i in 0..PRELOADED {
        let level = levels[i % levels.len()];
        let source = format!("worker-{}", i % 16);
        store
            .append(
                level,
                "object received from broker",
                Some(source.as_str()),
                base_time() + Duration::milliseconds(i as i64),
            )
            .unwrap();
    }
}

fn memory_store() -> (Vec<LevelId>, InMemoryEventStore) {
    let registry: Arc<dyn SeverityRegistry> = Arc::new(InMemorySeverityRegistry::new());
    let levels = registry
        .provision(&["DEBUG", "INFO", "WARNING", "ERROR"])
        .unwrap()
        .into_iter()
        .map(|level| level.id)
        .collect();
    (levels, InMemoryEventStore::new(registry))
}

fn redb_store(dir: &TempDir) -> (Vec<LevelId>, RedbEventStore) {
    let config = RedbStorageConfig {
        db_path: dir.path().join("bench.redb"),
        sync_on_write: false,
        ..Default::default()
    };
    let storage = Arc::new(RedbStorage::open(config).unwrap());
    let registry = RedbSeverityRegistry::new(storage.clone());
    let levels = registry
        .provision(&["DEBUG", "INFO", "WARNING", "ERROR"])
        .unwrap()
        .into_iter()
        .map(|level| level.id)
        .collect();
    (levels, RedbEventStore::new(storage))
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    let (levels, memory) = memory_store();
    group.bench_function("memory", |b| {
        b.iter(|| {
            memory
                .append(black_box(levels[1]), "pipeline tick", Some("bench"), Utc::now())
                .unwrap()
        })
    });

    let dir = TempDir::new().unwrap();
    let (levels, redb) = redb_store(&dir);
    group.bench_function("redb_eventual", |b| {
        b.iter(|| {
            redb.append(black_box(levels[1]), "pipeline tick", Some("bench"), Utc::now())
                .unwrap()
        })
    });

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let (memory_levels, memory) = memory_store();
    preload(&memory, &memory_levels);
    let dir = TempDir::new().unwrap();
    let (redb_levels, redb) = redb_store(&dir);
    preload(&redb, &redb_levels);

    let backends: [(&str, &dyn EventStore, LevelId); 2] = [
        ("memory", &memory, memory_levels[3]),
        ("redb", &redb, redb_levels[3]),
    ];

    let mut group = c.benchmark_group("query");
    for (name, store, error) in backends {
        let errors = MessageFilter::all().with_severity(error);
        group.bench_function(format!("{}_errors", name), |b| {
            b.iter(|| store.query(black_box(&errors)).unwrap().count())
        });

        let worker = MessageFilter::all().source_exact("worker-3").with_limit(100);
        group.bench_function(format!("{}_source_limit_100", name), |b| {
            b.iter(|| store.query(black_box(&worker)).unwrap().count())
        });

        group.bench_function(format!("{}_count_all", name), |b| {
            b.iter(|| store.count(black_box(&MessageFilter::all())).unwrap())
        });

        let tail = MessageFilter::all().with_limit(50);
        group.bench_function(format!("{}_tail_50", name), |b| {
            b.iter(|| {
                store
                    .scan(black_box(&tail), ScanOrder::Descending)
                    .unwrap()
                    .count()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_queries);

criterion_main!(benches);
