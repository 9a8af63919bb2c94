use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use tandem_collab::server::{process_submitted_record, DocumentRecords};
use tandem_collab::{
    HistoryMode, ServerConfig, ServerRecord, Service, ServiceConfig, SubmittedRecord, SyncMessage,
};
use tandem_core::{Changeset, Selection};
use uuid::Uuid;

/// Records holding `count` single-char appends by one author.
fn records_with(count: u64) -> DocumentRecords {
    let author = Uuid::new_v4();
    let mut records = DocumentRecords::new();
    for revision in 0..count {
        let len = revision as usize;
        let submitted = SubmittedRecord::new(
            revision,
            Changeset::insertion(len, len, "x").unwrap(),
            Selection::caret(len + 1),
            Selection::caret(len),
        );
        records.reconcile(author, &submitted).unwrap();
    }
    records
}

fn bench_reconcile_behind_head(c: &mut Criterion) {
    let records = records_with(100);
    let submitted = SubmittedRecord::new(
        0,
        Changeset::insertion(0, 0, "hello").unwrap(),
        Selection::caret(5),
        Selection::caret(0),
    );
    let author = Uuid::new_v4();

    c.bench_function("reconcile_100_behind", |b| {
        b.iter(|| black_box(process_submitted_record(author, black_box(&submitted), &records).unwrap()))
    });
}

fn bench_keystrokes(c: &mut Criterion) {
    c.bench_function("service_1k_keystrokes", |b| {
        b.iter_batched(
            || Service::new(Uuid::new_v4(), ServiceConfig::default()),
            |mut service| {
                for i in 0..1_000 {
                    let typing = Changeset::insertion(i, i, "a").unwrap();
                    service.add_local_typing(&typing, None, HistoryMode::Merge).unwrap();
                }
                black_box(service.view_text().len())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_external_over_pending(c: &mut Criterion) {
    let records = records_with(200);
    let externals: Vec<ServerRecord> = records.records().map(|r| ServerRecord::clone(r)).collect();

    c.bench_function("service_200_externals_with_pending", |b| {
        b.iter_batched(
            || {
                let mut service = Service::new(Uuid::new_v4(), ServiceConfig::default());
                let typing = Changeset::insertion(0, 0, "pending").unwrap();
                service.add_local_typing(&typing, None, HistoryMode::Yes).unwrap();
                service.submit_changes();
                let typing = Changeset::insertion(7, 7, " local").unwrap();
                service.add_local_typing(&typing, None, HistoryMode::Yes).unwrap();
                service
            },
            |mut service| {
                for record in &externals {
                    service.add_external_typing(record).unwrap();
                }
                black_box(service.server_revision())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_message_roundtrip(c: &mut Criterion) {
    let submitted = SubmittedRecord::new(
        42,
        Changeset::replacement(1_000, 100, 120, "replacement text").unwrap(),
        Selection::caret(116),
        Selection::new(100, 120),
    );
    let author = Uuid::new_v4();
    let doc = Uuid::new_v4();

    c.bench_function("submit_message_roundtrip", |b| {
        b.iter(|| {
            let msg = SyncMessage::submit(author, doc, black_box(&submitted)).unwrap();
            let bytes = msg.encode().unwrap();
            black_box(SyncMessage::decode(&bytes).unwrap().submitted_record().unwrap())
        })
    });
}

fn bench_compaction(c: &mut Criterion) {
    let config = ServerConfig::default();

    c.bench_function("compact_1200_records", |b| {
        b.iter_batched(
            || records_with(1_200),
            |mut records| black_box(records.compact(&config).unwrap()),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_reconcile_behind_head,
    bench_keystrokes,
    bench_external_over_pending,
    bench_message_roundtrip,
    bench_compaction,
);
criterion_main!(benches);
