//! Topology refresh benchmarks: parsing, hashing and routing table build.

use aikv_cluster::{parse_cluster_info, RespValue, RoutingTable, TopologySnapshot};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// CLUSTER NODES text for `masters` masters with one replica each.
fn nodes_reply(masters: usize) -> RespValue {
    let per_master = 16384 / masters;
    let mut text = String::new();
    for m in 0..masters {
        let from = m * per_master;
        let to = if m + 1 == masters { 16383 } else { from + per_master - 1 };
        text.push_str(&format!(
            "{:040x} 10.0.{}.1:6379@16379 master - 0 0 {} connected {}-{}\r\n",
            2 * m + 1,
            m,
            m + 1,
            from,
            to
        ));
        text.push_str(&format!(
            "{:040x} 10.0.{}.2:6379@16379 slave {:040x} 0 0 {} connected\r\n",
            2 * m + 2,
            m,
            2 * m + 1,
            m + 1
        ));
    }
    RespValue::bulk_string(text)
}

fn snapshot(masters: usize) -> TopologySnapshot {
    parse_cluster_info(&nodes_reply(masters)).unwrap()
}

fn bench_parse_cluster_nodes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_cluster_nodes");
    for masters in [3, 16, 64] {
        let reply = nodes_reply(masters);
        group.throughput(Throughput::Elements((masters * 2) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(masters), &reply, |b, reply| {
            b.iter(|| parse_cluster_info(black_box(reply)).unwrap());
        });
    }
    group.finish();
}

fn bench_hash_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_sum");
    for masters in [3, 64] {
        let snapshot = snapshot(masters);
        group.bench_with_input(BenchmarkId::from_parameter(masters), &snapshot, |b, s| {
            b.iter(|| black_box(s).hash_sum());
        });
    }
    group.finish();
}

fn bench_routing_table(c: &mut Criterion) {
    let ranges = snapshot(16).slots_ranges();

    c.bench_function("slots_ranges_16_masters", |b| {
        let s = snapshot(16);
        b.iter(|| black_box(&s).slots_ranges());
    });
    c.bench_function("routing_table_from_ranges", |b| {
        b.iter(|| RoutingTable::from_ranges(black_box(&ranges)));
    });
}

criterion_group!(
    benches,
    bench_parse_cluster_nodes,
    bench_hash_sum,
    bench_routing_table
);
criterion_main!(benches);
