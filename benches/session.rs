// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for stream decoding and turn dispatch.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use parley::session::accumulator::ToolCallAccumulator;
use parley::session::{ChatSession, SessionOptions};
use parley::transport::sse::SseLineDecoder;
use parley::transport::{Script, ScriptedTransport};
use parley::types::ToolCallFragment;

fn sse_body(events: usize) -> Vec<u8> {
    let mut body = String::new();
    for i in 0..events {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"token {}\"}}}}]}}\n\n",
            i
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

/// Benchmark SSE line splitting with different read sizes.
fn bench_sse_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("session/sse_decoding");
    let body = sse_body(1000);
    group.throughput(Throughput::Bytes(body.len() as u64));

    for read_size in [16, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("read_size", read_size), &body, |b, body| {
            b.iter(|| {
                let mut decoder = SseLineDecoder::new();
                let mut count = 0;
                for piece in body.chunks(read_size) {
                    count += decoder.push(black_box(piece)).len();
                }
                count += decoder.finish().len();
                count
            });
        });
    }

    group.finish();
}

/// Benchmark tool-call fragment merging.
fn bench_accumulator(c: &mut Criterion) {
    let mut group = c.benchmark_group("session/accumulator");

    for calls in [1u32, 8, 32] {
        let fragments: Vec<ToolCallFragment> = (0..64)
            .flat_map(|round| {
                (0..calls).map(move |index| {
                    let fragment = ToolCallFragment::new(index).with_arguments("\"x\",");
                    if round == 0 {
                        fragment.with_id(format!("call_{}", index)).with_name("search")
                    } else {
                        fragment
                    }
                })
            })
            .collect();

        group.throughput(Throughput::Elements(fragments.len() as u64));
        group.bench_with_input(BenchmarkId::new("calls", calls), &fragments, |b, fragments| {
            b.iter(|| {
                let mut acc = ToolCallAccumulator::new();
                for fragment in fragments {
                    acc.merge(black_box(fragment));
                }
                acc.len()
            });
        });
    }

    group.finish();
}

/// Benchmark a full generation against a scripted transport.
fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("session/generation");
    let rt = Runtime::new().expect("tokio runtime");

    for chunks in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(chunks as u64));
        group.bench_with_input(BenchmarkId::new("text_chunks", chunks), &chunks, |b, &chunks| {
            b.to_async(&rt).iter(|| async move {
                let script = (0..chunks).fold(Script::new(), |s, i| s.text(format!("t{} ", i)));
                let session = ChatSession::new(
                    ScriptedTransport::with_scripts([script]),
                    SessionOptions::default(),
                );
                session.on_delta(|text| {
                    black_box(text);
                });
                let outcome = session.send_user_message("go").await;
                black_box(outcome.is_ok())
            });
        });
    }

    group.bench_function("tool_calls/8", |b| {
        b.to_async(&rt).iter(|| async {
            let script = (0..8u32).fold(Script::new(), |s, index| {
                s.fragment(
                    ToolCallFragment::new(index)
                        .with_id(format!("call_{}", index))
                        .with_name("lookup")
                        .with_arguments("{\"key\":"),
                )
                .fragment(ToolCallFragment::new(index).with_arguments("\"value\"}"))
            });
            let session = ChatSession::new(
                ScriptedTransport::with_scripts([script]),
                SessionOptions::default(),
            );
            let outcome = session.send_user_message("go").await;
            black_box(outcome.is_ok())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sse_decoding, bench_accumulator, bench_generation);
criterion_main!(benches);
