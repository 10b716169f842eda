use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hyper::{Method, Request, StatusCode};
use restmock::{
    match_base_path, resolve_operation, BufferedResponse, Dispatcher, MockResponse, Operation,
    PathPattern, ResponseAction, RestMockService, RunContext,
};
use std::sync::Arc;

fn create_operations(count: usize) -> Vec<Operation> {
    (0..count)
        .map(|i| {
            let action = ResponseAction::new(vec![MockResponse::new("ok", StatusCode::OK)]);
            let pattern = if i % 2 == 0 {
                format!("/api/v1/endpoint{i}")
            } else {
                format!("/api/v1/endpoint{i}/{{id}}")
            };
            Operation::new(
                format!("op-{i}"),
                Method::GET,
                PathPattern::parse(&pattern).unwrap(),
                Arc::new(action),
            )
        })
        .collect()
}

fn bench_operation_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_resolution");

    for op_count in [10, 50, 100, 500].iter() {
        let operations = create_operations(*op_count);
        let method = Method::GET;

        group.throughput(Throughput::Elements(1));

        let first = "/api/v1/endpoint0".to_string();
        group.bench_with_input(
            BenchmarkId::new("resolve_first", op_count),
            op_count,
            |b, _| {
                b.iter(|| {
                    resolve_operation(black_box(&operations), black_box(&first), black_box(&method))
                });
            },
        );

        // Odd operations carry a template segment
        let last = format!("/api/v1/endpoint{}/42", op_count - 1);
        group.bench_with_input(
            BenchmarkId::new("resolve_last_template", op_count),
            op_count,
            |b, _| {
                b.iter(|| {
                    resolve_operation(black_box(&operations), black_box(&last), black_box(&method))
                });
            },
        );

        let none = "/not/found".to_string();
        group.bench_with_input(
            BenchmarkId::new("resolve_none", op_count),
            op_count,
            |b, _| {
                b.iter(|| {
                    resolve_operation(black_box(&operations), black_box(&none), black_box(&method))
                });
            },
        );
    }

    group.finish();
}

fn bench_base_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("base_path");

    group.bench_function("aligned", |b| {
        b.iter(|| match_base_path(black_box("/sweden/api/v1/users"), black_box("/sweden")))
    });
    group.bench_function("unaligned", |b| {
        b.iter(|| match_base_path(black_box("/swedenextra/api"), black_box("/sweden")))
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    let service = create_operations(100)
        .into_iter()
        .fold(RestMockService::new("bench", "/bench"), |service, op| {
            service.with_operation(op)
        });
    let dispatcher = Dispatcher::new(Arc::new(service), RunContext::new("bench"));
    let request = Request::builder()
        .method("GET")
        .uri("/bench/api/v1/endpoint51/7")
        .body(Bytes::new())
        .unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("matched", |b| {
        b.iter(|| {
            let mut response = BufferedResponse::new();
            dispatcher.dispatch_request(black_box(&request), &mut response)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_operation_resolution,
    bench_base_path,
    bench_dispatch
);
criterion_main!(benches);
