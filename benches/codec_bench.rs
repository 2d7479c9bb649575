use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use discord_ipc::core::parser::parse;
use discord_ipc::core::serializer::stringify;
use discord_ipc::core::value::Value;

const READY: &str = r#"{"cmd":"DISPATCH","data":{"v":1,"config":{"cdn_host":"cdn.discordapp.com","api_endpoint":"//discord.com/api","environment":"production"},"user":{"id":"123456789012345678","username":"someone","discriminator":"0","avatar":null,"flags":32,"premium_type":0}},"evt":"READY","nonce":null}"#;

fn nested_document(width: usize) -> String {
    let items: Vec<String> = (0..width)
        .map(|i| format!(r#"{{"id":{i},"name":"item \"{i}\"","score":{i}.5,"tags":["a","b\n"],"ok":true}}"#))
        .collect();
    format!(r#"{{"items":[{}]}}"#, items.join(","))
}

#[allow(clippy::unwrap_used)]
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.throughput(Throughput::Bytes(READY.len() as u64));
    group.bench_function("ready_event", |b| b.iter(|| parse(READY).unwrap()));

    for width in [10usize, 100, 1000] {
        let doc = nested_document(width);
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_function(format!("items_{width}"), |b| b.iter(|| parse(&doc).unwrap()));
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_stringify(c: &mut Criterion) {
    let mut group = c.benchmark_group("stringify");

    let ready: Value = parse(READY).unwrap();
    group.bench_function("ready_event", |b| b.iter(|| stringify(&ready)));

    for width in [10usize, 100, 1000] {
        let doc = parse(&nested_document(width)).unwrap();
        group.bench_function(format!("items_{width}"), |b| b.iter(|| stringify(&doc)));
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_stringify);
criterion_main!(benches);
