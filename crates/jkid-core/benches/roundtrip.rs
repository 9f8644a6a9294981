use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use jkid_core::{json_object, parse_value, Config, Describe, Jkid, TypeSpec};

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

impl Describe for Point {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::new("Point")
            .field("x", |p| &p.x)
            .field("y", |p| &p.y)
            .constructor(|args| {
                Ok(Point {
                    x: args.take("x")?,
                    y: args.take("y")?,
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Route {
    name: String,
    stops: Vec<Point>,
    tags: Vec<String>,
}

impl Describe for Route {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::new("Route")
            .field("name", |r| &r.name)
            .field("stops", |r| &r.stops)
            .field("tags", |r| &r.tags)
            .constructor(|args| {
                Ok(Route {
                    name: args.take("name")?,
                    stops: args.take("stops")?,
                    tags: args.take("tags")?,
                })
            })
    }
}

json_object!(Point, Route);

fn sample_routes(count: usize) -> Vec<Route> {
    (0..count)
        .map(|i| Route {
            name: format!("route-{i}"),
            stops: (0..20)
                .map(|j| Point {
                    x: (i * 31 + j) as i32,
                    y: (j * 17) as i32 - 100,
                })
                .collect(),
            tags: vec!["urban".into(), format!("zone-{}", i % 7)],
        })
        .collect()
}

fn bench_serialize(c: &mut Criterion) {
    let jkid = Jkid::new(Config::default());
    let routes = sample_routes(100);
    c.bench_function("serialize_100_routes", |b| {
        b.iter(|| jkid.serialize(black_box(&routes)).unwrap())
    });
}

fn bench_deserialize(c: &mut Criterion) {
    let jkid = Jkid::new(Config::default());
    let json = jkid.serialize(&sample_routes(100)).unwrap();
    c.bench_function("deserialize_100_routes", |b| {
        b.iter(|| jkid.deserialize::<Vec<Route>>(black_box(&json)).unwrap())
    });
}

fn bench_parse_value(c: &mut Criterion) {
    let jkid = Jkid::new(Config::default());
    let json = jkid.serialize(&sample_routes(100)).unwrap();
    c.bench_function("parse_value_100_routes", |b| {
        b.iter(|| parse_value(black_box(&json)).unwrap())
    });
}

criterion_group!(benches, bench_serialize, bench_deserialize, bench_parse_value);
criterion_main!(benches);
