use std::sync::Arc;
use std::thread;

use jkid_core::{
    json_interface, json_object, Config, DateConverter, Describe, IsoDate, Jkid, JsonObject,
    TypeCache, TypeRef, TypeSpec,
};

#[derive(Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

impl Describe for Point {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Point")
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

#[derive(Debug, PartialEq)]
struct Line {
    from: Point,
    to: Point,
}

impl Describe for Line {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Line")
            .field("from", |l| &l.from)
            .field("to", |l| &l.to)
            .constructor(|args| {
                Ok(Line {
                    from: args.take("from")?,
                    to: args.take("to")?,
                })
            })
    }
}

struct Event {
    title: String,
    day: chrono::NaiveDate,
    note: Option<String>,
    hidden: u8,
}

impl Describe for Event {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Event")
            .field_with("title", |e| &e.title, |f| f.rename("name"))
            .converted::<DateConverter<IsoDate>>("day", |e| &e.day)
            .field("note", |e| &e.note)
            .field_with("hidden", |e| &e.hidden, |f| f.exclude().or_default())
            .constructor(|args| {
                Ok(Event {
                    title: args.take("title")?,
                    day: args.take("day")?,
                    note: args.take("note")?,
                    hidden: args.take("hidden")?,
                })
            })
    }
}

struct Holiday {
    day: chrono::NaiveDate,
}

impl Describe for Holiday {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Holiday")
            .converted::<DateConverter<IsoDate>>("day", |h| &h.day)
            .constructor(|args| Ok(Holiday { day: args.take("day")? }))
    }
}

struct NoConstructor {
    value: i32,
}

impl Describe for NoConstructor {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("NoConstructor").field("value", |n| &n.value)
    }
}

struct Clash {
    a: i32,
    b: i32,
}

impl Describe for Clash {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Clash")
            .field("a", |c| &c.a)
            .field_with("b", |c| &c.b, |f| f.rename("a"))
            .constructor(|args| {
                Ok(Clash {
                    a: args.take("a")?,
                    b: args.take("b")?,
                })
            })
    }
}

trait Widget: JsonObject {}

json_interface!(Widget);

struct Panel {
    child: Box<dyn Widget>,
}

impl Describe for Panel {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Panel")
            .field("child", |p| &p.child)
            .constructor(|args| Ok(Panel { child: args.take("child")? }))
    }
}

#[derive(Debug)]
struct Mistyped {
    count: i32,
}

impl Describe for Mistyped {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Mistyped")
            .field("count", |m| &m.count)
            .constructor(|args| {
                let count: i64 = args.take("count")?;
                Ok(Mistyped {
                    count: count as i32,
                })
            })
    }
}

json_object!(Point, Line, Event, Holiday, NoConstructor, Clash, Panel, Mistyped);

// ============================================================================
// Memoization
// ============================================================================

#[test]
fn descriptor_is_built_once_and_shared() {
    let cache = TypeCache::new();
    assert!(!cache.contains::<Point>());
    let first = cache.get::<Point>().unwrap();
    let second = cache.get::<Point>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cache.contains::<Point>());
    assert_eq!(cache.len(), 1);
}

#[test]
fn nested_types_are_described_lazily() {
    let jkid = Jkid::new(Config::default());
    jkid.cache().get::<Line>().unwrap();
    assert!(!jkid.cache().contains::<Point>());

    let line = Line {
        from: Point { x: 0, y: 0 },
        to: Point { x: 1, y: 1 },
    };
    jkid.serialize(&line).unwrap();
    assert!(jkid.cache().contains::<Point>());
    assert_eq!(jkid.cache().len(), 2);
}

#[test]
fn concurrent_first_use_builds_one_descriptor() {
    let cache = TypeCache::new();
    let descriptors: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| cache.get::<Line>().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for descriptor in &descriptors[1..] {
        assert!(Arc::ptr_eq(&descriptors[0], descriptor));
    }
    assert_eq!(cache.len(), 1);
}

#[test]
fn engines_share_a_cache_across_threads() {
    let jkid = Jkid::new(Config::default());
    thread::scope(|s| {
        for i in 0..4 {
            let jkid = jkid.clone();
            s.spawn(move || {
                let json = format!(r#"{{"x": {i}, "y": {i}}}"#);
                let point: Point = jkid.deserialize(&json).unwrap();
                assert_eq!(point, Point { x: i, y: i });
            });
        }
    });
    assert!(jkid.cache().contains::<Point>());
    assert_eq!(jkid.cache().len(), 1);
}

#[test]
fn converters_are_shared_between_types() {
    let cache = TypeCache::new();
    cache.get::<Event>().unwrap();
    cache.get::<Holiday>().unwrap();
    assert_eq!(cache.converter_count(), 1);
}

// ============================================================================
// Descriptor Contents
// ============================================================================

#[test]
fn field_metadata_is_resolved() {
    let cache = TypeCache::new();
    let event = cache.get::<Event>().unwrap();
    assert_eq!(event.name(), "Event");

    let names: Vec<(&str, &str)> = event
        .fields()
        .iter()
        .map(|f| (f.source_name(), f.json_name()))
        .collect();
    assert_eq!(
        names,
        [("title", "name"), ("day", "day"), ("note", "note"), ("hidden", "hidden")]
    );

    let fields = event.fields();
    assert!(fields[0].is_required());
    assert!(fields[1].has_converter());
    assert!(fields[2].is_nullable() && !fields[2].is_required());
    assert_eq!(
        fields[2].declared_type(),
        &TypeRef::Optional(Box::new(TypeRef::String))
    );
    assert!(fields[3].is_excluded() && fields[3].has_default());

    assert_eq!(event.field_by_json_name("name"), Some(0));
    assert_eq!(event.field_by_json_name("title"), None);
    assert_eq!(event.field_by_json_name("hidden"), None);
}

// ============================================================================
// Reflection Errors
// ============================================================================

#[test]
fn missing_constructor() {
    let cache = TypeCache::new();
    let err = cache.get::<NoConstructor>().unwrap_err();
    assert!(err.is_reflection(), "{err}");
    assert!(!cache.contains::<NoConstructor>());
}

#[test]
fn duplicate_json_names() {
    let err = TypeCache::new().get::<Clash>().unwrap_err();
    assert!(err.is_reflection(), "{err}");
    assert!(err.to_string().contains("`a`"), "{err}");
}

#[test]
fn interface_field_without_concrete_target() {
    let err = TypeCache::new().get::<Panel>().unwrap_err();
    assert!(err.is_reflection(), "{err}");
    assert!(err.to_string().contains("Widget"), "{err}");
}

#[test]
fn constructor_taking_the_wrong_type() {
    let jkid = Jkid::new(Config::default());
    let err = jkid
        .deserialize::<Mistyped>(r#"{"count": 3}"#)
        .unwrap_err();
    assert!(err.is_reflection(), "{err}");
}

#[test]
fn failed_descriptor_is_not_cached() {
    let cache = TypeCache::new();
    assert!(cache.get::<Clash>().is_err());
    assert!(cache.get::<Clash>().is_err());
    assert!(cache.is_empty());
}
