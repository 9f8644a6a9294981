use std::collections::{BTreeMap, HashMap};

use jkid_core::{json_interface, json_object, serialize, Describe, JsonObject, TypeSpec};

#[derive(Debug, Clone, PartialEq)]
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

#[derive(Debug, Clone, PartialEq)]
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

#[derive(Debug, Clone, PartialEq)]
struct Account {
    login: String,
    password: String,
    display_name: Option<String>,
    roles: Vec<String>,
}

impl Describe for Account {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Account")
            .field("login", |a| &a.login)
            .field_with("password", |a| &a.password, |f| f.exclude().or_default())
            .field_with("display_name", |a| &a.display_name, |f| f.rename("displayName"))
            .field("roles", |a| &a.roles)
            .constructor(|args| {
                Ok(Account {
                    login: args.take("login")?,
                    password: args.take("password")?,
                    display_name: args.take("display_name")?,
                    roles: args.take("roles")?,
                })
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Inventory {
    stock: BTreeMap<String, u32>,
    shelves: HashMap<String, Vec<Point>>,
}

impl Describe for Inventory {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Inventory")
            .field("stock", |i| &i.stock)
            .field("shelves", |i| &i.shelves)
            .constructor(|args| {
                Ok(Inventory {
                    stock: args.take("stock")?,
                    shelves: args.take("shelves")?,
                })
            })
    }
}

trait Shape: JsonObject {
    fn area(&self) -> f64;
}

json_interface!(Shape);

struct Square {
    side: f64,
}

impl Describe for Square {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Square")
            .field("side", |s| &s.side)
            .constructor(|args| Ok(Square { side: args.take("side")? }))
    }
}

impl Shape for Square {
    fn area(&self) -> f64 {
        self.side * self.side
    }
}

struct Canvas {
    title: String,
    shapes: Vec<Box<dyn Shape>>,
}

impl Describe for Canvas {
    fn describe() -> TypeSpec<Self> {
        TypeSpec::<Self>::new("Canvas")
            .field("title", |c| &c.title)
            .field("shapes", |c| &c.shapes)
            .constructor(|args| {
                Ok(Canvas {
                    title: args.take("title")?,
                    shapes: args.take("shapes")?,
                })
            })
    }
}

json_object!(Point, Line, Account, Inventory, Square, Canvas);

// ============================================================================
// Objects
// ============================================================================

#[test]
fn point_uses_space_after_separators() {
    assert_eq!(
        serialize(&Point { x: 10, y: 20 }).unwrap(),
        r#"{"x": 10, "y": 20}"#
    );
}

#[test]
fn nested_objects_render_through_their_own_descriptor() {
    let line = Line {
        from: Point { x: 1, y: 2 },
        to: Point { x: 3, y: 4 },
    };
    assert_eq!(
        serialize(&line).unwrap(),
        r#"{"from": {"x": 1, "y": 2}, "to": {"x": 3, "y": 4}}"#
    );
}

#[test]
fn excluded_field_is_omitted_and_rename_is_applied() {
    let account = Account {
        login: "ada".into(),
        password: "secret".into(),
        display_name: Some("Ada L.".into()),
        roles: vec!["admin".into(), "dev".into()],
    };
    let json = serialize(&account).unwrap();
    assert_eq!(
        json,
        r#"{"login": "ada", "displayName": "Ada L.", "roles": ["admin", "dev"]}"#
    );
    assert!(!json.contains("password"));
    assert!(!json.contains("secret"));
}

#[test]
fn none_renders_as_null() {
    let account = Account {
        login: "bob".into(),
        password: String::new(),
        display_name: None,
        roles: vec![],
    };
    assert_eq!(
        serialize(&account).unwrap(),
        r#"{"login": "bob", "displayName": null, "roles": []}"#
    );
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn maps_render_as_objects_with_sorted_hash_keys() {
    let mut shelves = HashMap::new();
    shelves.insert("b".to_string(), vec![Point { x: 2, y: 2 }]);
    shelves.insert("a".to_string(), vec![]);
    let inventory = Inventory {
        stock: BTreeMap::from([("pens".to_string(), 3), ("cups".to_string(), 12)]),
        shelves,
    };
    assert_eq!(
        serialize(&inventory).unwrap(),
        r#"{"stock": {"cups": 12, "pens": 3}, "shelves": {"a": [], "b": [{"x": 2, "y": 2}]}}"#
    );
}

#[test]
fn root_lists_and_scalars() {
    assert_eq!(serialize(&vec![1, 2, 3]).unwrap(), "[1, 2, 3]");
    assert_eq!(serialize(&vec![Some(true), None]).unwrap(), "[true, null]");
    assert_eq!(serialize(&"plain".to_string()).unwrap(), r#""plain""#);
    assert_eq!(serialize(&'c').unwrap(), r#""c""#);
    assert_eq!(serialize(&Option::<i32>::None).unwrap(), "null");
}

// ============================================================================
// Numbers and Strings
// ============================================================================

#[test]
fn number_formatting() {
    assert_eq!(serialize(&10.0_f64).unwrap(), "10");
    assert_eq!(serialize(&0.1_f64).unwrap(), "0.1");
    assert_eq!(serialize(&-2.5_f32).unwrap(), "-2.5");
    assert_eq!(serialize(&u8::MAX).unwrap(), "255");
    assert_eq!(serialize(&f64::NAN).unwrap(), "null");
    assert_eq!(serialize(&f64::NEG_INFINITY).unwrap(), "null");
}

#[test]
fn string_escaping() {
    let text = "quote \" backslash \\ newline \n tab \t bell \u{7}".to_string();
    assert_eq!(
        serialize(&text).unwrap(),
        r#""quote \" backslash \\ newline \n tab \t bell \u0007""#
    );
}

#[test]
fn output_is_valid_json() {
    let account = Account {
        login: "a\"b".into(),
        password: String::new(),
        display_name: Some("\u{1F600}".into()),
        roles: vec!["\n".into()],
    };
    let json = serialize(&account).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["login"], "a\"b");
    assert_eq!(value["displayName"], "\u{1F600}");
    assert_eq!(value["roles"][0], "\n");
}

// ============================================================================
// Interfaces
// ============================================================================

#[test]
fn interface_values_render_their_runtime_type() {
    let canvas = Canvas {
        title: "tiles".into(),
        shapes: vec![
            Box::new(Square { side: 2.0 }) as Box<dyn Shape>,
            Box::new(Square { side: 0.5 }),
        ],
    };
    assert_eq!(canvas.shapes.iter().map(|s| s.area()).sum::<f64>(), 4.25);
    assert_eq!(
        serialize(&canvas).unwrap(),
        r#"{"title": "tiles", "shapes": [{"side": 2}, {"side": 0.5}]}"#
    );
}
