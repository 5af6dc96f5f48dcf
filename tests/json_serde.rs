use mjvalue::{Heap, ResourceLimits, Value, ValueError, ValueKind};
use serde_json::json;

macro_rules! from_json_tests {
    ($($name:ident: $json:expr => $kind:ident, $repr:literal;)*) => {
        $(
            paste::item! {
                #[test]
                fn [< from_json_ $name >]() {
                    let mut heap = Heap::default();
                    let value = heap.from_json(&$json).unwrap();
                    assert_eq!(value.kind(&heap), ValueKind::$kind);
                    assert_eq!(heap.repr(&value), $repr);
                    heap.release(value);
                    assert_eq!(heap.entry_count(), 0);
                }
            }
        )*
    }
}

from_json_tests! {
    null: json!(null) => None, "none";
    bool: json!(false) => Bool, "false";
    int: json!(-12) => Number, "-12";
    float: json!(2.5) => Number, "2.5";
    big_unsigned: json!(u64::MAX) => Number, "18446744073709552000";
    string: json!("quote'd") => String, "\"quote'd\"";
    array: json!([1, "a", [true]]) => Seq, "[1, 'a', [true]]";
    object_order: json!({"b": 1, "a": {"c": null}}) => Map, "{'b': 1, 'a': {'c': none}}";
    empty_object: json!({}) => Map, "{}";
}

#[test]
fn to_json_renders_every_kind() {
    let mut heap = Heap::default();
    let mut seq = heap.new_seq().unwrap();
    for item in [Value::Undefined, Value::None, Value::Bool(true), Value::Int(7), Value::Float(0.25)] {
        heap.seq_append(&mut seq, item).unwrap();
    }
    heap.seq_append(&mut seq, Value::Float(f64::INFINITY)).unwrap();
    let bytes = heap.new_bytes(vec![0, 255]).unwrap();
    heap.seq_append(&mut seq, bytes).unwrap();

    assert_eq!(
        heap.to_json(&seq).unwrap(),
        json!([null, null, true, 7, 0.25, null, [0, 255]])
    );
    heap.release(seq);
}

#[test]
fn callables_have_no_json_form() {
    let mut heap = Heap::default();
    let f = heap.new_callable("f", |_, _| Ok(Value::None)).unwrap();
    let seq = heap.new_seq_from(vec![f]).unwrap();
    assert_eq!(
        heap.to_json(&seq),
        Err(ValueError::TypeMismatch {
            operation: "to_json",
            found: ValueKind::Callable
        })
    );
    heap.release(seq);
}

#[test]
fn context_document_round_trips() {
    let doc = json!({
        "user": {"name": "ada", "admin": false, "score": 9.5},
        "items": [{"id": 1}, {"id": 2}],
        "tags": []
    });
    let mut heap = Heap::default();
    let value = heap.from_json(&doc).unwrap();
    let back = heap.to_json(&value).unwrap();
    assert_eq!(back, doc);
    // key order survives the round trip
    assert_eq!(serde_json::to_string(&back).unwrap(), serde_json::to_string(&doc).unwrap());
    heap.release(value);
    assert_eq!(heap.entry_count(), 0);
}

#[test]
fn limit_hit_while_building_leaves_nothing_behind() {
    let mut heap = Heap::with_limits(ResourceLimits::new().max_allocations(4));
    let err = heap.from_json(&json!({"a": "x", "b": ["y", "z"]})).unwrap_err();
    assert!(matches!(err, ValueError::Resource(_)));
    assert_eq!(heap.entry_count(), 0);
}

#[test]
fn kinds_serialize_lowercase() {
    assert_eq!(serde_json::to_string(&ValueKind::Callable).unwrap(), "\"callable\"");
    let kind: ValueKind = serde_json::from_str("\"seq\"").unwrap();
    assert_eq!(kind, ValueKind::Seq);
}
