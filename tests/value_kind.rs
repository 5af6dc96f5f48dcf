use mjvalue::{Heap, Number, Value, ValueError, ValueKind};

// ============================================================================
// Kind and truthiness of freshly built values
// ============================================================================

macro_rules! kind_tests {
    ($($name:ident: $build:expr => $kind:ident, $truthy:expr;)*) => {
        $(
            paste::item! {
                #[test]
                fn [< kind_ $name >]() {
                    let mut heap = Heap::default();
                    let build: fn(&mut Heap) -> Value = $build;
                    let value = build(&mut heap);
                    assert_eq!(value.kind(&heap), ValueKind::$kind);
                    assert_eq!(value.is_true(&heap), $truthy, "truthiness of {}", heap.repr(&value));
                    heap.release(value);
                    assert_eq!(heap.entry_count(), 0);
                }
            }
        )*
    }
}

kind_tests! {
    undefined: |_| Value::new_undefined() => Undefined, false;
    none: |_| Value::new_none() => None, false;
    bool_true: |_| Value::new_bool(true) => Bool, true;
    bool_false: |_| Value::new_bool(false) => Bool, false;
    int_zero: |_| Value::new_int(0) => Number, false;
    int_negative: |_| Value::new_int(-4) => Number, true;
    float_zero: |_| Value::new_float(0.0) => Number, false;
    float_negative_zero: |_| Value::new_float(-0.0) => Number, false;
    float_half: |_| Value::new_float(0.5) => Number, true;
    string_empty: |h| h.new_string("").unwrap() => String, false;
    string_text: |h| h.new_string("x").unwrap() => String, true;
    bytes_empty: |h| h.new_bytes(Vec::new()).unwrap() => Bytes, false;
    bytes_data: |h| h.new_bytes(vec![0u8]).unwrap() => Bytes, true;
    seq_empty: |h| h.new_seq().unwrap() => Seq, false;
    seq_after_append: |h| {
        let mut seq = h.new_seq().unwrap();
        h.seq_append(&mut seq, Value::None).unwrap();
        seq
    } => Seq, true;
    map_empty: |h| h.new_map().unwrap() => Map, false;
    map_with_entry: |h| {
        let mut map = h.new_map().unwrap();
        h.map_set(&mut map, Value::Int(1), Value::Int(2)).unwrap();
        map
    } => Map, true;
    callable: |h| h.new_callable("noop", |_, _| Ok(Value::None)).unwrap() => Callable, true;
}

// ============================================================================
// Accessors
// ============================================================================

#[test]
fn accessors_return_payload_on_kind_match() {
    let mut heap = Heap::default();
    let text = heap.new_string("héllo").unwrap();
    let bytes = heap.new_bytes(b"\x00\x01".to_vec()).unwrap();

    assert_eq!(Value::Bool(true).as_bool(&heap), Ok(true));
    assert_eq!(Value::Int(7).as_int(&heap), Ok(7));
    assert_eq!(Value::Int(7).as_float(&heap), Ok(7.0));
    assert_eq!(Value::Float(1.5).as_number(&heap), Ok(Number::Float(1.5)));
    assert_eq!(text.as_str(&heap), Ok("héllo"));
    assert_eq!(bytes.as_bytes(&heap), Ok(&[0u8, 1][..]));
    assert_eq!(heap.len(&text), Ok(5));
    assert_eq!(heap.len(&bytes), Ok(2));

    heap.release(text);
    heap.release(bytes);
}

#[test]
fn accessors_reject_other_kinds() {
    let mut heap = Heap::default();
    let seq = heap.new_seq().unwrap();

    assert_eq!(
        Value::Float(2.0).as_int(&heap),
        Err(ValueError::TypeMismatch {
            operation: "as_int",
            found: ValueKind::Number
        })
    );
    assert_eq!(
        seq.as_float(&heap),
        Err(ValueError::TypeMismatch {
            operation: "as_number",
            found: ValueKind::Seq
        })
    );
    assert!(Value::None.as_str(&heap).unwrap_err().is_type_mismatch());
    assert!(seq.as_bool(&heap).is_err());
    assert_eq!(
        heap.len(&Value::Int(3)),
        Err(ValueError::TypeMismatch {
            operation: "len",
            found: ValueKind::Number
        })
    );

    heap.release(seq);
}

#[test]
fn undefined_is_distinct_from_none() {
    let heap = Heap::default();
    assert!(Value::Undefined.is_undefined());
    assert!(!Value::None.is_undefined());
    assert!(!Value::Undefined.eq_with_heap(&Value::None, &heap));
    assert_eq!(heap.repr(&Value::Undefined), "undefined");
    assert_eq!(heap.repr(&Value::None), "none");
}

#[test]
fn repr_and_display_forms() {
    let mut heap = Heap::default();
    let mut seq = heap.new_seq().unwrap();
    let text = heap.new_string("it's").unwrap();
    heap.seq_append(&mut seq, text).unwrap();
    heap.seq_append(&mut seq, Value::Float(2.0)).unwrap();
    let bytes = heap.new_bytes(b"ab".to_vec()).unwrap();
    heap.seq_append(&mut seq, bytes).unwrap();

    let mut map = heap.new_map().unwrap();
    let key = heap.new_string("k").unwrap();
    heap.map_set(&mut map, key, seq).unwrap();
    heap.map_set(&mut map, Value::Bool(false), Value::None).unwrap();

    assert_eq!(heap.repr(&map), "{'k': [\"it's\", 2.0, b'ab'], false: none}");
    assert_eq!(heap.to_display_string(&map), heap.repr(&map));

    let plain = heap.new_string("plain").unwrap();
    assert_eq!(heap.to_display_string(&plain), "plain");
    let callable = heap.new_callable("upper", |_, _| Ok(Value::None)).unwrap();
    assert_eq!(heap.repr(&callable), "<callable upper>");

    heap.release(map);
    heap.release(plain);
    heap.release(callable);
    assert_eq!(heap.entry_count(), 0);
}
