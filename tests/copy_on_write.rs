use mjvalue::{Heap, HeapId, Value, ValueError};

fn id_of(value: &Value) -> HeapId {
    match value {
        Value::Ref(id) => *id,
        other => panic!("expected a heap value, got {other:?}"),
    }
}

#[test]
fn append_to_shared_seq_leaves_other_owner_untouched() {
    let mut heap = Heap::default();
    let a = heap.new_seq().unwrap();
    let mut b = heap.retain(&a);
    let x = heap.new_string("x").unwrap();
    let x_alias = heap.retain(&x);

    heap.seq_append(&mut b, x).unwrap();

    assert_eq!(heap.len(&a), Ok(0));
    assert_eq!(heap.len(&b), Ok(1));
    assert_ne!(id_of(&a), id_of(&b));
    assert_eq!(heap.ref_count(&a), Some(1));
    assert_eq!(heap.ref_count(&b), Some(1));
    assert_eq!(heap.ref_count(&x_alias), Some(2));

    heap.release(a);
    heap.release(b);
    heap.release(x_alias);
    assert_eq!(heap.entry_count(), 0);
}

#[test]
fn unique_seq_is_mutated_in_place() {
    let mut heap = Heap::default();
    let mut seq = heap.new_seq().unwrap();
    let before = id_of(&seq);
    heap.seq_append(&mut seq, Value::Int(1)).unwrap();
    heap.seq_append(&mut seq, Value::Int(2)).unwrap();
    assert_eq!(id_of(&seq), before);
    assert_eq!(heap.entry_count(), 1);
    heap.release(seq);
}

#[test]
fn clone_shares_elements_instead_of_copying_them() {
    let mut heap = Heap::default();
    let inner = heap.new_seq().unwrap();
    let mut outer = heap.new_seq_from(vec![inner]).unwrap();
    let shared = heap.retain(&outer);

    heap.seq_append(&mut outer, Value::None).unwrap();

    // outer was copied, inner is now held by both sequences
    let inner_a = heap.seq_get(&outer, 0).unwrap();
    let inner_b = heap.seq_get(&shared, 0).unwrap();
    assert_eq!(id_of(&inner_a), id_of(&inner_b));
    assert_eq!(heap.ref_count(&inner_a), Some(4));

    for value in [inner_a, inner_b, outer, shared] {
        heap.release(value);
    }
    assert_eq!(heap.entry_count(), 0);
}

#[test]
fn set_item_on_shared_seq() {
    let mut heap = Heap::default();
    let mut a = heap.new_seq_from(vec![Value::Int(1), Value::Int(2)]).unwrap();
    let b = heap.retain(&a);
    heap.seq_set(&mut a, 1, Value::Int(20)).unwrap();
    assert_eq!(heap.repr(&a), "[1, 20]");
    assert_eq!(heap.repr(&b), "[1, 2]");

    assert_eq!(
        heap.seq_set(&mut a, 2, Value::None),
        Err(ValueError::IndexOutOfRange { index: 2, len: 2 })
    );
    heap.release(a);
    heap.release(b);
}

#[test]
fn pop_from_shared_seq() {
    let mut heap = Heap::default();
    let text = heap.new_string("last").unwrap();
    let mut a = heap.new_seq_from(vec![Value::Int(1), text]).unwrap();
    let b = heap.retain(&a);

    let popped = heap.seq_pop(&mut a).unwrap().unwrap();
    assert_eq!(popped.as_str(&heap), Ok("last"));
    assert_eq!(heap.len(&a), Ok(1));
    assert_eq!(heap.len(&b), Ok(2));
    heap.release(popped);

    let mut empty = heap.new_seq().unwrap();
    assert!(heap.seq_pop(&mut empty).unwrap().is_none());

    for value in [a, b, empty] {
        heap.release(value);
    }
    assert_eq!(heap.entry_count(), 0);
}

#[test]
fn map_set_and_remove_on_shared_map() {
    let mut heap = Heap::default();
    let mut a = heap.new_map().unwrap();
    let key = heap.new_string("k").unwrap();
    heap.map_set(&mut a, key, Value::Int(1)).unwrap();
    let b = heap.retain(&a);

    let key = heap.new_string("k").unwrap();
    heap.map_set(&mut a, key, Value::Int(2)).unwrap();
    let lookup = heap.new_string("k").unwrap();
    assert!(matches!(heap.map_get(&a, &lookup), Ok(Value::Int(2))));
    assert!(matches!(heap.map_get(&b, &lookup), Ok(Value::Int(1))));

    let mut c = heap.retain(&b);
    assert!(matches!(heap.map_remove(&mut c, &lookup), Ok(Some(Value::Int(1)))));
    assert_eq!(heap.len(&c), Ok(0));
    assert_eq!(heap.len(&b), Ok(1));
    assert!(heap.map_remove(&mut c, &lookup).unwrap().is_none());

    for value in [a, b, c, lookup] {
        heap.release(value);
    }
    assert_eq!(heap.entry_count(), 0);
}

#[test]
fn failed_mutation_does_not_copy() {
    let mut heap = Heap::default();
    let mut a = heap.new_map().unwrap();
    let b = heap.retain(&a);
    let bad_key = heap.new_seq().unwrap();
    let err = heap.map_set(&mut a, bad_key, Value::None).unwrap_err();
    assert!(matches!(err, ValueError::InvalidKey { .. }));
    assert_eq!(id_of(&a), id_of(&b));
    assert_eq!(heap.ref_count(&a), Some(2));
    heap.release(a);
    heap.release(b);
    assert_eq!(heap.entry_count(), 0);
}
