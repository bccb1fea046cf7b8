//! Property tests for the invariants, roundtrip/idempotence, and cursor properties of
//! `SPEC_FULL.md` §8, driven against the in-memory reference backend.

use indexed_kv::prelude::*;
use proptest::prelude::*;

#[derive(Clone, Debug, PartialEq)]
struct Row {
    id: i32,
    group: i32,
    payload: String,
}

struct RowCodec {
    indices: Vec<IndexDef<Row>>,
}

impl RowCodec {
    fn new() -> Self {
        RowCodec {
            indices: vec![
                IndexDef::unique("id", |r: &Row| Key::compose(&[KeyPart::Int32(r.id)]).unwrap()),
                IndexDef::multi("group", |r: &Row| {
                    Key::compose(&[KeyPart::Int32(r.group)]).unwrap()
                }),
            ],
        }
    }
}

impl Codec for RowCodec {
    type Item = Row;

    fn encode(&self, data: &Self::Item, _primary_key: Option<&Key>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&data.id.to_be_bytes());
        out.extend_from_slice(&data.group.to_be_bytes());
        out.extend_from_slice(data.payload.as_bytes());
        out
    }

    fn decode(&self, bytes: &[u8], _primary_key: Option<&Key>) -> indexed_kv::Result<Self::Item> {
        let id = i32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let group = i32::from_be_bytes(bytes[4..8].try_into().unwrap());
        let payload = String::from_utf8(bytes[8..].to_vec()).unwrap();
        Ok(Row { id, group, payload })
    }

    fn indices(&self) -> &[IndexDef<Self::Item>] {
        &self.indices
    }
}

fn new_collection() -> Collection<MemoryBackend, RowCodec> {
    Collection::new(MemoryBackend::new(), "rows", RowCodec::new()).unwrap()
}

fn pk_of(id: i32) -> Key {
    Key::compose(&[KeyPart::Int32(id)]).unwrap()
}

fn group_bound(group: i32) -> Key {
    Key::compose(&[KeyPart::Int32(group)]).unwrap()
}

fn full_scan(coll: &Collection<MemoryBackend, RowCodec>) -> Vec<Row> {
    let mut cursor = coll
        .query("id", Key::START, Key::END, 0, None, false, 1)
        .unwrap();
    let mut out = Vec::new();
    while cursor.has_next() {
        out.push(cursor.next().unwrap());
    }
    out
}

#[derive(Clone, Debug)]
enum Op {
    Insert(Row),
    Update(Row),
    Delete(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let row = (0..20i32, 0..4i32, "[a-z]{0,6}").prop_map(|(id, group, payload)| Row {
        id,
        group,
        payload,
    });
    prop_oneof![
        row.clone().prop_map(Op::Insert),
        row.prop_map(Op::Update),
        (0..20i32).prop_map(Op::Delete),
    ]
}

fn check_invariants(coll: &Collection<MemoryBackend, RowCodec>) {
    let rows = full_scan(coll);
    for row in &rows {
        let group_key = group_bound(row.group);
        let count = coll.count("group", &group_key, &group_key).unwrap();
        assert!(count >= 1, "group secondary must reflect every live row");
    }
    // No duplicate ids should ever survive a scan (id is the unique primary index).
    let mut ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    assert_eq!(before, ids.len(), "primary index must never hold duplicate ids");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_after_random_op_sequences(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let coll = new_collection();
        for op in ops {
            match op {
                Op::Insert(row) => { let _ = coll.insert(row); }
                Op::Update(row) => { let _ = coll.update(row); }
                Op::Delete(id) => { coll.delete(&pk_of(id)).unwrap(); }
            }
        }
        check_invariants(&coll);
    }

    #[test]
    fn decode_encode_roundtrips(id in 0..1000i32, group in 0..100i32, payload in "[a-z]{0,12}") {
        let codec = RowCodec::new();
        let row = Row { id, group, payload };
        let bytes = codec.encode(&row, None);
        let decoded = codec.decode(&bytes, None).unwrap();
        prop_assert_eq!(decoded, row);
    }

    #[test]
    fn insert_then_delete_restores_prior_state(
        seed in prop::collection::vec((0..20i32, 0..4i32, "[a-z]{0,6}"), 0..15),
        id in 0..20i32, group in 0..4i32, payload in "[a-z]{0,6}",
    ) {
        let coll = new_collection();
        for (sid, sgroup, spayload) in seed {
            if sid == id { continue; }
            let _ = coll.insert(Row { id: sid, group: sgroup, payload: spayload });
        }
        let before = full_scan(&coll);

        coll.insert(Row { id, group, payload }).unwrap();
        coll.delete(&pk_of(id)).unwrap();

        let after = full_scan(&coll);
        prop_assert_eq!(before, after);
    }

    #[test]
    fn repeated_update_matches_single_update(
        id in 0..20i32, group in 0..4i32, payload in "[a-z]{0,6}",
        group2 in 0..4i32, payload2 in "[a-z]{0,6}",
    ) {
        let first = new_collection();
        first.insert(Row { id, group, payload: payload.clone() }).unwrap();
        first.update(Row { id, group: group2, payload: payload2.clone() }).unwrap();

        let second = new_collection();
        second.insert(Row { id, group, payload }).unwrap();
        second.update(Row { id, group: group2, payload: payload2.clone() }).unwrap();
        second.update(Row { id, group: group2, payload: payload2 }).unwrap();

        prop_assert_eq!(full_scan(&first), full_scan(&second));
    }

    #[test]
    fn forward_cursor_matches_sliced_full_scan(
        rows in prop::collection::vec((0..30i32, 0..4i32, "[a-z]{0,4}"), 0..25),
        start in 0u64..10, count in 0u64..10,
    ) {
        let coll = new_collection();
        let mut seen_ids = std::collections::HashSet::new();
        for (id, group, payload) in rows {
            if seen_ids.insert(id) {
                coll.insert(Row { id, group, payload }).unwrap();
            }
        }

        let expected: Vec<Row> = full_scan(&coll)
            .into_iter()
            .skip(start as usize)
            .take(count as usize)
            .collect();

        let mut cursor = coll
            .query("id", Key::START, Key::END, start, Some(count), false, 1)
            .unwrap();
        let mut actual = Vec::new();
        while cursor.has_next() {
            actual.push(cursor.next().unwrap());
        }

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn reverse_cursor_is_forward_collected_then_reversed(
        rows in prop::collection::vec((0..30i32, 0..4i32, "[a-z]{0,4}"), 0..25),
    ) {
        let coll = new_collection();
        let mut seen_ids = std::collections::HashSet::new();
        for (id, group, payload) in rows {
            if seen_ids.insert(id) {
                coll.insert(Row { id, group, payload }).unwrap();
            }
        }

        let mut forward = full_scan(&coll);
        forward.reverse();

        let mut cursor = coll
            .query("id", Key::START, Key::END, 0, None, true, 1)
            .unwrap();
        let mut reverse = Vec::new();
        while cursor.has_next() {
            reverse.push(cursor.next().unwrap());
        }

        prop_assert_eq!(reverse, forward);
    }

    #[test]
    fn stride_matches_every_nth_element_of_unit_scan(
        rows in prop::collection::vec((0..30i32, 0..4i32, "[a-z]{0,4}"), 1..25),
        stride in 1i64..5,
    ) {
        let coll = new_collection();
        let mut seen_ids = std::collections::HashSet::new();
        for (id, group, payload) in rows {
            if seen_ids.insert(id) {
                coll.insert(Row { id, group, payload }).unwrap();
            }
        }

        let unit_scan = full_scan(&coll);
        let expected: Vec<Row> = unit_scan.into_iter().step_by(stride as usize).collect();

        let mut cursor = coll
            .query("id", Key::START, Key::END, 0, None, false, stride)
            .unwrap();
        let mut actual = Vec::new();
        while cursor.has_next() {
            actual.push(cursor.next().unwrap());
        }

        prop_assert_eq!(actual, expected);
    }
}
