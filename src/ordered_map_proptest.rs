#![cfg(test)]

// Property tests for OrderedMap kept inside the crate so the collision
// hasher and model helpers stay private.

use crate::cursor::Direction;
use crate::order_list::End;
use crate::ordered_map::OrderedMap;
use crate::table::{HashSlotTable, SlotTable};
use core::hash::BuildHasher;
use proptest::prelude::*;
use std::hash::Hasher;

#[derive(Clone, Debug)]
enum Op {
    Set(usize, i32),
    Delete(usize),
    MoveToEnd(usize, bool),
    Pop(bool),
    Get(usize),
    Clear,
    Walk(bool),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
            2 => idx.clone().prop_map(Op::Delete),
            2 => (idx.clone(), any::<bool>()).prop_map(|(i, b)| Op::MoveToEnd(i, b)),
            1 => any::<bool>().prop_map(Op::Pop),
            1 => idx.clone().prop_map(Op::Get),
            1 => Just(Op::Clear),
            1 => any::<bool>().prop_map(Op::Walk),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Insertion-order model: a Vec of (key, value) with linear lookups.
#[derive(Default)]
struct Model(Vec<(String, i32)>);

impl Model {
    fn position(&self, k: &str) -> Option<usize> {
        self.0.iter().position(|(mk, _)| mk == k)
    }
}

fn run<T>(mut sut: OrderedMap<String, i32, T>, pool: Vec<String>, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    T: SlotTable<String, i32>,
{
    let mut model = Model::default();
    let mut clears = 0u64;
    for op in ops {
        let before = sut.mutation_count();
        match op {
            Op::Set(i, v) => {
                let k = pool[i].clone();
                let prev = sut.set(k.clone(), v).expect("set");
                match model.position(&k) {
                    Some(p) => {
                        prop_assert_eq!(prev, Some(model.0[p].1));
                        model.0[p].1 = v;
                        prop_assert_eq!(sut.mutation_count(), before, "overwrite is not structural");
                    }
                    None => {
                        prop_assert_eq!(prev, None);
                        model.0.push((k, v));
                        prop_assert_ne!(sut.mutation_count(), before);
                    }
                }
            }
            Op::Delete(i) => {
                let k = &pool[i];
                match model.position(k) {
                    Some(p) => {
                        let (mk, mv) = model.0.remove(p);
                        prop_assert_eq!(sut.delete_entry(k.as_str()).expect("delete"), (mk, mv));
                    }
                    None => prop_assert!(sut.delete(k.as_str()).unwrap_err().is_key_not_found()),
                }
            }
            Op::MoveToEnd(i, last) => {
                let k = &pool[i];
                match model.position(k) {
                    Some(p) => {
                        let at_end = if last { p + 1 == model.0.len() } else { p == 0 };
                        sut.move_to_end(k.as_str(), last).expect("move");
                        let entry = model.0.remove(p);
                        if last {
                            model.0.push(entry);
                        } else {
                            model.0.insert(0, entry);
                        }
                        prop_assert_eq!(sut.mutation_count() == before, at_end);
                    }
                    None => prop_assert!(sut.move_to_end(k.as_str(), last).is_err()),
                }
            }
            Op::Pop(last) => {
                let end = if last { End::Back } else { End::Front };
                if model.0.is_empty() {
                    prop_assert!(sut.pop_item(end).is_err());
                } else {
                    let expected = if last { model.0.pop() } else { Some(model.0.remove(0)) };
                    prop_assert_eq!(Some(sut.pop_item(end).expect("pop")), expected);
                }
            }
            Op::Get(i) => {
                let k = &pool[i];
                let expected = model.position(k).map(|p| model.0[p].1);
                prop_assert_eq!(sut.get(k.as_str()).copied(), expected);
                prop_assert_eq!(sut.contains_key(k.as_str()), expected.is_some());
            }
            Op::Clear => {
                sut.clear();
                model.0.clear();
                clears += 1;
            }
            Op::Walk(forward) => {
                let dir = if forward { Direction::Forward } else { Direction::Reverse };
                let mut c = sut.cursor(dir);
                let mut seen = Vec::new();
                while let Some((k, v)) = c.next(&mut sut).expect("undisturbed walk") {
                    seen.push((k.clone(), *v));
                }
                let mut expected = model.0.clone();
                if !forward {
                    expected.reverse();
                }
                prop_assert_eq!(seen, expected);
            }
        }

        // Post-conditions after each op.
        prop_assert!(sut.check_consistency().is_ok(), "{:?}", sut.check_consistency());
        prop_assert_eq!(sut.len(), model.0.len());
        let order: Vec<(String, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(&order, &model.0);
        let rev: Vec<&String> = sut.keys().rev().collect();
        prop_assert!(rev.iter().copied().eq(model.0.iter().rev().map(|(k, _)| k)));
        prop_assert!(sut.mirror_rebuilds() <= sut.table().epoch().generation() + clears);
    }
    Ok(())
}

// Property: state-machine equivalence against the Vec model.
// - iteration order equals insertion order adjusted only by moves;
// - overwrites never count as mutations, new keys always do;
// - moving a key already at the requested end is silent;
// - list, mirror and table agree after every operation;
// - mirror rebuilds never outnumber table layout changes plus clears.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_order_matches_model((pool, ops) in arb_scenario()) {
        run(OrderedMap::new(), pool, ops)?;
    }
}

// Constant hasher: every key collides, so slots depend purely on probe
// order and equality.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_order_matches_model_with_collisions((pool, ops) in arb_scenario()) {
        let sut: OrderedMap<String, i32, HashSlotTable<String, i32, ConstBuildHasher>> =
            OrderedMap::with_hasher(ConstBuildHasher);
        run(sut, pool, ops)?;
    }
}
