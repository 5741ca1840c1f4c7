//! Property-based tests of the undo engine.

use proptest::prelude::*;
use revdb_core::{GenericIndex, IndexDefinition, ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct Account {
    id: ObjectId<Account>,
    owner: String,
    balance: i64,
}

impl ObjectKind for Account {
    const TYPE_NUMBER: u16 = 1;

    fn id(&self) -> ObjectId<Self> {
        self.id
    }

    fn set_id(&mut self, id: ObjectId<Self>) {
        self.id = id;
    }
}

fn definition() -> IndexDefinition<Account> {
    IndexDefinition::<Account>::new()
        .ordered_unique("by_owner", |a: &Account| a.owner.clone())
        .ordered_non_unique("by_balance", |a: &Account| a.balance)
}

#[derive(Debug, Clone)]
enum Op {
    Create { balance: i64 },
    Modify { slot: usize, balance: i64 },
    Remove { slot: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..1_000).prop_map(|balance| Op::Create { balance }),
        (0usize..64, 0i64..1_000).prop_map(|(slot, balance)| Op::Modify { slot, balance }),
        (0usize..64).prop_map(|slot| Op::Remove { slot }),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(op_strategy(), 0..40)
}

/// Owners are derived from the assigned id so unique-index rejections can
/// never occur during random runs.
fn apply(idx: &mut GenericIndex<Account>, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Create { balance } => {
                idx.emplace(|id| Account {
                    id,
                    owner: format!("owner-{}", id.raw()),
                    balance: *balance,
                })
                .unwrap();
            }
            Op::Modify { slot, balance } => {
                let live: Vec<ObjectId<Account>> = idx.iter().map(|a| a.id()).collect();
                if live.is_empty() {
                    continue;
                }
                let id = live[slot % live.len()];
                idx.modify(id, |a| a.balance = *balance).unwrap();
            }
            Op::Remove { slot } => {
                let live: Vec<ObjectId<Account>> = idx.iter().map(|a| a.id()).collect();
                if live.is_empty() {
                    continue;
                }
                idx.remove(live[slot % live.len()]).unwrap();
            }
        }
    }
}

fn snapshot(idx: &GenericIndex<Account>) -> (Vec<Account>, i64, i64) {
    (
        idx.iter().cloned().collect(),
        idx.next_id().raw(),
        idx.revision(),
    )
}

proptest! {
    /// Any sequence of operations inside a session is fully reverted by a
    /// single undo.
    #[test]
    fn undo_round_trip(seed in ops_strategy(), ops in ops_strategy()) {
        let mut idx = GenericIndex::new(&definition());
        apply(&mut idx, &seed);

        let before = snapshot(&idx);
        idx.begin_undo();
        apply(&mut idx, &ops);
        idx.undo().unwrap();

        prop_assert_eq!(snapshot(&idx), before);
    }

    /// Squashing the inner of two sessions, then undoing the outer, equals
    /// the state before the outer session was entered.
    #[test]
    fn squash_undo_law(seed in ops_strategy(), first in ops_strategy(), second in ops_strategy()) {
        let mut idx = GenericIndex::new(&definition());
        apply(&mut idx, &seed);

        let before = snapshot(&idx);
        idx.begin_undo();
        apply(&mut idx, &first);
        idx.begin_undo();
        apply(&mut idx, &second);
        idx.squash();
        idx.undo().unwrap();

        prop_assert_eq!(snapshot(&idx), before);
    }

    /// Every undo state keeps its three change sets pairwise disjoint.
    #[test]
    fn change_sets_stay_disjoint(seed in ops_strategy(), first in ops_strategy(), second in ops_strategy()) {
        let mut idx = GenericIndex::new(&definition());
        apply(&mut idx, &seed);
        idx.begin_undo();
        apply(&mut idx, &first);
        idx.begin_undo();
        apply(&mut idx, &second);

        for state in idx.undo_states() {
            prop_assert!(state.is_disjoint());
        }

        idx.squash();
        for state in idx.undo_states() {
            prop_assert!(state.is_disjoint());
        }
    }

    /// Repeated modifies of one object capture at most one pre-image.
    #[test]
    fn pre_image_capture_is_idempotent(balances in proptest::collection::vec(0i64..1_000, 1..20)) {
        let mut idx = GenericIndex::new(&definition());
        let id = idx
            .emplace(|id| Account {
                id,
                owner: "owner-0".to_string(),
                balance: -1,
            })
            .unwrap()
            .id();

        idx.begin_undo();
        for balance in &balances {
            idx.modify(id, |a| a.balance = *balance).unwrap();
        }

        let head = idx.head_undo_state().unwrap();
        prop_assert_eq!(head.old_values().len(), 1);
        prop_assert_eq!(head.old_values()[&id].balance, -1);
    }

    /// next_id never decreases during a session and is restored by undo.
    #[test]
    fn next_id_is_monotone_then_restored(ops in ops_strategy()) {
        let mut idx = GenericIndex::new(&definition());
        let before = idx.next_id().raw();

        idx.begin_undo();
        let mut high_water = before;
        for op in &ops {
            apply(&mut idx, std::slice::from_ref(op));
            let now = idx.next_id().raw();
            prop_assert!(now >= high_water);
            high_water = now;
        }

        idx.undo().unwrap();
        prop_assert_eq!(idx.next_id().raw(), before);
    }

    /// undo_all leaves the index exactly where the first session found it.
    #[test]
    fn undo_all_unwinds_nested_sessions(
        seed in ops_strategy(),
        sessions in proptest::collection::vec(ops_strategy(), 1..4),
    ) {
        let mut idx = GenericIndex::new(&definition());
        apply(&mut idx, &seed);

        let before = snapshot(&idx);
        for ops in &sessions {
            idx.begin_undo();
            apply(&mut idx, ops);
        }
        idx.undo_all().unwrap();

        prop_assert_eq!(snapshot(&idx), before);
    }
}
