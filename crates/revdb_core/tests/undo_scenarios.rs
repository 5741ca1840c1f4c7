//! End-to-end undo scenarios through the database facade.

use revdb_core::{Database, DbError, IndexDefinition, ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

fn account_indices() -> IndexDefinition<Account> {
    IndexDefinition::<Account>::new().ordered_unique("by_owner", |a: &Account| a.owner.clone())
}

fn fresh_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.add_index::<Account>(account_indices()).unwrap();
    db
}

fn create(db: &Database, owner: &str, balance: i64) -> Account {
    db.create::<Account>(|id| Account {
        id,
        owner: owner.to_string(),
        balance,
    })
    .unwrap()
}

#[test]
fn undo_on_drop() {
    // Scenario A: a session dropped without push rolls everything back.
    let db = fresh_db();
    {
        let session = db.start_undo_session(true).unwrap();
        let acct = create(&db, "alice", 100);
        assert_eq!(acct.id.raw(), 0);
        assert_eq!(session.revision(), 1);
    }

    let err = db.get::<Account>(ObjectId::new(0)).unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
    db.with_index::<Account, _>(|idx| assert_eq!(idx.next_id().raw(), 0))
        .unwrap();
}

#[test]
fn push_and_commit() {
    // Scenario B: push retains the state; commit makes it unrecoverable.
    let db = fresh_db();
    let revision = {
        let mut session = db.start_undo_session(true).unwrap();
        create(&db, "alice", 100);
        let revision = session.revision();
        session.push();
        revision
    };

    db.commit(revision).unwrap();
    assert_eq!(db.get::<Account>(ObjectId::new(0)).unwrap().balance, 100);

    // the committed revision can no longer be undone
    db.undo().unwrap();
    assert_eq!(db.get::<Account>(ObjectId::new(0)).unwrap().balance, 100);
}

#[test]
fn squash_folds_two_sessions_into_one() {
    // Scenario C.
    let db = fresh_db();

    let mut s1 = db.start_undo_session(true).unwrap();
    let a0 = create(&db, "alice", 10);
    s1.push();

    {
        let mut s2 = db.start_undo_session(true).unwrap();
        db.modify::<Account>(a0.id, |a| a.balance = 20).unwrap();
        create(&db, "bob", 30);
        s2.squash();
    }

    db.with_index::<Account, _>(|idx| {
        assert_eq!(idx.undo_depth(), 1);
        let head = idx.head_undo_state().unwrap();
        assert!(head.old_values().is_empty());
        assert!(head.new_ids().contains(&ObjectId::new(0)));
        assert!(head.new_ids().contains(&ObjectId::new(1)));
    })
    .unwrap();

    db.undo().unwrap();
    assert!(db.find::<Account>(a0.id).unwrap().is_none());
    assert!(db.find::<Account>(ObjectId::new(1)).unwrap().is_none());
    db.with_index::<Account, _>(|idx| assert_eq!(idx.next_id().raw(), 0))
        .unwrap();
}

#[test]
fn modify_twice_then_undo_restores_first_pre_image() {
    // Scenario D: the pre-image is captured only on the first modify.
    let db = fresh_db();
    let acct = create(&db, "alice", 10);

    let mut session = db.start_undo_session(true).unwrap();
    db.modify::<Account>(acct.id, |a| a.balance = 20).unwrap();
    db.modify::<Account>(acct.id, |a| a.balance = 30).unwrap();
    session.undo().unwrap();

    assert_eq!(db.get::<Account>(acct.id).unwrap().balance, 10);
}

#[test]
fn create_and_remove_within_one_session_is_net_nop() {
    // Scenario E.
    let db = fresh_db();

    let mut session = db.start_undo_session(true).unwrap();
    let acct = create(&db, "alice", 1);
    db.remove(&acct).unwrap();

    db.with_index::<Account, _>(|idx| {
        let head = idx.head_undo_state().unwrap();
        assert!(head.new_ids().is_empty());
        assert!(!head.removed_values().contains_key(&acct.id));
        assert!(!head.old_values().contains_key(&acct.id));
    })
    .unwrap();
    session.push();
}

#[test]
fn squash_then_undo_equals_state_before_inner_session() {
    // The squash-undo law: squashing S2 into S1 then undoing S1 restores
    // the state before S1 was entered.
    let db = fresh_db();
    let base = create(&db, "alice", 10);

    let mut s1 = db.start_undo_session(true).unwrap();
    db.modify::<Account>(base.id, |a| a.balance = 20).unwrap();
    s1.push();

    {
        let mut s2 = db.start_undo_session(true).unwrap();
        db.modify::<Account>(base.id, |a| a.balance = 30).unwrap();
        create(&db, "bob", 40);
        s2.squash();
    }

    db.undo().unwrap();
    assert_eq!(db.get::<Account>(base.id).unwrap().balance, 10);
    assert!(db
        .find_by::<Account, String>("by_owner", &"bob".to_string())
        .unwrap()
        .is_none());
}

#[test]
fn commit_is_monotone() {
    // Undo after commit(r) cannot affect revisions at or below r.
    let db = fresh_db();

    let mut s1 = db.start_undo_session(true).unwrap();
    create(&db, "alice", 1);
    let committed = s1.revision();
    s1.push();

    let mut s2 = db.start_undo_session(true).unwrap();
    create(&db, "bob", 2);
    s2.push();

    db.commit(committed).unwrap();
    db.undo_all().unwrap();

    // alice (revision 1) survived; bob (revision 2) did not
    assert!(db
        .find_by::<Account, String>("by_owner", &"alice".to_string())
        .unwrap()
        .is_some());
    assert!(db
        .find_by::<Account, String>("by_owner", &"bob".to_string())
        .unwrap()
        .is_none());
}

#[test]
fn nested_sessions_unwind_in_order() {
    let db = fresh_db();

    let mut s1 = db.start_undo_session(true).unwrap();
    create(&db, "alice", 1);
    s1.push();

    let mut s2 = db.start_undo_session(true).unwrap();
    create(&db, "bob", 2);
    s2.push();

    db.undo().unwrap();
    assert!(db
        .find_by::<Account, String>("by_owner", &"bob".to_string())
        .unwrap()
        .is_none());
    assert!(db
        .find_by::<Account, String>("by_owner", &"alice".to_string())
        .unwrap()
        .is_some());

    db.undo().unwrap();
    db.with_index::<Account, _>(|idx| assert!(idx.is_empty())).unwrap();
}

#[test]
fn failed_mutation_propagates_and_session_rolls_back() {
    // A uniqueness rejection inside a session leaves the object untouched,
    // and the drop-time rollback restores the rest.
    let db = fresh_db();
    let alice = create(&db, "alice", 10);
    let bob = create(&db, "bob", 20);

    {
        let _session = db.start_undo_session(true).unwrap();
        db.modify::<Account>(bob.id, |a| a.balance = 25).unwrap();

        let err = db
            .modify::<Account>(bob.id, |a| a.owner = "alice".to_string())
            .unwrap_err();
        assert!(matches!(err, DbError::UniquenessViolation { .. }));
        assert_eq!(db.get::<Account>(bob.id).unwrap().balance, 25);
    }

    assert_eq!(db.get::<Account>(bob.id).unwrap().balance, 20);
    assert_eq!(db.get::<Account>(alice.id).unwrap().balance, 10);
}

#[test]
fn uniqueness_rejection_does_not_consume_ids() {
    let db = fresh_db();
    create(&db, "alice", 1);

    let err = db
        .create::<Account>(|id| Account {
            id,
            owner: "alice".to_string(),
            balance: 2,
        })
        .unwrap_err();
    assert!(matches!(err, DbError::UniquenessViolation { .. }));

    let bob = create(&db, "bob", 3);
    assert_eq!(bob.id.raw(), 1);
}

#[test]
fn sessions_under_write_lock() {
    // The documented discipline: session plus mutations inside a held
    // write lock, reads under a read lock.
    let db = fresh_db();
    db.set_require_locking(true);

    db.with_weak_write_lock(|| {
        let mut session = db.start_undo_session(true).unwrap();
        create(&db, "alice", 5);
        session.push();
        db.commit(db.revision()).unwrap();
    })
    .unwrap();

    let balance = db
        .with_read_lock(|| db.get::<Account>(ObjectId::new(0)).unwrap().balance)
        .unwrap();
    assert_eq!(balance, 5);
}

#[test]
fn remove_object_by_id() {
    let db = fresh_db();
    let acct = create(&db, "alice", 1);

    db.remove_object::<Account>(acct.id).unwrap();
    let err = db.remove_object::<Account>(acct.id).unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}
