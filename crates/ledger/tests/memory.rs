use std::{sync::Arc, time::Duration};

use ledger::{
    Actor, Ledger, LedgerConfig, LedgerError, LedgerStore, LedgerUnit, MemoryStore, PurchaseCmd,
    RetryPolicy, TransferCmd, UserId,
};
use tokio::time::Instant;

fn catalog() -> MemoryStore {
    MemoryStore::new()
        .with_item("pen", 10)
        .with_item("book", 50)
        .with_item("pink-hoody", 500)
}

fn ledger_with(store: MemoryStore, starting_balance: i64) -> Ledger<MemoryStore> {
    Ledger::builder()
        .store(store)
        .config(LedgerConfig {
            starting_balance,
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            ..LedgerConfig::default()
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn builder_requires_a_store_and_a_sane_starting_balance() {
    assert_eq!(
        Ledger::<MemoryStore>::builder().build().unwrap_err(),
        LedgerError::RecordNotFound("store".to_string())
    );

    let err = Ledger::builder()
        .store(MemoryStore::new())
        .config(LedgerConfig {
            starting_balance: -1,
            ..LedgerConfig::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}

#[tokio::test]
async fn conflicts_are_retried_transparently() {
    let store = catalog();
    let ledger = ledger_with(store.clone(), 100);
    let alice = Actor::verified(ledger.register("alice").await.unwrap());
    let bob = Actor::verified(ledger.register("bob").await.unwrap());

    store.fail_next_commits(2);
    ledger.transfer(TransferCmd::new(alice, "bob", 40)).await.unwrap();

    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 60);
    assert_eq!(ledger.balance(bob.user_id()).await.unwrap(), 140);
    assert_eq!(store.transfer_count(), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_a_conflict_and_change_nothing() {
    let store = catalog();
    let ledger = ledger_with(store.clone(), 100);
    let alice = Actor::verified(ledger.register("alice").await.unwrap());
    ledger.register("bob").await.unwrap();

    store.fail_next_commits(3);
    assert_eq!(
        ledger.transfer(TransferCmd::new(alice, "bob", 40)).await,
        Err(LedgerError::Conflict)
    );
    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 100);
    assert_eq!(store.transfer_count(), 0);

    store.fail_next_commits(3);
    assert_eq!(
        ledger.purchase(PurchaseCmd::new(alice, "pen")).await,
        Err(LedgerError::Conflict)
    );
    assert!(ledger.inventory(alice.user_id()).await.unwrap().is_empty());
    assert_eq!(store.total_coins(), 200);
}

#[tokio::test]
async fn failed_operations_can_be_repeated_with_the_same_result() {
    let ledger = ledger_with(catalog(), 100);
    let alice = Actor::verified(ledger.register("alice").await.unwrap());

    for _ in 0..3 {
        assert_eq!(
            ledger.purchase(PurchaseCmd::new(alice, "pink-hoody")).await,
            Err(LedgerError::NotEnoughCoins)
        );
    }
    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 100);
}

#[tokio::test]
async fn deadline_cuts_off_an_operation_waiting_on_a_lock() {
    let store = catalog();
    let ledger = ledger_with(store.clone(), 100);
    let alice = Actor::verified(ledger.register("alice").await.unwrap());
    let bob = Actor::verified(ledger.register("bob").await.unwrap());

    let mut holder = store.begin().await.unwrap();
    holder.lock_balance(bob.user_id()).await.unwrap();

    let cmd = TransferCmd::new(alice, "bob", 10).deadline(Instant::now() + Duration::from_millis(50));
    assert_eq!(ledger.transfer(cmd).await, Err(LedgerError::Timeout));
    let cmd = PurchaseCmd::new(bob, "pen").deadline(Instant::now() + Duration::from_millis(50));
    assert_eq!(ledger.purchase(cmd).await, Err(LedgerError::Timeout));

    holder.rollback().await.unwrap();
    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 100);
    assert_eq!(store.transfer_count(), 0);

    ledger.transfer(TransferCmd::new(alice, "bob", 10)).await.unwrap();
    assert_eq!(ledger.balance(bob.user_id()).await.unwrap(), 110);
}

#[tokio::test]
async fn waiting_operation_sees_the_committed_balance() {
    let store = catalog();
    let ledger = Arc::new(ledger_with(store.clone(), 100));
    let alice = Actor::verified(ledger.register("alice").await.unwrap());
    ledger.register("bob").await.unwrap();

    let mut holder = store.begin().await.unwrap();
    assert_eq!(holder.lock_balance(alice.user_id()).await.unwrap(), Some(100));
    holder.apply_delta(alice.user_id(), -60).await.unwrap();

    let waiting = {
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move { ledger.transfer(TransferCmd::new(alice, "bob", 50)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    holder.commit().await.unwrap();

    assert_eq!(waiting.await.unwrap(), Err(LedgerError::NotEnoughCoins));
    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_never_deadlock_and_conserve_coins() {
    let store = catalog();
    let ledger = Arc::new(ledger_with(store.clone(), 100));
    let names = ["alice", "bob", "carol", "dave"];
    let mut actors = Vec::new();
    for name in names {
        actors.push(Actor::verified(ledger.register(name).await.unwrap()));
    }

    let mut tasks = Vec::new();
    for round in 0..50 {
        for (i, actor) in actors.iter().enumerate() {
            let ledger = Arc::clone(&ledger);
            let actor = *actor;
            // Every user sends both to the next and to the previous one, so
            // each pair of users trades in both directions at once.
            let to = names[(i + 1 + 2 * (round % 2)) % names.len()];
            tasks.push(tokio::spawn(async move {
                ledger.transfer(TransferCmd::new(actor, to, 7)).await
            }));
        }
    }

    let all = async {
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) | Err(LedgerError::NotEnoughCoins) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), all)
        .await
        .expect("transfers deadlocked");

    assert_eq!(store.total_coins(), 400);
    for actor in actors {
        assert!(ledger.balance(actor.user_id()).await.unwrap() >= 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_overdraw() {
    let store = catalog();
    let ledger = Arc::new(ledger_with(store.clone(), 100));
    let alice = Actor::verified(ledger.register("alice").await.unwrap());

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.purchase(PurchaseCmd::new(alice, "book")).await })
        })
        .collect();

    let mut bought = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => bought += 1,
            Err(err) => assert_eq!(err, LedgerError::NotEnoughCoins),
        }
    }

    assert_eq!(bought, 2);
    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 0);
    assert_eq!(ledger.inventory(alice.user_id()).await.unwrap()[0].quantity, 2);
}

#[tokio::test]
async fn racing_registrations_of_one_name_commit_once() {
    let store = catalog();
    let mut first = store.begin().await.unwrap();
    let mut second = store.begin().await.unwrap();

    // Both units stage the name before either commits.
    let first_id = first.create_user("alice").await.unwrap();
    first.create_balance(first_id, 100).await.unwrap();
    let second_id = second.create_user("alice").await.unwrap();
    second.create_balance(second_id, 100).await.unwrap();

    first.commit().await.unwrap();
    assert_eq!(
        second.commit().await,
        Err(LedgerError::ExistingKey("alice".to_string()))
    );

    assert_eq!(store.total_coins(), 100);
    let user = store.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.id, first_id);
    assert!(store.balance(second_id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_of_one_name_grant_one_balance() {
    let store = catalog();
    let ledger = Arc::new(ledger_with(store.clone(), 100));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.register("alice").await })
        })
        .collect();

    let mut registered = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => registered += 1,
            Err(err) => assert_eq!(err, LedgerError::ExistingKey("alice".to_string())),
        }
    }
    assert_eq!(registered, 1);
    assert_eq!(store.total_coins(), 100);
}

#[tokio::test]
async fn failed_registration_leaves_neither_user_nor_password() {
    let store = catalog();
    let ledger = ledger_with(store.clone(), 100);

    store.fail_next_commits(3);
    assert_eq!(
        ledger.register_with_password("alice", "$argon2id$hash").await,
        Err(LedgerError::Conflict)
    );
    assert!(ledger.find_user("alice").await.unwrap().is_none());
    assert_eq!(store.total_coins(), 0);

    let alice = ledger
        .register_with_password("alice", "$argon2id$hash")
        .await
        .unwrap();
    assert_eq!(
        ledger.password_hash(alice).await.unwrap().as_deref(),
        Some("$argon2id$hash")
    );
    assert_eq!(ledger.balance(alice).await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_of_the_whole_balance_both_complete() {
    let store = catalog();
    let ledger = Arc::new(ledger_with(store.clone(), 100));
    let alice = Actor::verified(ledger.register("alice").await.unwrap());
    let bob = Actor::verified(ledger.register("bob").await.unwrap());

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let spawn_transfer = |from: Actor, to: &'static str| {
        let ledger = Arc::clone(&ledger);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            ledger.transfer(TransferCmd::new(from, to, 100)).await
        })
    };
    let a_to_b = spawn_transfer(alice, "bob");
    let b_to_a = spawn_transfer(bob, "alice");

    let both = async { (a_to_b.await.unwrap(), b_to_a.await.unwrap()) };
    let (a_to_b, b_to_a) = tokio::time::timeout(Duration::from_secs(5), both)
        .await
        .expect("transfers deadlocked");

    // Whichever commits second sees the first one's credit.
    assert_eq!(a_to_b, Ok(()));
    assert_eq!(b_to_a, Ok(()));
    assert_eq!(store.transfer_count(), 2);
    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 100);
    assert_eq!(ledger.balance(bob.user_id()).await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn info_is_one_consistent_view() {
    let store = catalog();
    let ledger = Arc::new(ledger_with(store.clone(), 1000));
    let alice = Actor::verified(ledger.register("alice").await.unwrap());
    ledger.register("bob").await.unwrap();

    let sender = {
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move {
            for _ in 0..200 {
                ledger
                    .transfer(TransferCmd::new(alice, "bob", 1))
                    .await
                    .unwrap();
            }
        })
    };

    while !sender.is_finished() {
        let info = ledger.info(alice.user_id()).await.unwrap();
        let sent: i64 = info.history.sent.iter().map(|sent| sent.amount).sum();
        assert_eq!(info.coins + sent, 1000);
        tokio::task::yield_now().await;
    }
    sender.await.unwrap();
    assert_eq!(ledger.balance(alice.user_id()).await.unwrap(), 800);
}

#[tokio::test]
async fn locking_an_unknown_user_takes_no_lock() {
    let store = catalog();
    let ledger = ledger_with(store.clone(), 100);
    let alice = ledger.register("alice").await.unwrap();

    let mut unit = store.begin().await.unwrap();
    assert_eq!(unit.lock_balance(UserId::new(404)).await.unwrap(), None);
    assert_eq!(unit.lock_balance(alice).await.unwrap(), Some(100));

    // A second unit can still look up the unknown id while the first is open.
    let mut other = store.begin().await.unwrap();
    let lookup = tokio::time::timeout(
        Duration::from_millis(100),
        other.lock_balance(UserId::new(404)),
    )
    .await
    .expect("unknown id was locked");
    assert_eq!(lookup.unwrap(), None);

    other.rollback().await.unwrap();
    unit.rollback().await.unwrap();
}
