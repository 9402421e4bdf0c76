//! Tests for produce_state, create_dispatch and the bundled hosts

use std::sync::{Arc, Mutex};
use std::time::Duration;

use condux::testing::{DeferredAcks, FailingCommit};
use condux::{
    assert_pending, commit_fn, create_dispatch, produce_state, try_produce_state, Acknowledge,
    Commit, CommitQueue, Dispatch, Draft, Error, QueueConfig, StateCell, Transform,
};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default, PartialEq)]
struct Counter {
    count: i32,
    history: Vec<i32>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("count would go negative: {0}")]
struct Underflow(i32);

fn increment(draft: &mut Draft<'_, Counter>) -> i32 {
    draft.count += 1;
    let count = draft.count;
    draft.history.push(count);
    count
}

fn bound_to(cell: &Arc<StateCell<Counter>>) -> Dispatch<Counter> {
    let reader = Arc::clone(cell);
    create_dispatch(move || reader.get(), Arc::clone(cell))
}

async fn timed<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(1), fut)
        .await
        .expect("timeout")
}

#[tokio::test]
async fn test_atomicity() {
    let cell = StateCell::new(Counter {
        count: 10,
        history: vec![],
    });

    produce_state(&cell, |draft: &mut Draft<'_, Counter>| {
        draft.count *= 3;
        let count = draft.count;
        draft.history.push(count);
    })
    .await
    .unwrap();

    assert_eq!(
        *cell.get(),
        Counter {
            count: 30,
            history: vec![30],
        }
    );
}

#[tokio::test]
async fn test_non_aliasing() {
    let cell = StateCell::new(Counter::default());
    let before = cell.get();

    produce_state(&cell, |_draft: &mut Draft<'_, Counter>| {})
        .await
        .unwrap();

    let after = cell.get();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_return_value_passthrough() {
    let cell = StateCell::new(Counter::default());
    let value = produce_state(&cell, |_draft: &mut Draft<'_, Counter>| 42)
        .await
        .unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_failure_isolation() {
    let cell = StateCell::new(Counter::default());
    let before = cell.get();

    let err = try_produce_state(&cell, |draft: &mut Draft<'_, Counter>| {
        draft.count -= 1;
        if draft.count < 0 {
            return Err(Underflow(draft.count));
        }
        Ok(draft.count)
    })
    .await
    .unwrap_err();

    assert_eq!(err.action_source::<Underflow>(), Some(&Underflow(-1)));
    assert!(Arc::ptr_eq(&before, &cell.get()));
    assert_eq!(cell.revision(), 0);
}

#[tokio::test]
async fn test_commit_error_surfaces() {
    let err = produce_state(&FailingCommit, increment).await.unwrap_err();
    assert!(matches!(err, Error::Commit(_)));
    assert!(!err.is_action());
}

#[tokio::test]
async fn test_issue_order_is_call_order() {
    let cell = StateCell::new(Counter::default());
    let first = produce_state(&cell, increment);
    let second = produce_state(&cell, increment);

    // Resolved in reverse, but committed at call time
    assert_eq!(second.await.unwrap(), 2);
    assert_eq!(first.await.unwrap(), 1);
    assert_eq!(cell.get().history, vec![1, 2]);
}

#[tokio::test]
async fn test_acknowledgement_ordering() {
    let host = DeferredAcks::new(Counter::default());
    let mut first = Box::pin(produce_state(&host, increment));
    let mut second = Box::pin(produce_state(&host, increment));

    assert_eq!(host.get().count, 2);
    assert_pending!(first);
    assert_pending!(second);

    // Acknowledge out of issue order
    assert!(host.acknowledge_latest());
    assert_eq!(timed(&mut second).await.unwrap(), 2);
    assert_pending!(first);

    assert!(host.acknowledge_latest());
    assert_eq!(timed(first).await.unwrap(), 1);
}

#[tokio::test]
async fn test_abandoned_acknowledgement() {
    let host = DeferredAcks::new(Counter::default());
    let pending = produce_state(&host, increment);
    host.abandon_all();
    assert!(matches!(pending.await, Err(Error::Abandoned)));
}

#[tokio::test]
async fn test_dispatch_independence_immediate() {
    let cell = Arc::new(StateCell::new(Counter::default()));
    let dispatch = bound_to(&cell);

    let a = dispatch.dispatch(|updater| updater.produce(|draft| draft.count += 1));
    let b = dispatch.dispatch(|updater| updater.produce(|draft| draft.count += 1));
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(dispatch.snapshot().count, 2);
}

#[tokio::test]
async fn test_dispatch_independence_batched() {
    let queue = Arc::new(CommitQueue::new(
        Counter::default(),
        QueueConfig::default().batch_window(Duration::from_millis(5)),
    ));
    let reader = Arc::clone(&queue);
    let dispatch = create_dispatch(move || reader.get(), Arc::clone(&queue));

    let cancel = CancellationToken::new();
    let driver = queue.spawn(cancel.clone());

    let a = dispatch.dispatch(|updater| updater.produce(|draft| draft.count += 1));
    let b = dispatch.dispatch(|updater| updater.produce(|draft| draft.count += 1));
    timed(a).await.unwrap();
    timed(b).await.unwrap();
    assert_eq!(dispatch.snapshot().count, 2);

    cancel.cancel();
    driver.await.unwrap();
}

#[tokio::test]
async fn test_batch_applied_before_any_acknowledgement() {
    let queue = Arc::new(CommitQueue::new(Counter::default(), QueueConfig::default()));
    let seen_at_ack = Arc::new(Mutex::new(Vec::new()));

    // Record the visible count at the moment each acknowledgement fires
    let host = {
        let queue = Arc::clone(&queue);
        let seen = Arc::clone(&seen_at_ack);
        commit_fn(move |transform: Transform<Counter>, ack: Acknowledge| {
            let reader = Arc::clone(&queue);
            let seen = Arc::clone(&seen);
            queue.commit(
                transform,
                Box::new(move || {
                    seen.lock().unwrap().push(reader.get().count);
                    ack();
                }),
            )
        })
    };

    let mut first = Box::pin(produce_state(&host, increment));
    let mut second = Box::pin(produce_state(&host, increment));
    assert_pending!(first);
    assert_pending!(second);
    assert_eq!(queue.get().count, 0);

    assert_eq!(queue.flush(), 2);
    assert_eq!(first.await.unwrap(), 1);
    assert_eq!(second.await.unwrap(), 2);
    assert_eq!(*seen_at_ack.lock().unwrap(), vec![2, 2]);
}

#[tokio::test]
async fn test_interleaved_actions_lose_no_updates() {
    let cell = Arc::new(StateCell::new(Counter::default()));
    let dispatch = bound_to(&cell);

    let slow = dispatch.dispatch(|updater| async move {
        updater.produce(|draft| draft.history.push(1)).await?;
        tokio::time::sleep(Duration::from_millis(10)).await;
        updater.produce(|draft| draft.history.push(3)).await
    });
    let fast = dispatch.dispatch(|updater| async move {
        tokio::time::sleep(Duration::from_millis(2)).await;
        updater.produce(|draft| draft.history.push(2)).await
    });

    let (slow, fast) = tokio::join!(slow, fast);
    slow.unwrap();
    fast.unwrap();
    assert_eq!(cell.get().history, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch_through_queue_driver() {
    let queue = Arc::new(CommitQueue::new(
        Counter::default(),
        QueueConfig::default().max_batch(8),
    ));
    let reader = Arc::clone(&queue);
    let dispatch = create_dispatch(move || reader.get(), Arc::clone(&queue));

    let cancel = CancellationToken::new();
    let driver = queue.spawn(cancel.clone());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let dispatch = dispatch.clone();
        handles.push(tokio::spawn(async move {
            dispatch
                .dispatch(|updater| updater.produce(|draft| draft.count += 1))
                .await
        }));
    }
    for handle in handles {
        timed(handle).await.unwrap().unwrap();
    }
    assert_eq!(queue.get().count, 32);

    cancel.cancel();
    driver.await.unwrap();
}

#[tokio::test]
async fn test_action_reads_latest_state() {
    let cell = Arc::new(StateCell::new(Counter::default()));
    let dispatch = bound_to(&cell);

    let observed = dispatch
        .dispatch(|updater| async move {
            let before = updater.state().count;
            updater.produce(|draft| draft.count = 7).await?;
            let after = updater.state().count;
            Ok::<_, Error>((before, after))
        })
        .await
        .unwrap();

    assert_eq!(observed, (0, 7));
}

#[tokio::test]
async fn test_failed_action_leaves_dispatch_usable() {
    let cell = Arc::new(StateCell::new(Counter::default()));
    let dispatch = bound_to(&cell);

    let err = dispatch
        .dispatch(|updater| updater.try_produce(|_draft| Err::<(), _>(Underflow(0))))
        .await
        .unwrap_err();
    assert!(err.is_action());

    dispatch
        .dispatch(|updater| updater.produce(increment))
        .await
        .unwrap();
    assert_eq!(cell.get().count, 1);
}

#[tokio::test]
async fn test_draft_shares_untouched_arcs() {
    #[derive(Clone, Default)]
    struct Library {
        shelves: Vec<Arc<Vec<String>>>,
    }

    let cell = StateCell::new(Library {
        shelves: vec![Arc::new(vec!["a".into()]), Arc::new(vec!["b".into()])],
    });
    let before = cell.get();

    produce_state(&cell, |draft: &mut Draft<'_, Library>| {
        Arc::make_mut(&mut draft.shelves[1]).push("c".into());
    })
    .await
    .unwrap();

    let after = cell.get();
    assert!(Arc::ptr_eq(&before.shelves[0], &after.shelves[0]));
    assert!(!Arc::ptr_eq(&before.shelves[1], &after.shelves[1]));
    assert_eq!(*after.shelves[1], vec!["b", "c"]);
}
