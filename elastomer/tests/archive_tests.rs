//! Integration tests for staging, observing and reading

mod common;

use common::{init_tracing, Recorder};
use elastomer::{erase, Archive, MutationKind, Receipt, StageOptions, TaskContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn test_count_scenario() {
    init_tracing();
    let archive = Archive::with_defaults().unwrap();
    let count = archive.define_slot::<i32>("count").unwrap();

    archive.stage(&count, 1);
    let recorder = Recorder::attach(&archive, &count, "count-observer");

    // Redundant: no event
    archive.stage_with(&count, 1, StageOptions::default());
    recorder.settle(&archive).await;
    assert_eq!(recorder.len(), 0);

    archive.stage(&count, 2);
    recorder.settle(&archive).await;
    assert_eq!(recorder.transitions(), vec![(Some(1), Some(2))]);
    assert_eq!(recorder.events()[0].receipt, recorder.receipt);

    archive.retire(recorder.receipt);
    archive.stage(&count, 3);
    recorder.settle(&archive).await;
    assert_eq!(recorder.len(), 1);

    assert_eq!(archive.fetch(&count).await.unwrap().as_deref(), Some(&3));
}

#[tokio::test]
async fn test_redundancy_filter() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<String>("title").unwrap();
    let recorder = Recorder::attach(&archive, &slot, "title-observer");

    archive.stage(&slot, "same".to_string());
    archive.stage(&slot, "same".to_string());
    recorder.settle(&archive).await;
    assert_eq!(recorder.len(), 1);

    let keep = StageOptions::default().keep_redundant();
    archive.stage_with(&slot, "same".to_string(), keep);
    archive.stage_with(&slot, "same".to_string(), keep);
    recorder.settle(&archive).await;

    let events = recorder.events();
    assert_eq!(events.len(), 3);
    for event in &events[1..] {
        assert_eq!(event.old_value(), event.new_value());
        assert_eq!(event.kind, MutationKind::Staged);
    }
}

#[tokio::test]
async fn test_type_rejection_leaves_state_unchanged() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    archive.stage(&slot, 5);
    let recorder = Recorder::attach(&archive, &slot, "count-observer");

    let before = archive.fetch(&slot).await.unwrap();
    archive.stage_erased(slot.key(), Some(erase("five")), StageOptions::default());
    archive.stage_erased(slot.key(), Some(erase(5u64)), StageOptions::default());
    recorder.settle(&archive).await;
    let after = archive.fetch(&slot).await.unwrap();

    assert_eq!(before, after);
    assert_eq!(recorder.len(), 0);

    let stats = archive.stats().await.unwrap();
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.observer_count, 1);
}

#[tokio::test]
async fn test_absent_is_a_payload() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    let recorder = Recorder::attach(&archive, &slot, "count-observer");

    archive.stage(&slot, 1);
    archive.stage(&slot, None);
    archive.stage(&slot, None);
    recorder.settle(&archive).await;

    assert_eq!(recorder.transitions(), vec![(None, Some(1)), (Some(1), None)]);
    assert_eq!(archive.fetch(&slot).await.unwrap(), None);
}

#[tokio::test]
async fn test_idempotent_retire() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    let first = Recorder::attach(&archive, &slot, "first");
    let second = Recorder::attach(&archive, &slot, "second");

    archive.retire(first.receipt);
    archive.retire(first.receipt);
    archive.retire(Receipt::new());
    archive.retire(None);

    archive.stage(&slot, 1);
    first.settle(&archive).await;
    second.settle(&archive).await;

    assert_eq!(first.len(), 0);
    assert_eq!(second.transitions(), vec![(None, Some(1))]);
    assert_eq!(archive.observer_count(&slot).await.unwrap(), 1);
}

#[tokio::test]
async fn test_post_without_mutation() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    archive.stage(&slot, 7);

    let a = Recorder::attach(&archive, &slot, "a");
    let b = Recorder::attach(&archive, &slot, "b");
    archive.post(&slot);
    a.settle(&archive).await;
    b.settle(&archive).await;

    for recorder in [&a, &b] {
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].old_value(), Some(&7));
        assert_eq!(events[0].new_value(), Some(&7));
        assert!(events[0].is_post());
        assert_eq!(events[0].receipt, recorder.receipt);
    }

    // Same commit for every observer
    assert_eq!(a.events()[0].seq, b.events()[0].seq);
    assert_eq!(a.events()[0].timestamp, b.events()[0].timestamp);
    assert_eq!(archive.fetch(&slot).await.unwrap().as_deref(), Some(&7));
}

#[tokio::test]
async fn test_post_on_unset_slot() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    let recorder = Recorder::attach(&archive, &slot, "observer");

    archive.post(&slot);
    recorder.settle(&archive).await;

    assert_eq!(recorder.transitions(), vec![(None, None)]);
}

#[tokio::test]
async fn test_delayed_stage_and_post() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    let recorder = Recorder::attach(&archive, &slot, "observer");

    archive.stage_with(&slot, 1, StageOptions::default().after(Duration::from_millis(40)));
    recorder.settle(&archive).await;
    assert_eq!(recorder.len(), 0);
    assert_eq!(archive.fetch(&slot).await.unwrap(), None);

    tokio::time::sleep(Duration::from_millis(120)).await;
    recorder.settle(&archive).await;
    assert_eq!(recorder.transitions(), vec![(None, Some(1))]);

    archive.post_after(&slot, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(100)).await;
    recorder.settle(&archive).await;
    assert_eq!(recorder.len(), 2);
    assert!(recorder.events()[1].is_post());
}

#[tokio::test]
async fn test_delayed_stage_is_still_filtered() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    archive.stage(&slot, 1);
    let recorder = Recorder::attach(&archive, &slot, "observer");

    archive.stage_with(&slot, 1, StageOptions::default().after(Duration::from_millis(10)));
    tokio::time::sleep(Duration::from_millis(80)).await;
    recorder.settle(&archive).await;

    assert_eq!(recorder.len(), 0);
    assert_eq!(archive.stats().await.unwrap().discarded, 1);
}

#[tokio::test]
async fn test_express_on_unset_slot() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<Vec<u8>>("blob").unwrap();
    let ctx = TaskContext::spawn("reader");

    let (tx, rx) = oneshot::channel();
    archive.express(&slot, &ctx.context(), move |value| {
        let _ = tx.send(value);
    });

    assert_eq!(rx.await.unwrap(), None);
}

#[tokio::test]
async fn test_event_values_are_shared_not_copied() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<Vec<u64>>("big").unwrap();
    let a = Recorder::attach(&archive, &slot, "a");
    let b = Recorder::attach(&archive, &slot, "b");

    archive.stage(&slot, vec![0u64; 1024]);
    a.settle(&archive).await;
    b.settle(&archive).await;

    let (ea, eb) = (a.events(), b.events());
    let (ea, eb) = (&ea[0], &eb[0]);
    assert!(Arc::ptr_eq(ea.new.as_ref().unwrap(), eb.new.as_ref().unwrap()));
    assert_ne!(ea.receipt, eb.receipt);
}

#[tokio::test]
async fn test_same_name_different_type_does_not_collide() {
    let archive = Archive::with_defaults().unwrap();
    let ints: elastomer::Slot<i32> = elastomer::Slot::new("shared");
    let text: elastomer::Slot<String> = elastomer::Slot::new("shared");

    archive.stage(&ints, 1);
    archive.stage(&text, "one".to_string());

    assert_eq!(archive.fetch(&ints).await.unwrap().as_deref(), Some(&1));
    assert_eq!(
        archive.fetch(&text).await.unwrap().as_deref().map(String::as_str),
        Some("one")
    );
    assert_eq!(archive.stats().await.unwrap().slot_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retire_after_dispatch_still_delivers() {
    let archive = Archive::with_defaults().unwrap();
    let slot = archive.define_slot::<i32>("count").unwrap();
    let recorder = Recorder::attach(&archive, &slot, "observer");

    // Block the observer's context so the event sits in its queue
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    recorder.context().submit(Box::new(move || {
        let _ = release_rx.recv_timeout(Duration::from_secs(5));
    }));

    archive.stage(&slot, 1);
    archive.flush().await.unwrap();
    archive.retire(recorder.receipt);
    archive.stage(&slot, 2);
    archive.flush().await.unwrap();

    let _ = release_tx.send(());
    recorder.task.flush().await;

    assert_eq!(recorder.transitions(), vec![(None, Some(1))]);
}
