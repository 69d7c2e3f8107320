/*!
 * Resource Handle Integration Tests
 *
 * Move-transfer, use-after-move errors, and shared-count correctness
 * under concurrent clone/drop
 */

use keepsync::{Handle, HandleError, OwnedHandle, SharedHandle};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Counts how many times a value was dropped
struct DropTally(Arc<AtomicUsize>);

impl Drop for DropTally {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn move_transfer_scenario() {
    // Construct, move out, confirm the old handle fails and the new one
    // yields the value, then release the empty handle twice.
    let mut old = OwnedHandle::new(445);
    let mut new = old.take();

    assert_eq!(old.get(), Err(HandleError::UseAfterMove));
    assert_eq!(new.get(), Ok(&445));

    assert!(!old.release());
    assert!(!old.release());

    assert!(new.release());
    assert_eq!(new.get(), Err(HandleError::UseAfterMove));
}

#[test]
fn owned_value_dropped_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));

    let mut a = OwnedHandle::new(DropTally(Arc::clone(&drops)));
    let b = a.take();
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(a);
    assert_eq!(drops.load(Ordering::SeqCst), 0, "empty source must not release");

    drop(b);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn owned_mutation_through_owner() {
    let mut h = OwnedHandle::new(vec![1, 2]);
    h.get_mut().unwrap().push(3);
    assert_eq!(h.get().unwrap(), &[1, 2, 3]);
}

#[test]
fn shared_count_tracks_live_handles() {
    let a = SharedHandle::new("value");
    assert_eq!(a.use_count(), 1);

    let b = a.clone();
    let c = b.clone();
    assert_eq!(a.use_count(), 3);
    assert!(a.ptr_eq(&c));

    drop(b);
    assert_eq!(a.use_count(), 2);
    drop(c);
    assert_eq!(a.use_count(), 1);
}

#[test]
fn shared_move_out_empties_source_only() {
    let mut a = SharedHandle::new(9);
    let b = a.clone();

    let c = a.take();
    assert_eq!(a.get(), Err(HandleError::UseAfterMove));
    assert_eq!(a.use_count(), 0);

    // The value itself is untouched: ownership was shared, not exclusive.
    assert_eq!(b.use_count(), 2);
    assert_eq!(c.get(), Ok(&9));
}

#[test]
fn shared_value_released_exactly_once_at_zero() {
    let drops = Arc::new(AtomicUsize::new(0));

    let a = SharedHandle::new(DropTally(Arc::clone(&drops)));
    let b = a.clone();
    let mut c = a.clone();

    assert!(c.release());
    assert!(!c.release());
    drop(a);
    assert_eq!(drops.load(Ordering::SeqCst), 0, "a live handle remains");

    drop(b);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn shared_concurrent_clone_drop_stress() {
    let drops = Arc::new(AtomicUsize::new(0));
    let handle = SharedHandle::new(DropTally(Arc::clone(&drops)));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let local = handle.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    let extra = local.clone();
                    assert!(extra.use_count() >= 2);
                    drop(extra);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(handle.use_count(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(handle);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

proptest! {
    #[test]
    fn owned_move_chain_preserves_value(value: i64, hops in 1usize..16) {
        let mut current = OwnedHandle::new(value);
        let mut trail = Vec::new();

        for _ in 0..hops {
            let next = current.take();
            trail.push(current);
            current = next;
        }

        prop_assert_eq!(current.get(), Ok(&value));
        for emptied in &trail {
            prop_assert_eq!(emptied.get(), Err(HandleError::UseAfterMove));
        }
    }

    #[test]
    fn shared_count_matches_live_handles(ops in prop::collection::vec(any::<bool>(), 1..64)) {
        let root = SharedHandle::new(0u8);
        let mut clones: Vec<SharedHandle<u8>> = Vec::new();

        for clone_next in ops {
            if clone_next {
                clones.push(root.clone());
            } else {
                clones.pop();
            }
            prop_assert_eq!(root.use_count(), 1 + clones.len());
        }
    }
}
