//! Integration tests for the track registry
//!
//! These tests drive the registry with longer operation sequences and check
//! it against a plain map model.

use parking_lot::Mutex;
use roomlens_core::*;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Register(usize),
    Mute(usize, bool),
    Enable(usize, bool),
    Remove(usize),
}

/// Deterministic operation sequence over `ids` distinct tracks
fn operations(seed: u64, count: usize, ids: usize) -> Vec<Op> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };
    (0..count)
        .map(|_| {
            let id = next() % ids;
            match next() % 4 {
                0 => Op::Register(id),
                1 => Op::Mute(id, next() % 2 == 0),
                2 => Op::Enable(id, next() % 2 == 0),
                _ => Op::Remove(id),
            }
        })
        .collect()
}

fn track_id(index: usize) -> TrackId {
    TrackId::new(format!("MT{}", index))
}

// ============================================================================
// FOLD PROPERTY
// ============================================================================

#[test]
fn test_registry_matches_folded_model() {
    for seed in 1..=20u64 {
        let mut registry = TrackRegistry::new();
        let mut model: BTreeMap<TrackId, (bool, bool)> = BTreeMap::new();

        for op in operations(seed, 200, 6) {
            match op {
                Op::Register(i) => {
                    let id = track_id(i);
                    let result = registry.register(id.clone(), TrackRecord::remote(id.clone(), TrackKind::Video));
                    if model.contains_key(&id) {
                        assert!(matches!(result, Err(RoomLensError::DuplicateTrack { .. })));
                    } else {
                        assert!(result.is_ok());
                        model.insert(id, (true, false));
                    }
                }
                Op::Mute(i, muted) => {
                    let id = track_id(i);
                    let result = registry.update(&id, |record| record.set_muted(muted));
                    match model.get_mut(&id) {
                        Some(entry) => {
                            assert!(result.is_ok());
                            entry.1 = muted;
                        }
                        None => assert!(matches!(result, Err(RoomLensError::UnknownTrack { .. }))),
                    }
                }
                Op::Enable(i, enabled) => {
                    let id = track_id(i);
                    let result = registry.update(&id, |record| record.set_enabled(enabled));
                    match model.get_mut(&id) {
                        Some(entry) => {
                            assert!(result.is_ok());
                            entry.0 = enabled;
                        }
                        None => assert!(result.is_err()),
                    }
                }
                Op::Remove(i) => {
                    let id = track_id(i);
                    assert_eq!(registry.remove(&id).is_some(), model.remove(&id).is_some());
                }
            }
        }

        assert_eq!(registry.ids(), model.keys().cloned().collect::<Vec<_>>());
        for (id, (enabled, muted)) in &model {
            let record = registry.get(id).unwrap();
            assert_eq!(record.is_enabled(), *enabled, "seed {} id {}", seed, id);
            assert_eq!(record.is_muted(), *muted, "seed {} id {}", seed, id);
        }
    }
}

#[test]
fn test_operations_do_not_cross_ids() {
    let mut registry = TrackRegistry::new();
    let a = TrackId::new("MTa");
    let b = TrackId::new("MTb");
    registry.register(a.clone(), TrackRecord::remote(a.clone(), TrackKind::Audio)).unwrap();
    registry.register(b.clone(), TrackRecord::remote(b.clone(), TrackKind::Video)).unwrap();
    let before = registry.get(&b).cloned().unwrap();

    registry.update(&a, |record| record.set_muted(true)).unwrap();
    registry
        .try_update(&a, |record| record.set_switched_off(true, Some("network".to_string())))
        .unwrap();
    registry.update(&a, |record| record.mark_stopped()).unwrap();
    registry.remove(&a);

    assert_eq!(registry.get(&b), Some(&before));
}

// ============================================================================
// OBSERVER
// ============================================================================

#[test]
fn test_observer_notified_once_per_successful_mutation() {
    let changes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    let mut registry = TrackRegistry::with_observer(Arc::new(
        move |id: &TrackId, change: &TrackChange<'_>| {
            sink.lock().push(format!("{}:{}", change.kind(), id));
        },
    ));

    let id = TrackId::new("mic-0");
    registry.register(id.clone(), TrackRecord::local(id.clone(), TrackKind::Audio)).unwrap();
    assert!(registry.register(id.clone(), TrackRecord::local(id.clone(), TrackKind::Audio)).is_err());
    registry.update(&id, |record| record.set_enabled(false)).unwrap();
    assert!(registry.update(&TrackId::new("other"), |record| record.set_enabled(false)).is_err());
    registry.remove(&id);
    registry.remove(&id);

    assert_eq!(
        *changes.lock(),
        vec![
            "registered:mic-0".to_string(),
            "updated:mic-0".to_string(),
            "removed:mic-0".to_string(),
        ]
    );
}

#[test]
fn test_observer_sees_state_after_mutation() {
    let rates: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = rates.clone();
    let mut registry = TrackRegistry::with_observer(Arc::new(
        move |_id: &TrackId, change: &TrackChange<'_>| {
            if let Some(record) = change.current() {
                sink.lock().push(record.byte_rate());
            }
        },
    ));

    let id = TrackId::new("MT1");
    registry.register(id.clone(), TrackRecord::remote(id.clone(), TrackKind::Video)).unwrap();
    registry
        .update(&id, |record| {
            record.record_sample(ByteSample::new(1000, 0));
        })
        .unwrap();
    registry
        .update(&id, |record| {
            record.record_sample(ByteSample::new(1500, 1000));
        })
        .unwrap();

    assert_eq!(*rates.lock(), vec![0.0, 0.0, 0.5]);
}
