/// Cull manager tests
///
/// Registry, tick, flush and worker behaviour over in-memory collaborators.
/// Run with: cargo test --test cull_manager_tests
use dormancy::simulation::{HostCall, RecordingHost, SimResource};
use dormancy::{
    ActivityStatus, CullError, CullManager, CullingConfig, CullingPolicy, DestroyCause,
    LifecycleId, Location, ManualClock, MemoryActivityStore, Resource, ResourceEvent, ResourceId,
    Transition, spawn_cull_worker,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

struct Fixture {
    clock: Arc<ManualClock>,
    host: Arc<RecordingHost>,
    manager: CullManager,
    // Keeps resources alive for as long as the manager tracks them.
    resources: Vec<Arc<dyn Resource>>,
}

impl Fixture {
    fn new() -> Self {
        let policy = CullingPolicy::new(CullingConfig::new(1_000, 5_000, 2_000))
            .with_class("outpost", CullingConfig::new(100, 500, 200));
        Self::with_store(MemoryActivityStore::new(), policy)
    }

    fn with_store(store: MemoryActivityStore, policy: CullingPolicy) -> Self {
        let clock = Arc::new(ManualClock::new(0));
        let host = Arc::new(RecordingHost::new());
        host.grant("alice").unwrap();
        let manager = CullManager::new(
            Arc::new(store),
            host.clone(),
            host.clone(),
            host.clone(),
            clock.clone(),
        )
        .with_policy(policy)
        .unwrap();
        Self {
            clock,
            host,
            manager,
            resources: Vec::new(),
        }
    }

    fn add(&mut self, sim: SimResource) -> LifecycleId {
        let sim = Arc::new(sim);
        self.host.track(sim.clone()).unwrap();
        let resource: Arc<dyn Resource> = sim;
        let id = self.manager.register(&resource).unwrap();
        self.resources.push(resource);
        id
    }
}

fn loc(x: i32) -> Location {
    Location::new("world", x, 64, 0)
}

#[test]
fn test_tick_processes_due_entities_in_location_order() {
    let mut fixture = Fixture::new();
    fixture.add(SimResource::new(ResourceId(3), loc(3)));
    fixture.add(SimResource::new(ResourceId(1), loc(1)));
    fixture.add(SimResource::new(ResourceId(2), loc(2)));

    let report = fixture.manager.tick(1_500).unwrap();
    assert_eq!(report.due, 3);
    assert_eq!(report.deactivated, 3);

    let order: Vec<Location> = fixture
        .host
        .calls()
        .unwrap()
        .into_iter()
        .map(|call| match call {
            HostCall::SetActive { location, .. } | HostCall::Destroy { location, .. } => location,
        })
        .collect();
    assert_eq!(order, vec![loc(1), loc(2), loc(3)]);
}

#[test]
fn test_tick_skips_entities_not_yet_due() {
    let mut fixture = Fixture::new();
    fixture.add(SimResource::new(ResourceId(1), loc(1)));

    let report = fixture.manager.tick(999).unwrap();
    assert_eq!(report.due, 0);
    assert!(fixture.host.calls().unwrap().is_empty());
    assert_eq!(fixture.manager.next_wake().unwrap(), Some(1_000));
}

#[test]
fn test_failed_cull_is_retried_on_next_tick() {
    let mut fixture = Fixture::new();
    let id = fixture.add(SimResource::new(ResourceId(1), loc(1)));

    fixture.host.fail_destroy(true);
    let report = fixture.manager.tick(6_000).unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.culled, 0);
    assert!(fixture.manager.contains(id).unwrap());
    assert_eq!(
        fixture.manager.snapshot(id).unwrap().committed_status,
        ActivityStatus::Active
    );

    fixture.host.fail_destroy(false);
    let report = fixture.manager.tick(6_100).unwrap();
    assert_eq!(report.culled, 1);
    assert!(!fixture.manager.contains(id).unwrap());
    assert!(fixture.manager.is_empty().unwrap());
    assert!(fixture.manager.queue().is_empty().unwrap());

    let totals = fixture.manager.totals().unwrap();
    assert_eq!(totals.ticks, 2);
    assert_eq!(totals.failed, 1);
    assert_eq!(totals.culled, 1);
}

#[test]
fn test_activity_event_reactivates_dormant_entity() {
    let mut fixture = Fixture::new();
    let id = fixture.add(SimResource::new(ResourceId(1), loc(1)));

    fixture.manager.tick(1_500).unwrap();
    fixture.clock.set(3_000);

    let transition = fixture
        .manager
        .handle_event(id, &ResourceEvent::activity("alice"))
        .unwrap();
    assert_eq!(transition, Some(Transition::Reactivated));

    let snapshot = fixture.manager.snapshot(id).unwrap();
    assert_eq!(snapshot.committed_status, ActivityStatus::Active);
    assert_eq!(snapshot.last_activity, 3_000);
    assert_eq!(snapshot.next_wake, 4_000);
    assert!(snapshot.dirty);

    let totals = fixture.manager.totals().unwrap();
    assert_eq!(totals.deactivated, 1);
    assert_eq!(totals.reactivated, 1);
}

#[test]
fn test_unpermitted_activity_is_ignored() {
    let mut fixture = Fixture::new();
    let id = fixture.add(SimResource::new(ResourceId(1), loc(1)));
    fixture.clock.set(900);

    let transition = fixture
        .manager
        .handle_event(id, &ResourceEvent::activity("mallory"))
        .unwrap();
    assert_eq!(transition, None);
    assert_eq!(fixture.manager.snapshot(id).unwrap().last_activity, 0);
}

#[test]
fn test_record_activity_skips_permission_check() {
    let mut fixture = Fixture::new();
    let id = fixture.add(SimResource::new(ResourceId(1), loc(1)));
    fixture.clock.set(900);

    assert_eq!(fixture.manager.record_activity(id).unwrap(), None);
    let snapshot = fixture.manager.snapshot(id).unwrap();
    assert_eq!(snapshot.last_activity, 900);
    assert_eq!(snapshot.next_wake, 1_900);
}

#[test]
fn test_destroyed_event_forgets_entity() {
    let mut fixture = Fixture::new();
    let id = fixture.add(SimResource::new(ResourceId(1), loc(1)));

    let event = ResourceEvent::destroyed(DestroyCause::Player);
    assert_eq!(fixture.manager.handle_event(id, &event).unwrap(), None);
    assert!(!fixture.manager.contains(id).unwrap());
    assert!(fixture.manager.queue().is_empty().unwrap());

    let report = fixture.manager.tick(9_000).unwrap();
    assert_eq!(report.due, 0);
    assert_eq!(fixture.host.destroy_count().unwrap(), 0);
}

#[test]
fn test_unknown_entity_is_an_error() {
    let fixture = Fixture::new();
    let unknown = LifecycleId::new();

    let err = fixture
        .manager
        .handle_event(unknown, &ResourceEvent::activity("alice"))
        .unwrap_err();
    assert!(matches!(err, CullError::UnknownEntity(_)));
    assert!(matches!(
        fixture.manager.snapshot(unknown),
        Err(CullError::UnknownEntity(_))
    ));
}

#[test]
fn test_register_class_uses_class_thresholds() {
    let mut fixture = Fixture::new();
    let sim = Arc::new(SimResource::new(ResourceId(5), loc(5)));
    fixture.host.track(sim.clone()).unwrap();
    let resource: Arc<dyn Resource> = sim;

    let id = fixture.manager.register_class(&resource, "outpost").unwrap();
    fixture.resources.push(resource);
    assert_eq!(fixture.manager.snapshot(id).unwrap().next_wake, 100);

    let unknown_class = Arc::new(SimResource::new(ResourceId(6), loc(6)));
    let resource: Arc<dyn Resource> = unknown_class;
    let id = fixture.manager.register_class(&resource, "castle").unwrap();
    fixture.resources.push(resource);
    assert_eq!(fixture.manager.snapshot(id).unwrap().next_wake, 1_000);
}

#[test]
fn test_register_culls_long_abandoned_resource() {
    let store = MemoryActivityStore::with_entries([(ResourceId(1), 0)]);
    let policy = CullingPolicy::new(CullingConfig::new(1_000, 5_000, 2_000));
    let mut fixture = Fixture::with_store(store, policy);
    fixture.clock.set(10_000);

    let id = fixture.add(SimResource::new(ResourceId(1), loc(1)));
    assert!(!fixture.manager.contains(id).unwrap());
    assert!(fixture.manager.is_empty().unwrap());
    assert_eq!(fixture.host.destroy_count().unwrap(), 1);
}

#[test]
fn test_flush_saves_dirty_and_counts_transient() {
    let mut fixture = Fixture::new();
    fixture.add(SimResource::new(ResourceId(1), loc(1)));
    fixture.add(SimResource::new(ResourceId(2), loc(2)));
    fixture.add(SimResource::transient(loc(3)));

    let report = fixture.manager.flush().unwrap();
    assert_eq!(report.saved, 2);
    assert_eq!(report.transient, 1);
    assert_eq!(report.failed, 0);

    let report = fixture.manager.flush().unwrap();
    assert_eq!(report.saved, 0);
    assert_eq!(report.transient, 1);
}

#[test]
fn test_snapshots_are_ordered_by_location() {
    let mut fixture = Fixture::new();
    fixture.add(SimResource::new(ResourceId(2), loc(2)));
    fixture.add(SimResource::new(ResourceId(1), loc(1)));
    fixture.clock.set(1_200);

    let snapshots = fixture.manager.snapshots().unwrap();
    let locations: Vec<Location> = snapshots.iter().map(|s| s.location.clone()).collect();
    assert_eq!(locations, vec![loc(1), loc(2)]);
    assert!(snapshots.iter().all(|s| s.computed_status == ActivityStatus::Dormant));
    assert!(snapshots.iter().all(|s| s.committed_status == ActivityStatus::Active));
}

#[test]
fn test_dropped_resource_is_forgotten_on_tick() {
    let fixture = Fixture::new();
    let resource: Arc<dyn Resource> = Arc::new(SimResource::new(ResourceId(1), loc(1)));
    let id = fixture.manager.register(&resource).unwrap();
    drop(resource);

    let report = fixture.manager.tick(1_500).unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.deactivated, 0);
    assert!(!fixture.manager.contains(id).unwrap());
    assert!(fixture.manager.queue().is_empty().unwrap());
}

#[test]
fn test_record_activity_forgets_dropped_resource() {
    let fixture = Fixture::new();
    let resource: Arc<dyn Resource> = Arc::new(SimResource::new(ResourceId(1), loc(1)));
    let id = fixture.manager.register(&resource).unwrap();
    drop(resource);

    fixture.clock.set(500);
    assert_eq!(fixture.manager.record_activity(id).unwrap(), None);
    assert!(!fixture.manager.contains(id).unwrap());
    assert!(fixture.manager.queue().is_empty().unwrap());
    assert!(matches!(
        fixture.manager.record_activity(id),
        Err(CullError::UnknownEntity(_))
    ));
}

fn shared_manager(store: MemoryActivityStore) -> (Arc<ManualClock>, Arc<RecordingHost>, Arc<CullManager>) {
    let clock = Arc::new(ManualClock::new(0));
    let host = Arc::new(RecordingHost::new());
    host.grant("alice").unwrap();
    let manager = CullManager::new(
        Arc::new(store),
        host.clone(),
        host.clone(),
        host.clone(),
        clock.clone(),
    )
    .with_policy(CullingPolicy::new(CullingConfig::new(1_000, 5_000, 2_000)))
    .unwrap();
    (clock, host, Arc::new(manager))
}

/// Every tracked entity must still have a wake in the queue.
fn assert_all_scheduled(manager: &CullManager, ids: &[LifecycleId]) {
    for id in ids {
        if manager.contains(*id).unwrap() {
            assert!(
                manager.queue().contains(*id).unwrap(),
                "entity {} is tracked but has no wake",
                id
            );
        }
    }
}

#[test]
fn test_tick_racing_registration_keeps_every_entity_scheduled() {
    const COUNT: i64 = 1_000;
    let store = MemoryActivityStore::with_entries((1..=COUNT).map(|id| (ResourceId(id), 0)));
    let (clock, host, manager) = shared_manager(store);
    clock.set(2_000);

    let stop = Arc::new(AtomicBool::new(false));
    let ticker = {
        let manager = manager.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                manager.tick(2_000).unwrap();
            }
        })
    };

    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();
    let mut ids = Vec::new();
    for n in 1..=COUNT {
        let sim = Arc::new(SimResource::new(ResourceId(n), loc(n as i32)));
        host.track(sim.clone()).unwrap();
        let resource: Arc<dyn Resource> = sim;
        ids.push(manager.register(&resource).unwrap());
        resources.push(resource);
    }

    stop.store(true, Ordering::SeqCst);
    ticker.join().unwrap();

    assert_eq!(manager.len().unwrap(), COUNT as usize);
    assert_all_scheduled(&manager, &ids);

    let report = manager.tick(1_000_000).unwrap();
    assert_eq!(report.culled, COUNT as usize);
    assert!(manager.is_empty().unwrap());
    assert!(manager.queue().is_empty().unwrap());
    assert_eq!(host.destroy_count().unwrap(), COUNT as usize);
}

#[test]
fn test_parallel_events_and_ticks_on_distinct_entities() {
    const COUNT: i32 = 400;
    let (clock, host, manager) = shared_manager(MemoryActivityStore::new());

    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();
    let mut ids = Vec::new();
    for n in 0..COUNT {
        let sim = Arc::new(SimResource::new(ResourceId(n as i64 + 1), loc(n)));
        host.track(sim.clone()).unwrap();
        let resource: Arc<dyn Resource> = sim;
        ids.push(manager.register(&resource).unwrap());
        resources.push(resource);
    }
    clock.set(1_500);

    let stop = Arc::new(AtomicBool::new(false));
    let ticker = {
        let manager = manager.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                manager.tick_now().unwrap();
            }
        })
    };

    let workers: Vec<_> = ids
        .chunks(COUNT as usize / 4)
        .map(|chunk| {
            let manager = manager.clone();
            let chunk = chunk.to_vec();
            thread::spawn(move || {
                for id in chunk {
                    manager
                        .handle_event(id, &ResourceEvent::activity("alice"))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    ticker.join().unwrap();

    assert_eq!(manager.len().unwrap(), COUNT as usize);
    assert_all_scheduled(&manager, &ids);
    for id in &ids {
        let snapshot = manager.snapshot(*id).unwrap();
        assert_eq!(snapshot.last_activity, 1_500);
        assert_eq!(snapshot.committed_status, ActivityStatus::Active);
        assert_eq!(snapshot.next_wake, 2_500);
    }

    // An entity deactivated by a tick before its event was reactivated by it.
    let totals = manager.totals().unwrap();
    assert_eq!(totals.deactivated, totals.reactivated);
    assert_eq!(totals.failed, 0);
    assert_eq!(host.destroy_count().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_culls_while_registrations_continue() {
    const COUNT: i64 = 300;
    let store = MemoryActivityStore::with_entries((1..=COUNT).map(|id| (ResourceId(id), 0)));
    let (clock, host, manager) = shared_manager(store);
    clock.set(2_000);

    let worker = spawn_cull_worker(manager.clone(), 10);
    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();
    let mut ids = Vec::new();
    for n in 1..=COUNT {
        let sim = Arc::new(SimResource::new(ResourceId(n), loc(n as i32)));
        host.track(sim.clone()).unwrap();
        let resource: Arc<dyn Resource> = sim;
        ids.push(manager.register(&resource).unwrap());
        resources.push(resource);
        if n % 50 == 0 {
            tokio::task::yield_now().await;
        }
    }
    assert_all_scheduled(&manager, &ids);

    clock.set(1_000_000);
    for _ in 0..300 {
        if manager.is_empty().unwrap() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    worker.stop().await.unwrap();

    assert!(manager.is_empty().unwrap());
    assert!(manager.queue().is_empty().unwrap());
    assert_eq!(host.destroy_count().unwrap(), COUNT as usize);
}

#[tokio::test]
async fn test_worker_ticks_with_manager_clock() {
    let mut fixture = Fixture::new();
    let id = fixture.add(SimResource::new(ResourceId(1), loc(1)));
    let Fixture {
        clock,
        host,
        manager,
        resources: _resources,
    } = fixture;
    let manager = Arc::new(manager);

    let worker = spawn_cull_worker(manager.clone(), 10);
    clock.set(1_500);

    let mut deactivated = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if manager.snapshot(id).unwrap().committed_status == ActivityStatus::Dormant {
            deactivated = true;
            break;
        }
    }
    worker.stop().await.unwrap();

    assert!(deactivated);
    assert_eq!(host.activation_count(false).unwrap(), 1);
    assert!(manager.totals().unwrap().ticks >= 1);
}
