//! Integration tests: tour store over the in-memory backend.
//!
//! Covers copy-on-write sharing, all-or-nothing mutation, lenient hydrate
//! and the subscription rules during fan-out.

use pretty_assertions::assert_eq;
use pt_client::{MemoryBackend, PersistenceClient};
use pt_core::{LocationId, OverlayAction, TourGraph, TourId, TourMap};
use pt_editor::{EditorConfig, RouteParams, SaveStatus, Subscription, TourScope, TourStore};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CAMPUS: &str = include_str!("../../pt-core/tests/fixtures/campus.json");

fn campus() -> TourId {
    TourId::new("campus").unwrap()
}

fn loc(id: &str) -> LocationId {
    LocationId::new(id).unwrap()
}

fn tours() -> TourMap {
    let campus_tour: TourGraph = serde_json::from_str(CAMPUS).unwrap();
    let mut tours = TourMap::new();
    tours.insert(campus(), Arc::new(campus_tour));
    tours.insert(
        TourId::new("library").unwrap(),
        Arc::new(TourGraph::new("Library", "Stacks and reading rooms")),
    );
    tours
}

async fn hydrated() -> TourStore<MemoryBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    let client = PersistenceClient::new(MemoryBackend::with_tours(tours()));
    let store = TourStore::new(client, EditorConfig::default());
    store.hydrate().await;
    store
}

fn counter(store: &TourStore<MemoryBackend>) -> (Arc<AtomicUsize>, Subscription) {
    let calls = Arc::new(AtomicUsize::new(0));
    let subscription = {
        let calls = Arc::clone(&calls);
        store.subscribe(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    (calls, subscription)
}

// ─── Lifecycle and reads ────────────────────────────────────────────────

#[tokio::test]
async fn hydrate_replaces_collection_and_notifies() {
    let client = PersistenceClient::new(MemoryBackend::with_tours(tours()));
    let store = TourStore::new(client, EditorConfig::default());
    let (calls, _subscription) = counter(&store);
    assert!(store.tour_list().is_empty());

    store.hydrate().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let titles: Vec<_> = store.tour_list().into_iter().map(|s| s.title).collect();
    assert_eq!(titles, vec!["Campus", "Library"]);
    assert_eq!(store.find_tour_by_title("Library"), TourId::new("library").ok());
}

#[tokio::test]
async fn offline_hydrate_yields_empty_collection() {
    let backend = MemoryBackend::with_tours(tours());
    backend.set_offline(true);
    let store = TourStore::new(PersistenceClient::new(backend), EditorConfig::default());
    store.hydrate().await;
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn malformed_tours_are_skipped_on_hydrate() {
    let body = r#"{
        "campus": {"title": "Campus", "startingLocation": "a", "locations": {
            "a": {"title": "A", "panorama": "a.jpg", "overlays": [{"position": [0.5, 0.5, 1],
                "actions": [{"type": "portal", "title": "Go", "destination": ""}]}]}}},
        "annex": {"title": "Annex", "locations": {"Dexter Lawn": {"title": "Lawn"}}}
    }"#;
    let client = PersistenceClient::new(MemoryBackend::from_json(body).unwrap());
    let store = TourStore::new(client, EditorConfig::default());
    store.hydrate().await;

    let titles: Vec<_> = store.tour_list().into_iter().map(|s| s.title).collect();
    assert_eq!(titles, vec!["Campus"]);
    let diagnostics = store.diagnostics(campus());
    let rules: Vec<_> = diagnostics.iter().map(|d| d.rule).collect();
    assert_eq!(rules, vec!["dangling-destination"]);
    assert_eq!(diagnostics[0].location, Some(loc("a")));
}

#[tokio::test]
async fn absent_ids_read_as_placeholders() {
    let store = hydrated().await;
    assert_eq!(*store.tour(None), TourGraph::placeholder());
    assert_eq!(*store.tour(TourId::new("nope").ok()), TourGraph::placeholder());
    let location = store.location(Some(campus()), Some(loc("nowhere")));
    assert!(location.overlays.is_empty());
    assert_eq!(location.title, "");
}

// ─── Mutation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn update_copies_only_the_edited_path() {
    let store = hydrated().await;
    let before = store.snapshot();
    let library = TourId::new("library").unwrap();

    let updated = store.update_location(campus(), loc("orfalea"), |location| {
        location.description = "Library entrance".into();
    });
    assert_eq!(updated, Some(()));

    let after = store.snapshot();
    assert!(Arc::ptr_eq(&before[&library], &after[&library]));
    assert!(!Arc::ptr_eq(&before[&campus()], &after[&campus()]));

    let (old, new) = (&before[&campus()], &after[&campus()]);
    assert!(!Arc::ptr_eq(&old.locations[&loc("orfalea")], &new.locations[&loc("orfalea")]));
    assert!(Arc::ptr_eq(&old.locations[&loc("dexter-mid")], &new.locations[&loc("dexter-mid")]));
    assert_eq!(old.locations[&loc("orfalea")].description, "");
    assert_eq!(new.locations[&loc("orfalea")].description, "Library entrance");
}

#[tokio::test]
async fn stale_ids_change_nothing() {
    let store = hydrated().await;
    let before = store.snapshot();
    let (calls, _subscription) = counter(&store);

    let ghost = TourId::new("ghost").unwrap();
    assert_eq!(store.update_tour(ghost, |t| t.title = "boo".into()), None);
    assert_eq!(
        store.update_location(campus(), loc("deleted"), |l| l.title = "boo".into()),
        None
    );

    let after = store.snapshot();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(after.len(), before.len());
    for (id, tour) in before.iter() {
        assert!(Arc::ptr_eq(tour, &after[id]));
    }
    assert_eq!(store.save_status(ghost), SaveStatus::Idle);
    assert_eq!(store.save_status(campus()), SaveStatus::Idle);
}

#[tokio::test]
async fn panicking_mutator_leaves_the_tour_untouched() {
    let store = hydrated().await;
    let before = store.snapshot();
    let (calls, _subscription) = counter(&store);

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        store.update_tour::<()>(campus(), |t| {
            t.title = "Half done".into();
            panic!("mutator failed");
        })
    }));
    assert!(outcome.is_err());

    let after = store.tour(Some(campus()));
    assert!(Arc::ptr_eq(&before[&campus()], &after));
    assert_eq!(after.title, "Campus");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.save_status(campus()), SaveStatus::Idle);

    // The store stays usable afterwards.
    assert_eq!(store.update_tour(campus(), |t| t.title = "Whole".into()), Some(()));
    assert_eq!(store.tour(Some(campus())).title, "Whole");
}

// ─── Subscriptions ──────────────────────────────────────────────────────

#[tokio::test]
async fn subscribers_see_the_mutation_before_it_returns() {
    let store = hydrated().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _subscription = {
        let seen = Arc::clone(&seen);
        store.subscribe(move |tours| {
            seen.lock().unwrap().push(tours[&campus()].title.clone());
        })
    };
    store.update_tour(campus(), |t| t.title = "North Campus".into());
    assert_eq!(*seen.lock().unwrap(), vec!["North Campus"]);
    assert_eq!(store.save_status(campus()), SaveStatus::Pending);
}

#[tokio::test]
async fn subscribing_during_fan_out_waits_for_the_next_one() {
    let store = hydrated().await;
    let late_calls = Arc::new(AtomicUsize::new(0));
    let late: Arc<Mutex<Option<Subscription>>> = Arc::default();

    let _first = {
        let store_handle = store.clone();
        let late = Arc::clone(&late);
        let late_calls = Arc::clone(&late_calls);
        store.subscribe(move |_| {
            let mut slot = late.lock().unwrap();
            if slot.is_none() {
                let late_calls = Arc::clone(&late_calls);
                *slot = Some(store_handle.subscribe(move |_| {
                    late_calls.fetch_add(1, Ordering::SeqCst);
                }));
            }
        })
    };

    store.update_tour(campus(), |t| t.description = "one".into());
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    store.update_tour(campus(), |t| t.description = "two".into());
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unsubscribing_during_fan_out_skips_the_rest() {
    let store = hydrated().await;
    let victim: Arc<Mutex<Option<Subscription>>> = Arc::default();
    let victim_calls = Arc::new(AtomicUsize::new(0));

    let _killer = {
        let victim = Arc::clone(&victim);
        store.subscribe(move |_| {
            if let Some(subscription) = victim.lock().unwrap().take() {
                subscription.unsubscribe();
            }
        })
    };
    *victim.lock().unwrap() = Some({
        let victim_calls = Arc::clone(&victim_calls);
        store.subscribe(move |_| {
            victim_calls.fetch_add(1, Ordering::SeqCst);
        })
    });
    assert_eq!(store.subscriber_count(), 2);

    store.update_tour(campus(), |t| t.description = "changed".into());
    assert_eq!(victim_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.subscriber_count(), 1);
}

#[tokio::test]
async fn subscriber_may_read_the_store() {
    let store = hydrated().await;
    let read = Arc::new(Mutex::new(String::new()));
    let _subscription = {
        let store_handle = store.clone();
        let read = Arc::clone(&read);
        store.subscribe(move |_| {
            *read.lock().unwrap() = store_handle.tour(Some(campus())).description.clone();
        })
    };
    store.update_tour(campus(), |t| t.description = "read back".into());
    assert_eq!(*read.lock().unwrap(), "read back");
}

#[tokio::test]
async fn later_subscribers_see_edits_made_by_earlier_ones() {
    let store = hydrated().await;
    let _editor = {
        let store_handle = store.clone();
        store.subscribe(move |tours| {
            if tours[&campus()].description == "one" {
                store_handle.update_tour(campus(), |t| t.description = "two".into());
            }
        })
    };
    let seen = Arc::new(Mutex::new(Vec::new()));
    let _watcher = {
        let seen = Arc::clone(&seen);
        store.subscribe(move |tours| {
            seen.lock().unwrap().push(tours[&campus()].description.clone());
        })
    };

    store.update_tour(campus(), |t| t.description = "one".into());
    assert_eq!(store.tour(Some(campus())).description, "two");
    let seen = seen.lock().unwrap();
    assert!(!seen.contains(&"one".to_string()));
    assert_eq!(seen.last().map(String::as_str), Some("two"));
}

// ─── Scopes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_location_leaves_dangling_paths() {
    let store = hydrated().await;
    let scope = TourScope::new(&store, RouteParams::parse(Some("campus"), None));
    assert!(scope.remove_location(loc("dexter-edge")));
    assert!(!scope.remove_location(loc("dexter-edge")));

    let tour = scope.get();
    assert!(!tour.locations.contains_key(&loc("dexter-edge")));
    let mid = &tour.locations[&loc("dexter-mid")];
    assert_eq!(mid.overlays[0].actions[0].destination(), Some(loc("dexter-edge")));

    let graph = store.compile_tour(campus());
    assert!(graph.edges.iter().any(|e| e.to == loc("dexter-edge")));
    assert!(graph.nodes.iter().all(|n| n.id != loc("dexter-edge")));

    let rules: Vec<_> = store.diagnostics(campus()).iter().map(|d| d.rule).collect();
    assert_eq!(rules, vec!["dangling-destination"]);
}

#[tokio::test]
async fn scoped_overlay_edits_keep_siblings() {
    let store = hydrated().await;
    let scope = TourScope::new(&store, RouteParams::parse(Some("campus"), None))
        .location(Some(loc("dexter-mid")));
    let before = scope.get();
    let first = before.overlays[0].id;

    let renamed = scope.update_overlay(first, |o| {
        o.title = "Stroll to the edge".into();
        o.title.clone()
    });
    assert_eq!(renamed.as_deref(), Some("Stroll to the edge"));

    let after = scope.get();
    assert!(!Arc::ptr_eq(&before.overlays[0], &after.overlays[0]));
    assert!(Arc::ptr_eq(&before.overlays[1], &after.overlays[1]));

    assert!(scope.add_action(
        first,
        OverlayAction::Info {
            title: "Note".into(),
            information: "Watch the sprinklers".into(),
        }
    ));
    assert_eq!(scope.get().overlays[0].actions.len(), 2);
    assert!(matches!(
        scope.remove_action(first, 1),
        Some(OverlayAction::Info { .. })
    ));
    assert_eq!(scope.remove_action(first, 5), None);

    assert!(scope.remove_overlay(first));
    assert!(!scope.remove_overlay(first));
    assert_eq!(scope.get().overlays.len(), 1);
}

#[tokio::test]
async fn created_tours_get_unique_slugs() {
    let store = hydrated().await;
    let id = store.create_tour("Campus", "Second campus");
    assert_eq!(id.as_str(), "campus-2");
    assert_eq!(store.tour(Some(id)).description, "Second campus");
    assert_eq!(store.save_status(id), SaveStatus::Pending);
    assert!(store.compile_tour(id).is_empty());
}
