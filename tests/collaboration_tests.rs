/// Multi-client collaboration tests
///
/// Several views mounted on one in-memory backend, the way several members
/// of a household look at the same space from different devices.
/// Run with: cargo test --test collaboration_tests

mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::{settle, wait_until};
use hearthsync::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

type View<E> = SyncView<E, InMemoryBackend<E>, MemoryNotifier>;

async fn mount_with<E: Entity>(
    backend: &Arc<InMemoryBackend<E>>,
    config: SyncConfig,
) -> (View<E>, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let view = SyncView::<E, _, _>::builder(backend.clone(), notifier.clone())
        .config(config)
        .scope(ScopeFilter::Space("home".into()))
        .mount(backend.as_ref())
        .await
        .unwrap();
    (view, notifier)
}

async fn mount<E: Entity>(backend: &Arc<InMemoryBackend<E>>) -> (View<E>, Arc<MemoryNotifier>) {
    mount_with(backend, SyncConfig::default()).await
}

#[tokio::test]
async fn test_remote_create_notifies_only_the_other_client() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let (alice, alice_toasts) = mount(&backend).await;
    let (bob, bob_toasts) = mount(&backend).await;

    let created = assert_ok!(alice.create(GoalDraft::new("home", "Dentist")).await);

    assert!(wait_until(|| bob.collection().contains(&created.id)).await);
    settle().await;
    assert_eq!(bob_toasts.messages(), vec!["Goal \"Dentist\" was created"]);
    assert_eq!(alice_toasts.count(), 0);
    assert_eq!(alice.snapshot(), bob.snapshot());
}

#[tokio::test]
async fn test_concurrent_edits_converge_on_every_client() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let (alice, _) = mount(&backend).await;
    let (bob, _) = mount(&backend).await;

    for title in ["Dentist", "Roof", "Garden"] {
        alice.create(GoalDraft::new("home", title)).await.unwrap();
    }
    assert!(wait_until(|| bob.snapshot().len() == 3).await);

    let ids = bob.snapshot().ids();
    let renames = ids
        .iter()
        .map(|id| alice.update(id, GoalPatch::title(format!("{id} renamed"))));
    let cycles = ids.iter().map(|id| bob.cycle_status(id));
    let (renamed, cycled) = futures::join!(
        futures::future::join_all(renames),
        futures::future::join_all(cycles)
    );
    assert!(renamed.iter().all(|r| r.is_ok()));
    assert!(cycled.iter().all(|r| r.is_ok()));

    bob.delete(&ids[0]).await.unwrap();

    let expected = backend.all();
    assert!(wait_until(|| alice.snapshot().to_vec() == expected).await);
    assert!(wait_until(|| bob.snapshot().to_vec() == expected).await);
    assert!(expected.iter().all(|g| g.status == ProgressStatus::InProgress));
}

#[tokio::test]
async fn test_remote_delete_of_unknown_record_is_silent() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let (view, toasts) = mount(&backend).await;

    backend.publish(ChangeEvent::Delete {
        id: "srv-77".into(),
    });
    settle().await;

    assert!(view.snapshot().is_empty());
    assert_eq!(toasts.count(), 0);
}

#[tokio::test]
async fn test_events_from_other_spaces_are_ignored() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let (view, toasts) = mount(&backend).await;

    backend
        .create(&GoalDraft::new("cabin", "Fix dock"))
        .await
        .unwrap();
    backend
        .create(&GoalDraft::new("home", "Paint fence"))
        .await
        .unwrap();

    assert!(wait_until(|| view.snapshot().len() == 1).await);
    settle().await;
    assert_eq!(view.snapshot().len(), 1);
    assert_eq!(toasts.messages(), vec!["Goal \"Paint fence\" was created"]);
}

#[tokio::test]
async fn test_unmounted_view_stops_receiving_updates() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let (alice, _) = mount(&backend).await;
    let (bob, bob_toasts) = mount(&backend).await;
    let bob_collection = bob.collection().clone();

    bob.unmount();
    alice.create(GoalDraft::new("home", "Dentist")).await.unwrap();
    settle().await;

    assert!(!bob_collection.is_live());
    assert!(bob_collection.is_empty());
    assert_eq!(bob_toasts.count(), 0);
    assert_eq!(backend.subscriber_count(), 1);
}

#[tokio::test]
async fn test_resubscribe_picks_up_missed_writes() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let (mut view, _) = mount(&backend).await;

    // written while the client was disconnected: no event reaches it
    backend.seed([Goal::from_draft(
        "srv-9".into(),
        &GoalDraft::new("home", "Insurance"),
        Utc::now(),
    )]);
    assert!(view.snapshot().is_empty());

    assert_ok!(view.resubscribe(backend.as_ref()).await);
    assert!(view.is_subscribed());
    assert_eq!(view.snapshot().ids(), vec!["srv-9".to_string()]);

    backend
        .create(&GoalDraft::new("home", "Roof"))
        .await
        .unwrap();
    assert!(wait_until(|| view.snapshot().len() == 2).await);
}

#[tokio::test]
async fn test_lagging_subscriber_reloads_full_list() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(2));
    let config = SyncConfig::default().channel_capacity(2);
    let (alice, _) = mount_with(&backend, config.clone()).await;
    let (bob, _) = mount_with(&backend, config).await;

    for n in 0..10 {
        alice
            .create(GoalDraft::new("home", format!("Goal {n}")))
            .await
            .unwrap();
    }

    assert!(wait_until(|| bob.snapshot().len() == 10).await);
    assert!(bob.collection().reload_count() >= 2);
    assert_eq!(bob.snapshot().to_vec(), backend.all());
}

#[tokio::test]
async fn test_rejection_reloads_when_configured() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let config = SyncConfig::default().reload_after_rollback(true);
    let (view, _) = mount_with(&backend, config).await;
    let created = view.create(GoalDraft::new("home", "Dentist")).await.unwrap();

    backend.seed([Goal::from_draft(
        "srv-50".into(),
        &GoalDraft::new("home", "Insurance"),
        Utc::now(),
    )]);
    backend.fail_next(1);
    let err = view
        .update(&created.id, GoalPatch::title("Orthodontist"))
        .await
        .unwrap_err();
    assert!(err.is_rejection());

    assert!(view.collection().contains("srv-50"));
    assert_eq!(
        view.collection().get(&created.id).map(|g| g.title),
        Some("Dentist".to_string())
    );
    assert_eq!(view.collection().reload_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lost_echo_stops_suppressing_after_grace() {
    let backend = Arc::new(InMemoryBackend::<Goal>::new(64));
    let config = SyncConfig::default()
        .tracked_ttl(Duration::from_secs(10))
        .echo_grace(Duration::from_secs(3));
    let (alice, alice_toasts) = mount_with(&backend, config.clone()).await;
    let (bob, _) = mount_with(&backend, config).await;

    let created = alice.create(GoalDraft::new("home", "Dentist")).await.unwrap();
    assert!(wait_until(|| bob.collection().contains(&created.id)).await);
    settle().await;

    backend.hold_changes();
    alice
        .update(&created.id, GoalPatch::title("Orthodontist"))
        .await
        .unwrap();
    assert_eq!(backend.discard_held_changes(), 1);
    assert!(alice.collection().is_tracked(&created.id));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!alice.collection().is_tracked(&created.id));

    bob.cycle_status(&created.id).await.unwrap();
    assert!(wait_until(|| alice_toasts.count() == 1).await);
    assert_eq!(
        alice_toasts.messages(),
        vec!["Goal \"Orthodontist\" was updated"]
    );
}

#[tokio::test]
async fn test_milestones_follow_known_goals_only() {
    let goals = Arc::new(InMemoryBackend::<Goal>::new(64));
    let milestones = Arc::new(InMemoryBackend::<Milestone>::new(64));
    let (goal_view, _) = mount(&goals).await;
    let goal = goal_view
        .create(GoalDraft::new("home", "Renovate kitchen"))
        .await
        .unwrap();

    let toasts = Arc::new(MemoryNotifier::new());
    let milestone_view = SyncView::<Milestone, _, _>::builder(milestones.clone(), toasts.clone())
        .parents(Arc::new(goal_view.collection().clone()))
        .mount(milestones.as_ref())
        .await
        .unwrap();

    let now = Utc::now();
    let ours = Milestone::from_draft("srv-1".into(), &MilestoneDraft::new(&goal.id, "Buy paint"), now);
    let theirs = Milestone::from_draft("srv-2".into(), &MilestoneDraft::new("srv-999", "Tiles"), now);
    milestones.publish(ChangeEvent::Insert { entity: theirs });
    milestones.publish(ChangeEvent::Insert { entity: ours });

    assert!(wait_until(|| milestone_view.snapshot().len() == 1).await);
    settle().await;
    assert_eq!(milestone_view.snapshot().ids(), vec!["srv-1".to_string()]);
    assert_eq!(toasts.messages(), vec!["Milestone \"Buy paint\" was created"]);
}

#[tokio::test]
async fn test_calendar_reschedule_reaches_other_client() {
    let backend = Arc::new(InMemoryBackend::<CalendarEvent>::new(64));
    let (alice, _) = mount(&backend).await;
    let (bob, bob_toasts) = mount(&backend).await;

    let starts_at = Utc.with_ymd_and_hms(2026, 11, 3, 9, 0, 0).unwrap();
    let event = alice
        .create(CalendarEventDraft::new("home", "Dentist", starts_at))
        .await
        .unwrap();
    assert_eq!(event.ends_at, starts_at + ChronoDuration::hours(1));

    let moved = starts_at + ChronoDuration::days(1);
    alice
        .update(
            &event.id,
            CalendarEventPatch::reschedule(moved, moved + ChronoDuration::minutes(30)),
        )
        .await
        .unwrap();

    assert!(
        wait_until(|| bob
            .collection()
            .get(&event.id)
            .is_some_and(|e| e.starts_at == moved))
        .await
    );
    settle().await;
    assert_eq!(
        bob_toasts.messages(),
        vec!["Event \"Dentist\" was created", "Event \"Dentist\" was updated"]
    );
}
