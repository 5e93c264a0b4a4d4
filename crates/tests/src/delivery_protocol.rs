/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use notification_delivery::{
    agents::{
        agent::DeliveryAgent,
        renderer::{NotificationRenderer, RenderError},
    },
    common::types::{AgentKind, NotificationId, Tag, UserId},
    storage::{
        pending::PendingStore,
        types::NotificationPayload,
    },
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// Models the platform notification tray of one device: renders with the
/// same tag replace each other, so at most one notification per tag is ever
/// visible, no matter how many times it was rendered.
#[derive(Default)]
struct DeviceTray {
    visible: Mutex<HashMap<String, String>>,
    render_calls: AtomicUsize,
    fail_renders: AtomicBool,
}

impl DeviceTray {
    fn visible_count(&self) -> usize {
        self.visible.lock().unwrap().len()
    }
}

#[tonic::async_trait]
impl NotificationRenderer for DeviceTray {
    async fn render(&self, tag: &Tag, payload: &NotificationPayload) -> Result<(), RenderError> {
        if self.fail_renders.load(Ordering::SeqCst) {
            return Err(RenderError::PermissionRevoked);
        }
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        self.visible
            .lock()
            .unwrap()
            .insert(tag.0.clone(), payload.title.clone());
        Ok(())
    }
}

/// Same tray, but both agents must enter `render` before either may return,
/// forcing the "both rendered before either acked" interleaving.
struct RendezvousTray {
    tray: Arc<DeviceTray>,
    barrier: tokio::sync::Barrier,
}

#[tonic::async_trait]
impl NotificationRenderer for RendezvousTray {
    async fn render(&self, tag: &Tag, payload: &NotificationPayload) -> Result<(), RenderError> {
        self.barrier.wait().await;
        self.tray.render(tag, payload).await
    }
}

fn payload(tag: &str, title: &str) -> NotificationPayload {
    NotificationPayload {
        title: title.to_string(),
        body: format!("{} body", title),
        icon: Some("/icon-192x192.png".to_string()),
        badge: None,
        tag: Tag(tag.to_string()),
        target_url: Some("/dashboard?tab=orders".to_string()),
        require_interaction: true,
        actions: Vec::new(),
    }
}

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

#[tokio::test]
async fn count_tracks_enqueued_minus_acked() {
    let store = PendingStore::new();

    // Zero registered endpoints is fine: the queue accumulates regardless.
    let id_a = store.enqueue(user("seller-1"), payload("order-1001", "New order"));
    let _id_b = store.enqueue(user("seller-1"), payload("order-1002", "New order"));
    store.enqueue(user("buyer-9"), payload("order-status-77", "Order shipped"));

    assert_eq!(store.count_undelivered(&user("seller-1")), 2);
    assert_eq!(store.count_undelivered(&user("buyer-9")), 1);
    assert_eq!(store.count_undelivered(&user("nobody")), 0);

    assert!(store.mark_delivered(&id_a).is_some());
    assert_eq!(store.count_undelivered(&user("seller-1")), 1);

    assert_eq!(store.mark_all_delivered(&user("seller-1")), 1);
    assert_eq!(store.count_undelivered(&user("seller-1")), 0);
    assert!(store.list_undelivered(&user("seller-1")).is_empty());
}

#[tokio::test]
async fn list_undelivered_is_newest_first_per_user() {
    let store = PendingStore::new();
    store.enqueue(user("u"), payload("order-1", "first"));
    store.enqueue(user("u"), payload("order-2", "second"));
    let id = store.enqueue(user("u"), payload("order-3", "third"));
    store.enqueue(user("u"), payload("order-4", "fourth"));

    store.mark_delivered(&id);

    let tags: Vec<String> = store
        .list_undelivered(&user("u"))
        .into_iter()
        .map(|record| record.payload.tag.0)
        .collect();
    assert_eq!(tags, vec!["order-4", "order-2", "order-1"]);
}

#[tokio::test]
async fn mark_delivered_is_idempotent() {
    let store = PendingStore::new();
    let id = store.enqueue(user("u"), payload("order-1", "New order"));

    let first = store.mark_delivered(&id);
    assert!(first.is_some());
    let snapshot = store.get(&id).unwrap();
    assert!(snapshot.is_delivered);
    assert!(snapshot.delivered_at.is_some());

    // Second ack is a no-op and leaves the record byte-identical.
    assert!(store.mark_delivered(&id).is_none());
    assert_eq!(store.get(&id).unwrap(), snapshot);
}

#[tokio::test]
async fn stale_ack_is_a_noop_success() {
    let store = PendingStore::new();
    let unknown = NotificationId(uuid::Uuid::new_v4().to_string());
    assert!(store.mark_delivered(&unknown).is_none());
    assert_eq!(store.mark_all_delivered(&user("ghost")), 0);
}

#[tokio::test]
async fn concurrent_acks_yield_exactly_one_transition() {
    let store = Arc::new(PendingStore::new());
    let id = store.enqueue(user("u"), payload("order-1", "New order"));

    let ack_1 = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.mark_delivered(&id).is_some() }
    });
    let ack_2 = tokio::spawn({
        let store = store.clone();
        let id = id.clone();
        async move { store.mark_delivered(&id).is_some() }
    });

    let (ack_1, ack_2) = tokio::join!(ack_1, ack_2);
    let transitions = usize::from(ack_1.unwrap()) + usize::from(ack_2.unwrap());
    assert_eq!(transitions, 1);
    assert!(store.get(&id).unwrap().is_delivered);
}

#[tokio::test]
async fn dual_agent_race_shows_one_notification_and_one_delivery() {
    let store = Arc::new(PendingStore::new());
    store.enqueue(user("seller-1"), payload("order-A1", "New order"));

    // One device: the background dispatcher and the in-page reconciler share
    // the tray. The rendezvous forces both to render before either acks.
    let tray = Arc::new(DeviceTray::default());
    let rendezvous = Arc::new(RendezvousTray {
        tray: tray.clone(),
        barrier: tokio::sync::Barrier::new(2),
    });

    let mut dispatcher = DeliveryAgent::new(
        AgentKind::Dispatcher,
        user("seller-1"),
        store.clone(),
        rendezvous.clone(),
    );
    let mut reconciler = DeliveryAgent::new(
        AgentKind::Reconciler,
        user("seller-1"),
        store.clone(),
        rendezvous.clone(),
    );

    let dispatcher_cycle = tokio::spawn(async move { dispatcher.poll_once().await });
    let reconciler_cycle = tokio::spawn(async move { reconciler.poll_once().await });
    let (dispatched, reconciled) = tokio::join!(dispatcher_cycle, reconciler_cycle);

    // Both agents rendered, the tray coalesced on the tag, the double ack was
    // absorbed by idempotence.
    assert_eq!(dispatched.unwrap() + reconciled.unwrap(), 2);
    assert_eq!(tray.render_calls.load(Ordering::SeqCst), 2);
    assert_eq!(tray.visible_count(), 1);
    assert_eq!(store.count_undelivered(&user("seller-1")), 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.sweep(chrono::Duration::zero()), 1);
}

#[tokio::test]
async fn render_failure_leaves_record_for_the_next_cycle() {
    let store = Arc::new(PendingStore::new());
    store.enqueue(user("u"), payload("order-1", "New order"));

    let tray = Arc::new(DeviceTray::default());
    tray.fail_renders.store(true, Ordering::SeqCst);

    let mut agent = DeliveryAgent::new(
        AgentKind::Dispatcher,
        user("u"),
        store.clone(),
        tray.clone(),
    );

    // Permission revoked: nothing rendered, nothing acked.
    assert_eq!(agent.poll_once().await, 0);
    assert_eq!(store.count_undelivered(&user("u")), 1);
    assert_eq!(tray.visible_count(), 0);

    // Permission restored: the same cycle logic retries and delivers.
    tray.fail_renders.store(false, Ordering::SeqCst);
    assert_eq!(agent.poll_once().await, 1);
    assert_eq!(store.count_undelivered(&user("u")), 0);
    assert_eq!(tray.visible_count(), 1);

    // The rendered-set keeps later cycles quiet.
    assert_eq!(agent.poll_once().await, 0);
    assert_eq!(tray.render_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn background_agent_delivers_and_shuts_down() {
    let store = Arc::new(PendingStore::new());
    let tray = Arc::new(DeviceTray::default());
    let agent = DeliveryAgent::new(
        AgentKind::Dispatcher,
        user("u"),
        store.clone(),
        tray.clone(),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let running = tokio::spawn(agent.run(Duration::from_millis(20), shutdown_rx));

    store.enqueue(user("u"), payload("order-1", "New order"));

    let mut cycles_waited = 0;
    while store.count_undelivered(&user("u")) > 0 && cycles_waited < 100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cycles_waited += 1;
    }
    assert_eq!(store.count_undelivered(&user("u")), 0);
    assert_eq!(tray.visible_count(), 1);

    shutdown_tx.send(()).unwrap();
    running.await.unwrap();
}

#[tokio::test]
async fn sweep_never_deletes_undelivered_records() {
    let store = Arc::new(PendingStore::new());
    let id = store.enqueue(user("u"), payload("order-1", "New order"));

    // No agent was online for longer than any retention window; a zero
    // window is the most aggressive sweep possible and must still not touch
    // the undelivered record.
    assert_eq!(store.sweep(chrono::Duration::zero()), 0);
    assert_eq!(store.sweep(chrono::Duration::seconds(86400)), 0);
    assert_eq!(store.count_undelivered(&user("u")), 1);

    // First agent to come online renders it exactly once.
    let tray = Arc::new(DeviceTray::default());
    let mut agent = DeliveryAgent::new(
        AgentKind::Dispatcher,
        user("u"),
        store.clone(),
        tray.clone(),
    );
    assert_eq!(agent.poll_once().await, 1);
    assert_eq!(tray.render_calls.load(Ordering::SeqCst), 1);

    // Now delivered, the record ages out.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.sweep(chrono::Duration::zero()), 1);
    assert!(store.get(&id).is_none());
}

#[tokio::test]
async fn sweep_respects_the_retention_window() {
    let store = PendingStore::new();
    let id = store.enqueue(user("u"), payload("order-1", "New order"));
    store.mark_delivered(&id);

    // Delivered a moment ago: still inside any non-zero window.
    assert_eq!(store.sweep(chrono::Duration::seconds(86400)), 0);
    assert!(store.get(&id).is_some());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.sweep(chrono::Duration::zero()), 1);
    assert!(store.get(&id).is_none());

    // Sweeping again is harmless.
    assert_eq!(store.sweep(chrono::Duration::zero()), 0);
}
