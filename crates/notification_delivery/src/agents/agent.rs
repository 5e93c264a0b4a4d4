/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    agents::renderer::NotificationRenderer,
    common::{
        types::{AgentKind, NotificationId, UserId},
        utils::abs_diff_utc_as_sec,
    },
    notification_latency,
    storage::pending::PendingStore,
    tools::prometheus::{DELIVERED_NOTIFICATIONS, NOTIFICATION_LATENCY, RENDER_FAILURES},
};
use chrono::Utc;
use rustc_hash::FxHashSet;
use std::{sync::Arc, time::Duration};
use tokio::{sync::oneshot, time::sleep};
use tracing::*;

/// One polling delivery agent for one (user, device). The background
/// Dispatcher and the in-page Reconciler are two instances of this type that
/// share nothing but the store, and may fire in any relative order.
pub struct DeliveryAgent {
    kind: AgentKind,
    user_id: UserId,
    pending: Arc<PendingStore>,
    renderer: Arc<dyn NotificationRenderer>,
    // Ids this instance already handled. Volatile and reset on restart; an
    // optimization only, never a correctness mechanism. Entries are added
    // only after the ack attempt for the same cycle has completed.
    rendered: FxHashSet<NotificationId>,
}

impl DeliveryAgent {
    pub fn new(
        kind: AgentKind,
        user_id: UserId,
        pending: Arc<PendingStore>,
        renderer: Arc<dyn NotificationRenderer>,
    ) -> Self {
        DeliveryAgent {
            kind,
            user_id,
            pending,
            renderer,
            rendered: FxHashSet::default(),
        }
    }

    /// One fetch -> render -> ack cycle. Returns how many records this agent
    /// rendered during the cycle.
    ///
    /// A concurrent peer may render and ack the same records; the visible
    /// duplicate collapses through tag coalescing and the duplicate ack is a
    /// store-side no-op. A render failure leaves the record undelivered and
    /// out of the rendered-set, so the next cycle retries it.
    pub async fn poll_once(&mut self) -> usize {
        let undelivered = self.pending.list_undelivered(&self.user_id);
        let mut rendered_now = 0;
        for record in undelivered {
            if self.rendered.contains(&record.id) {
                continue;
            }
            match self
                .renderer
                .render(&record.payload.tag, &record.payload)
                .await
            {
                Ok(()) => {
                    rendered_now += 1;
                    // Ack strictly after a successful render. Losing the
                    // race to the peer agent is fine.
                    if let Some(delivered) = self.pending.mark_delivered(&record.id) {
                        DELIVERED_NOTIFICATIONS.inc();
                        notification_latency!(delivered.created_at);
                    }
                    self.rendered.insert(record.id);
                }
                Err(err) => {
                    RENDER_FAILURES.inc();
                    warn!(
                        "[{}] render failed for {:?} : {}",
                        self.kind, record.id, err
                    );
                }
            }
        }
        rendered_now
    }

    pub async fn run(mut self, poll_interval: Duration, mut shutdown_rx: oneshot::Receiver<()>) {
        info!(
            "[{}] polling every {:?} for {:?}",
            self.kind, poll_interval, self.user_id
        );
        loop {
            // Poll on startup: records that accumulated while no agent was
            // online render on the first cycle.
            self.poll_once().await;
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("[{}] shutting down", self.kind);
                    break;
                }
                _ = sleep(poll_interval) => {}
            }
        }
    }
}
