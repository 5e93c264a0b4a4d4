/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{common::types::*, storage::types::*};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Durable queue of per-user pending notifications. One record per
/// (user, event); delivery is marked exactly once and is monotonic.
///
/// All invariants hold at the granularity of a single record, so per-entry
/// exclusive access is the only synchronization needed. The per-user index
/// keeps `list_undelivered`/`count_undelivered` off the full record set and
/// preserves creation order per user.
#[derive(Default)]
pub struct PendingStore {
    records: DashMap<NotificationId, NotificationRecord>,
    user_index: DashMap<UserId, Vec<NotificationId>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an undelivered record. Never fails for lack of subscribers: a
    /// user with zero registered endpoints still accumulates a queue to drain
    /// on next login. Pull-based, so no delivery side effect here.
    pub fn enqueue(&self, user_id: UserId, payload: NotificationPayload) -> NotificationId {
        let id = NotificationId(Uuid::new_v4().to_string());
        let record = NotificationRecord {
            id: id.clone(),
            user_id: user_id.clone(),
            payload,
            is_delivered: false,
            delivered_at: None,
            created_at: Utc::now(),
        };
        self.records.insert(id.clone(), record);
        self.user_index.entry(user_id).or_default().push(id.clone());
        id
    }

    pub fn get(&self, id: &NotificationId) -> Option<NotificationRecord> {
        self.records.get(id).map(|record| record.clone())
    }

    /// Undelivered records for a user, newest first.
    pub fn list_undelivered(&self, user_id: &UserId) -> Vec<NotificationRecord> {
        let ids = match self.user_index.get(user_id) {
            Some(entry) => entry.clone(),
            None => return Vec::new(),
        };
        ids.iter()
            .rev()
            .filter_map(|id| self.records.get(id).map(|record| record.clone()))
            .filter(|record| !record.is_delivered)
            .collect()
    }

    /// Badge count. Walks the user index only, never the full record set.
    pub fn count_undelivered(&self, user_id: &UserId) -> usize {
        let ids = match self.user_index.get(user_id) {
            Some(entry) => entry.clone(),
            None => return 0,
        };
        ids.iter()
            .filter(|id| {
                self.records
                    .get(id)
                    .map(|record| !record.is_delivered)
                    .unwrap_or(false)
            })
            .count()
    }

    /// Sets the delivered mark and returns the record snapshot, exactly once
    /// per record. Marking an already-delivered record is a no-op, which is
    /// what resolves the dispatcher/reconciler ack race. An unknown id is a
    /// stale reference (swept after manual cleanup) and is also a no-op.
    pub fn mark_delivered(&self, id: &NotificationId) -> Option<NotificationRecord> {
        match self.records.get_mut(id) {
            Some(mut record) => {
                if record.is_delivered {
                    None
                } else {
                    record.is_delivered = true;
                    record.delivered_at = Some(Utc::now());
                    Some(record.clone())
                }
            }
            None => None,
        }
    }

    /// Bulk ack for drain-on-login. Returns how many records transitioned.
    pub fn mark_all_delivered(&self, user_id: &UserId) -> usize {
        let ids = match self.user_index.get(user_id) {
            Some(entry) => entry.clone(),
            None => return 0,
        };
        ids.iter()
            .filter(|id| self.mark_delivered(id).is_some())
            .count()
    }

    /// Deletes delivered records whose `delivered_at` is older than the
    /// retention window. Undelivered records are never deleted, for any
    /// window value: an undelivered record is an event the user has not seen
    /// yet, however stale. Safe to run concurrently with itself and with
    /// enqueue/mark, since a record past the window cannot be un-delivered.
    pub fn sweep(&self, retention_window: Duration) -> usize {
        let cutoff = Utc::now() - retention_window;
        let mut swept: Vec<(UserId, NotificationId)> = Vec::new();
        self.records.retain(|id, record| {
            let expired = record.is_delivered
                && record
                    .delivered_at
                    .map(|delivered_at| delivered_at < cutoff)
                    .unwrap_or(false);
            if expired {
                swept.push((record.user_id.clone(), id.clone()));
            }
            !expired
        });
        for (user_id, id) in &swept {
            if let Some(mut ids) = self.user_index.get_mut(user_id) {
                ids.retain(|other| other != id);
            }
        }
        swept.len()
    }
}
