/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{common::types::*, storage::types::*};
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// Registry of push endpoints per user, one row per (user, endpoint).
/// Browsers rotate subscription objects for the same logical device, so
/// registration is an upsert. Rows are deactivated rather than deleted;
/// deletion happens only through explicit purge.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<SubscriptionId, PushSubscription>,
    user_index: DashMap<UserId, Vec<SubscriptionId>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert on (user, endpoint). The per-user index entry lock is held
    /// across the lookup and the insert, so two concurrent registrations of
    /// the same endpoint cannot create a duplicate row.
    pub fn register(
        &self,
        user_id: UserId,
        endpoint: Endpoint,
        keys: SubscriptionKeys,
        user_agent: String,
    ) -> SubscriptionId {
        let mut ids = self.user_index.entry(user_id.clone()).or_default();

        let existing = ids
            .iter()
            .find(|id| {
                self.subscriptions
                    .get(id)
                    .map(|subscription| subscription.endpoint == endpoint)
                    .unwrap_or(false)
            })
            .cloned();

        if let Some(id) = existing {
            // Re-registration, e.g. key rotation. Update in place.
            if let Some(mut subscription) = self.subscriptions.get_mut(&id) {
                subscription.keys = keys;
                subscription.user_agent = user_agent;
                subscription.is_active = true;
                subscription.updated_at = Utc::now();
            }
            return id;
        }

        let now = Utc::now();
        let id = SubscriptionId(Uuid::new_v4().to_string());
        self.subscriptions.insert(
            id.clone(),
            PushSubscription {
                id: id.clone(),
                user_id,
                endpoint,
                keys,
                user_agent,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        );
        ids.push(id.clone());
        id
    }

    /// Flips the row inactive and keeps it for audit. Returns whether a
    /// matching row existed, active or not.
    pub fn deactivate(&self, user_id: &UserId, endpoint: &Endpoint) -> bool {
        let ids = match self.user_index.get(user_id) {
            Some(entry) => entry.clone(),
            None => return false,
        };
        for id in ids {
            if let Some(mut subscription) = self.subscriptions.get_mut(&id) {
                if &subscription.endpoint == endpoint {
                    subscription.is_active = false;
                    subscription.updated_at = Utc::now();
                    return true;
                }
            }
        }
        false
    }

    /// Deletes inactive rows for a user. Manual cleanup only, never automatic.
    pub fn purge_inactive(&self, user_id: &UserId) -> usize {
        let mut ids = match self.user_index.get_mut(user_id) {
            Some(entry) => entry,
            None => return 0,
        };
        let inactive: Vec<SubscriptionId> = ids
            .iter()
            .filter(|id| {
                self.subscriptions
                    .get(id)
                    .map(|subscription| !subscription.is_active)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        for id in &inactive {
            self.subscriptions.remove(id);
        }
        ids.retain(|id| !inactive.contains(id));
        inactive.len()
    }

    pub fn list_active(&self, user_id: &UserId) -> Vec<PushSubscription> {
        let ids = match self.user_index.get(user_id) {
            Some(entry) => entry.clone(),
            None => return Vec::new(),
        };
        ids.iter()
            .filter_map(|id| self.subscriptions.get(id).map(|subscription| subscription.clone()))
            .filter(|subscription| subscription.is_active)
            .collect()
    }
}
