/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable after creation. Addressed to a user, never an endpoint; device
/// fan-out happens at render time.
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Tag,
    pub target_url: Option<String>,
    pub require_interaction: bool,
    pub actions: Vec<PayloadAction>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct PayloadAction {
    pub action: String,
    pub title: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub user_id: UserId,
    pub payload: NotificationPayload,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct PushSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub endpoint: Endpoint,
    pub keys: SubscriptionKeys,
    pub user_agent: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
