/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::types::*,
    storage::types::{NotificationPayload, NotificationRecord, PayloadAction},
    tools::error::AppError,
    ContentAction, NotificationContent, PendingNotification,
};
use chrono::{DateTime, Utc};

pub fn abs_diff_utc_as_sec(old: DateTime<Utc>, new: DateTime<Utc>) -> u64 {
    new.signed_duration_since(old).num_seconds().abs_diff(0)
}

/// Enqueue contract: title, body and the coalescing tag are mandatory.
pub fn validate_content(content: &NotificationContent) -> Result<(), AppError> {
    if content.title.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "content.title must be non-empty".to_string(),
        ));
    }
    if content.body.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "content.body must be non-empty".to_string(),
        ));
    }
    if content.tag.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "content.tag must be non-empty".to_string(),
        ));
    }
    Ok(())
}

pub fn payload_from_content(content: NotificationContent) -> NotificationPayload {
    NotificationPayload {
        title: content.title,
        body: content.body,
        icon: (!content.icon.is_empty()).then_some(content.icon),
        badge: (!content.badge.is_empty()).then_some(content.badge),
        tag: Tag(content.tag),
        target_url: (!content.target_url.is_empty()).then_some(content.target_url),
        require_interaction: content.require_interaction,
        actions: content
            .actions
            .into_iter()
            .map(|action| PayloadAction {
                action: action.action,
                title: action.title,
            })
            .collect(),
    }
}

pub fn content_from_payload(payload: NotificationPayload) -> NotificationContent {
    let Tag(tag) = payload.tag;
    NotificationContent {
        title: payload.title,
        body: payload.body,
        icon: payload.icon.unwrap_or_default(),
        badge: payload.badge.unwrap_or_default(),
        tag,
        target_url: payload.target_url.unwrap_or_default(),
        require_interaction: payload.require_interaction,
        actions: payload
            .actions
            .into_iter()
            .map(|action| ContentAction {
                action: action.action,
                title: action.title,
            })
            .collect(),
    }
}

pub fn record_to_pending(record: NotificationRecord) -> PendingNotification {
    let NotificationId(id) = record.id;
    let UserId(user_id) = record.user_id;
    PendingNotification {
        id,
        user_id,
        content: Some(content_from_payload(record.payload)),
        created_at: record
            .created_at
            .format("%Y-%m-%dT%H:%M:%S%.fZ")
            .to_string(),
    }
}
