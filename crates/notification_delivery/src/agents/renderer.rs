/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{common::types::Tag, storage::types::NotificationPayload};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("notification permission revoked")]
    PermissionRevoked,
    #[error("notification facility unavailable : {0}")]
    Unavailable(String),
}

/// The platform-local notification facility, injected into the agents.
///
/// The platform coalesces on `tag`: rendering the same tag twice on one
/// device replaces the visible notification instead of stacking a duplicate.
/// A failed render must leave no trace; the caller retries on its next cycle.
#[tonic::async_trait]
pub trait NotificationRenderer: Send + Sync {
    async fn render(&self, tag: &Tag, payload: &NotificationPayload) -> Result<(), RenderError>;
}
