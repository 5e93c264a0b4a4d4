/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{storage::pending::PendingStore, tools::prometheus::SWEPT_NOTIFICATIONS};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::*;

/// Bounds storage growth by deleting delivered records past the retention
/// window. Runs for the lifetime of the service, with or without any client
/// online; holds no state between runs beyond what is in the store.
pub async fn run_retention_sweeper(
    pending: Arc<PendingStore>,
    retention_window_seconds: u64,
    sweep_interval_seconds: u64,
) {
    loop {
        let swept = pending.sweep(chrono::Duration::seconds(retention_window_seconds as i64));
        if swept > 0 {
            SWEPT_NOTIFICATIONS.inc_by(swept as u64);
            info!("[Retention Sweep] => deleted {} delivered notifications", swept);
        }
        sleep(Duration::from_secs(sweep_interval_seconds)).await;
    }
}
