/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    environment::PushGateway,
    storage::types::{NotificationPayload, PushSubscription, SubscriptionKeys},
    tools::callapi::{call_api, CallApiError},
};
use reqwest::Method;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PushGatewayRequest<'a> {
    pub endpoint: &'a str,
    pub keys: &'a SubscriptionKeys,
    pub payload: &'a NotificationPayload,
}

#[derive(Debug, Deserialize)]
pub struct GatewayAccepted {
    pub success: bool,
}

/// Hands one payload to the platform push gateway for one endpoint. The
/// gateway owns retry and backoff; this call is fire-and-observe.
pub async fn forward_to_push_gateway(
    push_gateway: &PushGateway,
    subscription: &PushSubscription,
    payload: &NotificationPayload,
) -> Result<GatewayAccepted, CallApiError> {
    call_api::<GatewayAccepted, PushGatewayRequest>(
        Method::POST,
        &push_gateway.url,
        vec![
            ("content-type", "application/json"),
            ("api-key", push_gateway.api_key.as_str()),
        ],
        Some(PushGatewayRequest {
            endpoint: &subscription.endpoint.0,
            keys: &subscription.keys,
            payload,
        }),
    )
    .await
}
