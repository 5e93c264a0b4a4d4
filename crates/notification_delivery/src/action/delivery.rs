/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::{
        types::*,
        utils::{abs_diff_utc_as_sec, payload_from_content, record_to_pending, validate_content},
    },
    environment::AppState,
    notification_delivery_server::NotificationDelivery,
    notification_latency,
    outbound::external::forward_to_push_gateway,
    storage::types::{NotificationPayload, SubscriptionKeys},
    tools::{
        callapi::CallApiError,
        error::AppError,
        prometheus::{
            DELIVERED_NOTIFICATIONS, ENQUEUED_NOTIFICATIONS, NOTIFICATION_LATENCY,
            REGISTERED_SUBSCRIPTIONS,
        },
    },
    ActiveSubscription, CountUndeliveredReply, CountUndeliveredRequest,
    DeactivateSubscriptionReply, DeactivateSubscriptionRequest, EnqueueReply, EnqueueRequest,
    ListActiveSubscriptionsReply, ListActiveSubscriptionsRequest, ListUndeliveredReply,
    ListUndeliveredRequest, MarkAllDeliveredReply, MarkAllDeliveredRequest, MarkDeliveredReply,
    MarkDeliveredRequest, PurgeInactiveSubscriptionsReply, PurgeInactiveSubscriptionsRequest,
    RegisterSubscriptionReply, RegisterSubscriptionRequest,
};
use chrono::Utc;
use futures::future::join_all;
use reqwest::StatusCode;
use tonic::{Request, Response, Status};
use tracing::*;

pub struct DeliveryService {
    app_state: AppState,
}

impl DeliveryService {
    pub fn new(app_state: AppState) -> Self {
        DeliveryService { app_state }
    }
}

/// Out-of-band push through the platform gateway, one attempt per active
/// endpoint. Best-effort acceleration only: the store stays the source of
/// truth and no outcome here touches queue state. A `410 Gone` means the
/// gateway considers the endpoint permanently dead, so its registration is
/// deactivated.
async fn accelerate_delivery(app_state: AppState, user_id: UserId, payload: NotificationPayload) {
    let push_gateway = match app_state.push_gateway.as_ref() {
        Some(push_gateway) => push_gateway,
        None => return,
    };

    let subscriptions = app_state.subscriptions.list_active(&user_id);
    let forwards = subscriptions
        .iter()
        .map(|subscription| forward_to_push_gateway(push_gateway, subscription, &payload));

    for (subscription, result) in subscriptions.iter().zip(join_all(forwards).await) {
        match result {
            Ok(_) => {}
            Err(CallApiError::ExternalAPICallError(response))
                if response.status() == StatusCode::GONE =>
            {
                let _ = app_state
                    .subscriptions
                    .deactivate(&user_id, &subscription.endpoint);
                info!(
                    "[Push Gateway] deactivated dead endpoint {:?} for {:?}",
                    subscription.endpoint, user_id
                );
            }
            Err(err) => warn!("[Push Gateway] forward failed : {}", err),
        }
    }
}

#[tonic::async_trait]
impl NotificationDelivery for DeliveryService {
    async fn enqueue(
        &self,
        request: Request<EnqueueRequest>,
    ) -> Result<Response<EnqueueReply>, Status> {
        let EnqueueRequest { user_id, content } = request.into_inner();
        if user_id.is_empty() {
            return Err(AppError::InvalidRequest("user_id must be non-empty".to_string()).into());
        }
        let content = content.ok_or(AppError::InvalidRequest(
            "content is required".to_string(),
        ))?;
        validate_content(&content)?;

        let user_id = UserId(user_id);
        let payload = payload_from_content(content);
        let NotificationId(notification_id) = self
            .app_state
            .pending
            .enqueue(user_id.clone(), payload.clone());
        ENQUEUED_NOTIFICATIONS.inc();

        tokio::spawn(accelerate_delivery(
            self.app_state.clone(),
            user_id,
            payload,
        ));

        Ok(Response::new(EnqueueReply { notification_id }))
    }

    async fn list_undelivered(
        &self,
        request: Request<ListUndeliveredRequest>,
    ) -> Result<Response<ListUndeliveredReply>, Status> {
        let ListUndeliveredRequest { user_id } = request.into_inner();
        let notifications = self
            .app_state
            .pending
            .list_undelivered(&UserId(user_id))
            .into_iter()
            .map(record_to_pending)
            .collect();
        Ok(Response::new(ListUndeliveredReply { notifications }))
    }

    async fn count_undelivered(
        &self,
        request: Request<CountUndeliveredRequest>,
    ) -> Result<Response<CountUndeliveredReply>, Status> {
        let CountUndeliveredRequest { user_id } = request.into_inner();
        let count = self.app_state.pending.count_undelivered(&UserId(user_id)) as u64;
        Ok(Response::new(CountUndeliveredReply { count }))
    }

    async fn mark_delivered(
        &self,
        request: Request<MarkDeliveredRequest>,
    ) -> Result<Response<MarkDeliveredReply>, Status> {
        let MarkDeliveredRequest { notification_id } = request.into_inner();
        match self
            .app_state
            .pending
            .mark_delivered(&NotificationId(notification_id))
        {
            Some(delivered) => {
                DELIVERED_NOTIFICATIONS.inc();
                notification_latency!(delivered.created_at);
                Ok(Response::new(MarkDeliveredReply {
                    newly_delivered: true,
                }))
            }
            // Already delivered, or swept concurrently. A stale ack is a
            // no-op success, never an error.
            None => Ok(Response::new(MarkDeliveredReply {
                newly_delivered: false,
            })),
        }
    }

    async fn mark_all_delivered(
        &self,
        request: Request<MarkAllDeliveredRequest>,
    ) -> Result<Response<MarkAllDeliveredReply>, Status> {
        let MarkAllDeliveredRequest { user_id } = request.into_inner();
        let marked = self.app_state.pending.mark_all_delivered(&UserId(user_id));
        DELIVERED_NOTIFICATIONS.inc_by(marked as u64);
        Ok(Response::new(MarkAllDeliveredReply {
            marked: marked as u64,
        }))
    }

    async fn register_subscription(
        &self,
        request: Request<RegisterSubscriptionRequest>,
    ) -> Result<Response<RegisterSubscriptionReply>, Status> {
        let RegisterSubscriptionRequest {
            user_id,
            endpoint,
            p256dh,
            auth,
            user_agent,
        } = request.into_inner();
        if user_id.is_empty() || endpoint.is_empty() {
            return Err(AppError::InvalidRequest(
                "user_id and endpoint must be non-empty".to_string(),
            )
            .into());
        }
        if p256dh.is_empty() || auth.is_empty() {
            return Err(AppError::InvalidRequest(
                "subscription keys must be non-empty".to_string(),
            )
            .into());
        }

        let SubscriptionId(subscription_id) = self.app_state.subscriptions.register(
            UserId(user_id),
            Endpoint(endpoint),
            SubscriptionKeys { p256dh, auth },
            user_agent,
        );
        REGISTERED_SUBSCRIPTIONS.inc();
        Ok(Response::new(RegisterSubscriptionReply { subscription_id }))
    }

    async fn deactivate_subscription(
        &self,
        request: Request<DeactivateSubscriptionRequest>,
    ) -> Result<Response<DeactivateSubscriptionReply>, Status> {
        let DeactivateSubscriptionRequest { user_id, endpoint } = request.into_inner();
        let existed = self
            .app_state
            .subscriptions
            .deactivate(&UserId(user_id), &Endpoint(endpoint));
        Ok(Response::new(DeactivateSubscriptionReply { existed }))
    }

    async fn purge_inactive_subscriptions(
        &self,
        request: Request<PurgeInactiveSubscriptionsRequest>,
    ) -> Result<Response<PurgeInactiveSubscriptionsReply>, Status> {
        let PurgeInactiveSubscriptionsRequest { user_id } = request.into_inner();
        let purged = self
            .app_state
            .subscriptions
            .purge_inactive(&UserId(user_id)) as u64;
        Ok(Response::new(PurgeInactiveSubscriptionsReply { purged }))
    }

    async fn list_active_subscriptions(
        &self,
        request: Request<ListActiveSubscriptionsRequest>,
    ) -> Result<Response<ListActiveSubscriptionsReply>, Status> {
        let ListActiveSubscriptionsRequest { user_id } = request.into_inner();
        let subscriptions = self
            .app_state
            .subscriptions
            .list_active(&UserId(user_id))
            .into_iter()
            .map(|subscription| {
                let SubscriptionId(id) = subscription.id;
                let Endpoint(endpoint) = subscription.endpoint;
                ActiveSubscription {
                    id,
                    endpoint,
                    user_agent: subscription.user_agent,
                }
            })
            .collect();
        Ok(Response::new(ListActiveSubscriptionsReply { subscriptions }))
    }
}
