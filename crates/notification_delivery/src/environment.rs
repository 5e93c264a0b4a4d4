/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use crate::{
    storage::{pending::PendingStore, subscriptions::SubscriptionRegistry},
    tools::logger::LoggerConfig,
};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, Clone)]
pub struct PushGatewayConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub grpc_port: u16,
    pub http_server_port: u16,
    pub logger_cfg: LoggerConfig,
    pub push_gateway_cfg: Option<PushGatewayConfig>,
    pub retention_window_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub dispatcher_poll_seconds: u64,
    pub reconciler_poll_seconds: u64,
}

#[derive(Clone)]
pub struct PushGateway {
    pub url: Url,
    pub api_key: String,
}

#[derive(Clone)]
pub struct AppState {
    pub pending: Arc<PendingStore>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub push_gateway: Option<PushGateway>,
    pub retention_window_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub dispatcher_poll_seconds: u64,
    pub reconciler_poll_seconds: u64,
    pub grpc_port: u16,
    pub http_server_port: u16,
}

impl AppState {
    pub fn new(app_config: AppConfig) -> AppState {
        let push_gateway = app_config.push_gateway_cfg.map(|push_gateway_cfg| PushGateway {
            url: Url::parse(push_gateway_cfg.url.as_str()).expect("Failed to parse push_gateway url."),
            api_key: push_gateway_cfg.api_key,
        });

        AppState {
            pending: Arc::new(PendingStore::new()),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            push_gateway,
            retention_window_seconds: app_config.retention_window_seconds,
            sweep_interval_seconds: app_config.sweep_interval_seconds,
            dispatcher_poll_seconds: app_config.dispatcher_poll_seconds,
            reconciler_poll_seconds: app_config.reconciler_poll_seconds,
            grpc_port: app_config.grpc_port,
            http_server_port: app_config.http_server_port,
        }
    }
}
