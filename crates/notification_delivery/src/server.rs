/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    action::{delivery::DeliveryService, healthcheck::Healthcheck},
    environment::{AppConfig, AppState},
    health_server::HealthServer,
    middleware::api_tracking::ApiTrackingMiddlewareLayer,
    notification_delivery_server::NotificationDeliveryServer,
    sweeper::run_retention_sweeper,
    tools::{logger::setup_tracing, prometheus::prometheus_metrics},
};
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{anyhow, Result};
use std::{
    env::var,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::oneshot,
};
use tonic::transport::Server;
use tracing::*;

pub async fn run_server() -> Result<()> {
    let dhall_config_path = var("DHALL_CONFIG")
        .unwrap_or_else(|_| "./dhall-configs/dev/notification_delivery.dhall".to_string());
    let app_config = serde_dhall::from_file(dhall_config_path).parse::<AppConfig>()?;

    let _guard = setup_tracing(app_config.logger_cfg.clone());

    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic Occured : {:?}", panic_info);
    }));

    let app_state = AppState::new(app_config);

    let (signal_tx, signal_rx) = oneshot::channel();
    tokio::spawn(async move {
        #[allow(clippy::expect_used)]
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        #[allow(clippy::expect_used)]
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install signal handler");
        tokio::select! {
            _ = sigterm.recv() => {
                error!("SIGTERM received: shutting down");
                let _ = signal_tx.send(());
            },
            _ = sigint.recv() => {
                error!("SIGINT received: shutting down");
                let _ = signal_tx.send(());
            }
        }
    });

    let retention_sweeper = run_retention_sweeper(
        app_state.pending.clone(),
        app_state.retention_window_seconds,
        app_state.sweep_interval_seconds,
    );

    let prometheus = prometheus_metrics();
    let http_server = HttpServer::new(move || {
        App::new().wrap(prometheus.clone()).route(
            "/health",
            web::get()
                .to(|| Box::pin(async { HttpResponse::Ok().body("Notification Delivery Is Up!") })),
        )
    })
    .bind((Ipv4Addr::UNSPECIFIED, app_state.http_server_port))?
    .shutdown_timeout(60)
    .run();

    let grpc_port = app_state.grpc_port;
    let middleware = tower::ServiceBuilder::new()
        .layer(ApiTrackingMiddlewareLayer)
        .into_inner();
    let delivery_service = DeliveryService::new(app_state);
    let grpc_server = Server::builder()
        .layer(middleware)
        .add_service(NotificationDeliveryServer::new(delivery_service))
        .add_service(HealthServer::new(Healthcheck))
        .serve(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::UNSPECIFIED,
            grpc_port,
        )));

    tokio::select! {
        res = http_server => {
            error!("[HTTP_SERVER_ENDED] : {:?}", res);
            Err(anyhow!("[HTTP_SERVER] : {:?}", res))
        }
        res = grpc_server => {
            error!("[GRPC_SERVER_ENDED] : {:?}", res);
            Err(anyhow!("[GRPC_SERVER] : {:?}", res))
        }
        _ = retention_sweeper => {
            error!("[RETENTION_SWEEPER_ENDED]");
            Err(anyhow!("[RETENTION_SWEEPER] ended unexpectedly"))
        }
        _ = signal_rx => {
            info!("[Graceful Shutting Down]");
            Ok(())
        }
    }
}
