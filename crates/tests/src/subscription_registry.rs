/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use notification_delivery::{
    common::types::{Endpoint, UserId},
    storage::{subscriptions::SubscriptionRegistry, types::SubscriptionKeys},
};

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

fn endpoint(url: &str) -> Endpoint {
    Endpoint(url.to_string())
}

fn keys(p256dh: &str) -> SubscriptionKeys {
    SubscriptionKeys {
        p256dh: p256dh.to_string(),
        auth: format!("auth-{}", p256dh),
    }
}

#[tokio::test]
async fn reregistration_updates_in_place() {
    let registry = SubscriptionRegistry::new();

    let id = registry.register(
        user("u"),
        endpoint("https://push.example/ep-1"),
        keys("key-v1"),
        "Mozilla/5.0".to_string(),
    );

    // The browser rotated the subscription object for the same endpoint.
    let rotated = registry.register(
        user("u"),
        endpoint("https://push.example/ep-1"),
        keys("key-v2"),
        "Mozilla/5.0 (updated)".to_string(),
    );
    assert_eq!(rotated, id);

    let active = registry.list_active(&user("u"));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].keys.p256dh, "key-v2");
    assert_eq!(active[0].user_agent, "Mozilla/5.0 (updated)");
    assert!(active[0].updated_at >= active[0].created_at);
}

#[tokio::test]
async fn multi_device_subscriptions_coexist() {
    let registry = SubscriptionRegistry::new();
    registry.register(
        user("u"),
        endpoint("https://push.example/phone"),
        keys("phone"),
        "Android".to_string(),
    );
    registry.register(
        user("u"),
        endpoint("https://push.example/laptop"),
        keys("laptop"),
        "Firefox".to_string(),
    );
    registry.register(
        user("other"),
        endpoint("https://push.example/phone"),
        keys("other-phone"),
        "Android".to_string(),
    );

    assert_eq!(registry.list_active(&user("u")).len(), 2);
    assert_eq!(registry.list_active(&user("other")).len(), 1);
}

#[tokio::test]
async fn deactivate_keeps_the_row_until_purge() {
    let registry = SubscriptionRegistry::new();
    registry.register(
        user("u"),
        endpoint("https://push.example/ep-1"),
        keys("k"),
        "UA".to_string(),
    );

    assert!(registry.deactivate(&user("u"), &endpoint("https://push.example/ep-1")));
    assert!(registry.list_active(&user("u")).is_empty());

    // The row still exists, just inactive.
    assert!(registry.deactivate(&user("u"), &endpoint("https://push.example/ep-1")));

    assert_eq!(registry.purge_inactive(&user("u")), 1);
    assert!(!registry.deactivate(&user("u"), &endpoint("https://push.example/ep-1")));
}

#[tokio::test]
async fn reactivation_through_reregistration() {
    let registry = SubscriptionRegistry::new();
    let id = registry.register(
        user("u"),
        endpoint("https://push.example/ep-1"),
        keys("k"),
        "UA".to_string(),
    );
    registry.deactivate(&user("u"), &endpoint("https://push.example/ep-1"));
    assert!(registry.list_active(&user("u")).is_empty());

    let reregistered = registry.register(
        user("u"),
        endpoint("https://push.example/ep-1"),
        keys("k2"),
        "UA".to_string(),
    );
    assert_eq!(reregistered, id);
    assert_eq!(registry.list_active(&user("u")).len(), 1);
}

#[tokio::test]
async fn unknown_user_is_harmless() {
    let registry = SubscriptionRegistry::new();
    assert!(!registry.deactivate(&user("ghost"), &endpoint("https://push.example/ep")));
    assert_eq!(registry.purge_inactive(&user("ghost")), 0);
    assert!(registry.list_active(&user("ghost")).is_empty());
}
