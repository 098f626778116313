mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::carrier::TrackingUpdate;
use storefront_api::entities::{
    device_transaction, order_detail, order_status_history, DeliveryStatus, DeviceDirection,
    OrderStatus, ProductType,
};
use storefront_api::errors::ServiceError;
use storefront_api::services::fulfillment::SerialAssignment;
use storefront_api::services::orders::{DirectPurchaseInput, OrderService};
use uuid::Uuid;

/// Places a paid two-unit order and returns its id.
async fn place_order(app: &TestApp, orders: &OrderService) -> Uuid {
    let customer = app.seed_customer().await;
    let address = app.seed_address(customer.id).await;
    let product = app
        .seed_product("Router", ProductType::Single, dec!(80))
        .await;
    let color = app.seed_color(product.id, None, dec!(80), 10, 2).await;

    orders
        .direct_purchase(
            customer.id,
            DirectPurchaseInput {
                product_id: product.id,
                model_id: None,
                color_id: Some(color.id),
                quantity: 2,
                address_id: address.id,
                payment_status: "paid".to_string(),
                delivery_method: "courier".to_string(),
                discount_percent: None,
            },
        )
        .await
        .expect("place order")
        .order
        .id
}

async fn history_rows(app: &TestApp, order_id: Uuid) -> Vec<order_status_history::Model> {
    order_status_history::Entity::find()
        .filter(order_status_history::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn approve_is_idempotent() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    let order = fulfillment.approve(order_id, "admin").await.unwrap();
    assert_eq!(order.order_status, OrderStatus::Approved);

    // Second approval: accepted, no extra audit row.
    fulfillment.approve(order_id, "admin").await.unwrap();
    let history = history_rows(&app, order_id).await;
    assert_eq!(history.len(), 1);
    assert!(history[0].to_state.starts_with("APPROVED"));
}

#[tokio::test]
async fn approve_then_reject_keeps_full_history() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    fulfillment.approve(order_id, "admin").await.unwrap();
    let order = fulfillment
        .reject(order_id, "admin", Some("out of stock".to_string()))
        .await
        .unwrap();
    assert_eq!(order.order_status, OrderStatus::Rejected);

    let history = history_rows(&app, order_id).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].reason.as_deref(), Some("out of stock"));

    // A rejected order cannot come back.
    let err = fulfillment.approve(order_id, "admin").await.unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));
}

#[tokio::test]
async fn ship_requires_fulfillment_first() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    let err = fulfillment.ship(order_id, "admin").await.unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));

    fulfillment.fulfill(order_id, "admin").await.unwrap();
    let order = fulfillment.ship(order_id, "admin").await.unwrap();
    assert_eq!(order.delivery_status, DeliveryStatus::Shipped);
}

#[tokio::test]
async fn deliver_requires_shipped() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    fulfillment.fulfill(order_id, "admin").await.unwrap();
    let err = fulfillment.deliver(order_id, "admin").await.unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));

    fulfillment.ship(order_id, "admin").await.unwrap();
    let order = fulfillment.deliver(order_id, "admin").await.unwrap();
    assert_eq!(order.delivery_status, DeliveryStatus::Delivered);
}

#[tokio::test]
async fn fulfill_twice_appends_one_history_row() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    let order = fulfillment.fulfill(order_id, "admin").await.unwrap();
    assert!(order.fulfillment_status);
    assert_eq!(order.delivery_status, DeliveryStatus::Processing);

    fulfillment.fulfill(order_id, "admin").await.unwrap();
    assert_eq!(history_rows(&app, order_id).await.len(), 1);
}

#[tokio::test]
async fn pickup_stores_waybill_and_marks_fulfilled() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    let order = fulfillment.request_pickup(order_id, "admin").await.unwrap();
    assert_eq!(order.awb_number.as_deref(), Some("WB000001"));
    assert!(order.fulfillment_status);
    assert_eq!(order.delivery_status, DeliveryStatus::Processing);

    let shipments = app.carrier.pickups.lock().unwrap().clone();
    assert_eq!(shipments.len(), 1);
    assert_eq!(shipments[0].order_number, order.order_number);
    assert!(shipments[0].products_desc.contains("Router x2"));
    assert!((shipments[0].weight_kg - 1.0).abs() < f64::EPSILON);

    let history = history_rows(&app, order_id).await;
    assert_eq!(history.len(), 1);
    assert!(history[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("WB000001"));
}

#[tokio::test]
async fn failed_pickup_leaves_order_untouched() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    app.carrier.set_fail_pickup(true);
    let err = fulfillment.request_pickup(order_id, "admin").await.unwrap_err();
    assert!(matches!(err, ServiceError::CarrierError(_)));

    let view = orders.get_order(order_id).await.unwrap();
    assert!(view.order.awb_number.is_none());
    assert!(!view.order.fulfillment_status);
    assert!(view.history.is_empty());
}

#[tokio::test]
async fn serial_numbers_stamp_details_and_ledger() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    let view = orders.get_order(order_id).await.unwrap();
    let details = &view.items[0].details;
    assert_eq!(details.len(), 2);

    let assignments = vec![
        SerialAssignment {
            detail_id: details[0].id,
            sr_no: "SN-0001".to_string(),
        },
        SerialAssignment {
            detail_id: details[1].id,
            sr_no: "SN-0002".to_string(),
        },
    ];
    fulfillment
        .save_serial_numbers(order_id, assignments)
        .await
        .unwrap();

    let stamped = order_detail::Entity::find()
        .filter(order_detail::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap();
    let mut serials: Vec<_> = stamped.iter().filter_map(|d| d.sr_no.clone()).collect();
    serials.sort();
    assert_eq!(serials, vec!["SN-0001", "SN-0002"]);

    let ledger = device_transaction::Entity::find()
        .filter(device_transaction::Column::OrderId.eq(order_id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger
        .iter()
        .all(|t| t.direction == DeviceDirection::Out && t.price == Some(dec!(80))));
    assert!(ledger[0]
        .remarks
        .as_deref()
        .unwrap()
        .contains(&view.order.order_number));
}

#[tokio::test]
async fn serial_for_foreign_order_detail_is_refused() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_a = place_order(&app, &orders).await;
    let order_b = place_order(&app, &orders).await;

    let view_b = orders.get_order(order_b).await.unwrap();
    let foreign_detail = view_b.items[0].details[0].id;

    let err = fulfillment
        .save_serial_numbers(
            order_a,
            vec![SerialAssignment {
                detail_id: foreign_detail,
                sr_no: "SN-X".to_string(),
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // Nothing was written for either order.
    let ledger = device_transaction::Entity::find().all(&*app.db).await.unwrap();
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn tracking_requires_waybill_then_syncs_status() {
    let app = TestApp::new().await;
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();
    let order_id = place_order(&app, &orders).await;

    let err = fulfillment.track_order(order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::PreconditionFailed(_)));

    fulfillment.request_pickup(order_id, "admin").await.unwrap();
    app.carrier.set_scans(vec![TrackingUpdate {
        status: "In Transit".to_string(),
        location: Some("Mumbai Hub".to_string()),
        remark: None,
    }]);

    let result = fulfillment.track_order(order_id).await.unwrap();
    assert_eq!(result.delivery_status, DeliveryStatus::InTransit);

    let view = orders.get_order(order_id).await.unwrap();
    assert_eq!(view.order.delivery_status, DeliveryStatus::InTransit);
    let sync_rows: Vec<_> = view
        .history
        .iter()
        .filter(|h| h.actor == "carrier-sync")
        .collect();
    assert_eq!(sync_rows.len(), 1);

    // Unchanged status on the next sync writes no new history.
    fulfillment.track_order(order_id).await.unwrap();
    let view = orders.get_order(order_id).await.unwrap();
    assert_eq!(
        view.history.iter().filter(|h| h.actor == "carrier-sync").count(),
        1
    );
}
