mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::entities::{DeviceDirection, ProductType};
use storefront_api::errors::ServiceError;
use storefront_api::services::devices::{DeviceStatus, RecordInboundInput};
use storefront_api::services::fulfillment::SerialAssignment;
use storefront_api::services::orders::DirectPurchaseInput;

#[tokio::test]
async fn inbound_device_is_in_stock() {
    let app = TestApp::new().await;
    let devices = app.device_service();

    devices
        .record_inbound(RecordInboundInput {
            device_srno: "SN-100".to_string(),
            device_name: "Refurb Phone".to_string(),
            sku: "RPH-1".to_string(),
            price: Some(dec!(350)),
            remarks: Some("trade-in".to_string()),
        })
        .await
        .unwrap();

    let lookup = devices.lookup("SN-100").await.unwrap();
    assert_eq!(lookup.device_srno, "SN-100");
    match lookup.status {
        DeviceStatus::InStock { in_price, .. } => assert_eq!(in_price, Some(dec!(350))),
        other => panic!("unexpected status: {:?}", other),
    }

    // SKU also matches.
    let by_sku = devices.lookup("RPH-1").await.unwrap();
    assert_eq!(by_sku.device_srno, "SN-100");
}

#[tokio::test]
async fn sale_through_an_order_computes_margin() {
    let app = TestApp::new().await;
    let devices = app.device_service();
    let orders = app.order_service();
    let fulfillment = app.fulfillment_service();

    devices
        .record_inbound(RecordInboundInput {
            device_srno: "SN-200".to_string(),
            device_name: "Refurb Tablet".to_string(),
            sku: "RTB-1".to_string(),
            price: Some(dec!(400)),
            remarks: None,
        })
        .await
        .unwrap();

    // Sell the unit through a normal order.
    let customer = app.seed_customer().await;
    let address = app.seed_address(customer.id).await;
    let product = app
        .seed_product("Refurb Tablet", ProductType::Single, dec!(550))
        .await;
    let color = app.seed_color(product.id, None, dec!(550), 5, 1).await;

    let view = orders
        .direct_purchase(
            customer.id,
            DirectPurchaseInput {
                product_id: product.id,
                model_id: None,
                color_id: Some(color.id),
                quantity: 1,
                address_id: address.id,
                payment_status: "paid".to_string(),
                delivery_method: "courier".to_string(),
                discount_percent: None,
            },
        )
        .await
        .unwrap();

    fulfillment
        .save_serial_numbers(
            view.order.id,
            vec![SerialAssignment {
                detail_id: view.items[0].details[0].id,
                sr_no: "SN-200".to_string(),
            }],
        )
        .await
        .unwrap();

    let lookup = devices.lookup("SN-200").await.unwrap();
    match lookup.status {
        DeviceStatus::Sold {
            in_price,
            out_price,
            profit,
            ..
        } => {
            assert_eq!(in_price, Some(dec!(400)));
            assert_eq!(out_price, Some(dec!(550)));
            assert_eq!(profit, Some(dec!(150)));
        }
        other => panic!("unexpected status: {:?}", other),
    }
}

#[tokio::test]
async fn unknown_serial_is_not_found() {
    let app = TestApp::new().await;
    let devices = app.device_service();

    let err = devices.lookup("NOPE").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = devices.lookup("   ").await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn transactions_list_newest_first_and_filter_by_serial() {
    let app = TestApp::new().await;
    let devices = app.device_service();

    for srno in ["SN-A", "SN-B"] {
        devices
            .record_inbound(RecordInboundInput {
                device_srno: srno.to_string(),
                device_name: "Widget".to_string(),
                sku: "WDG-1".to_string(),
                price: None,
                remarks: None,
            })
            .await
            .unwrap();
    }

    let all = devices.list_transactions(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].created_at >= all[1].created_at);
    assert!(all.iter().all(|t| t.direction == DeviceDirection::In));

    let only_a = devices.list_transactions(Some("SN-A")).await.unwrap();
    assert_eq!(only_a.len(), 1);
    assert_eq!(only_a[0].device_srno, "SN-A");
}

#[tokio::test]
async fn blank_serial_is_rejected() {
    let app = TestApp::new().await;
    let devices = app.device_service();

    let err = devices
        .record_inbound(RecordInboundInput {
            device_srno: String::new(),
            device_name: "Widget".to_string(),
            sku: "WDG-1".to_string(),
            price: None,
            remarks: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
