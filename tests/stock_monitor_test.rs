mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use storefront_api::entities::{stock_notification, ProductType};
use uuid::Uuid;

#[tokio::test]
async fn sweep_buckets_by_severity() {
    let app = TestApp::new().await;
    let monitor = app.stock_monitor();

    let product = app
        .seed_product("Camera", ProductType::Single, dec!(300))
        .await;
    app.seed_color(product.id, None, dec!(300), 2, 5).await; // low
    app.seed_color(product.id, None, dec!(300), 0, 5).await; // out
    app.seed_color(product.id, None, dec!(300), 50, 5).await; // healthy

    let report = monitor.run_once().await.unwrap();
    assert_eq!(report.low_stock_notified, 1);
    assert_eq!(report.out_of_stock_notified, 1);
    assert_eq!(report.skipped_recent, 0);

    // One batch mail per severity.
    let mails = app.mailer.sent_mails();
    assert_eq!(mails.len(), 2);
    let subjects: Vec<_> = mails.iter().map(|m| m.subject.as_str()).collect();
    assert!(subjects.contains(&"Low stock alert"));
    assert!(subjects.contains(&"Out of stock alert"));
    assert!(mails.iter().all(|m| m.to == common::ALERT_EMAIL));

    // Each alerted color got a notification row.
    let recorded = stock_notification::Entity::find()
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(recorded.len(), 2);
}

#[tokio::test]
async fn recently_alerted_colors_are_skipped() {
    let app = TestApp::new().await;
    let monitor = app.stock_monitor();

    let product = app
        .seed_product("Drone", ProductType::Single, dec!(900))
        .await;
    app.seed_color(product.id, None, dec!(900), 1, 5).await;

    let first = monitor.run_once().await.unwrap();
    assert_eq!(first.low_stock_notified, 1);

    // Same sweep again inside the dedup window: nothing new.
    let second = monitor.run_once().await.unwrap();
    assert_eq!(second.low_stock_notified, 0);
    assert_eq!(second.skipped_recent, 1);
    assert_eq!(app.mailer.sent_mails().len(), 1);
}

#[tokio::test]
async fn expired_notifications_are_purged_and_realerted() {
    let app = TestApp::new().await;
    let monitor = app.stock_monitor();

    let product = app
        .seed_product("Printer", ProductType::Single, dec!(150))
        .await;
    let color = app.seed_color(product.id, None, dec!(150), 1, 5).await;

    // A notification older than the dedup window.
    stock_notification::ActiveModel {
        id: Set(Uuid::new_v4()),
        color_id: Set(color.id),
        product_name: Set("Printer".to_string()),
        notified_at: Set(Utc::now() - Duration::days(3)),
    }
    .insert(&*app.db)
    .await
    .unwrap();

    let report = monitor.run_once().await.unwrap();
    assert_eq!(report.low_stock_notified, 1);
    assert_eq!(report.skipped_recent, 0);

    // The stale row is gone; only the fresh one remains.
    let rows = stock_notification::Entity::find()
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].notified_at > Utc::now() - Duration::hours(1));
}

#[tokio::test]
async fn mail_failure_records_nothing() {
    let app = TestApp::new().await;
    let monitor = app.stock_monitor();

    let product = app
        .seed_product("Monitor", ProductType::Single, dec!(200))
        .await;
    app.seed_color(product.id, None, dec!(200), 1, 5).await;

    app.mailer.set_failing(true);
    let report = monitor.run_once().await.unwrap();
    assert_eq!(report.low_stock_notified, 0);
    assert!(stock_notification::Entity::find()
        .all(&*app.db)
        .await
        .unwrap()
        .is_empty());

    // The next sweep retries once mail works again.
    app.mailer.set_failing(false);
    let report = monitor.run_once().await.unwrap();
    assert_eq!(report.low_stock_notified, 1);
}

#[tokio::test]
async fn healthy_stock_sends_nothing() {
    let app = TestApp::new().await;
    let monitor = app.stock_monitor();

    let product = app
        .seed_product("Scanner", ProductType::Single, dec!(120))
        .await;
    app.seed_color(product.id, None, dec!(120), 20, 5).await;

    let report = monitor.run_once().await.unwrap();
    assert_eq!(report.low_stock_notified, 0);
    assert_eq!(report.out_of_stock_notified, 0);
    assert!(app.mailer.sent_mails().is_empty());
}
