#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use uuid::Uuid;

use storefront_api::carrier::{
    CarrierGateway, PickupReceipt, PickupShipment, Serviceability, TrackingUpdate,
};
use storefront_api::db::{self, DbConfig, DbPool};
use storefront_api::entities::{address, customer, offline_customer, product, product_color};
use storefront_api::entities::ProductType;
use storefront_api::errors::ServiceError;
use storefront_api::events::{self, EventSender};
use storefront_api::notifications::{MailError, Mailer, OutboundMail};
use storefront_api::handlers::AppServices;
use storefront_api::services::{
    CartService, DeliveryChargeCalculator, DeviceService, FulfillmentService, OrderService,
    StockMonitor,
};
use storefront_api::{build_router, config::AppConfig, AppState};

pub const ALERT_EMAIL: &str = "ops@example.test";

/// Mailer that records every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutboundMail>>,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        if *self.fail.lock().unwrap() {
            return Err(MailError::Transport("stubbed failure".to_string()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

impl RecordingMailer {
    pub fn sent_mails(&self) -> Vec<OutboundMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

/// Carrier stub with scripted responses. No network involved.
pub struct StubCarrier {
    pub serviceable: Mutex<bool>,
    pub fail_pickup: Mutex<bool>,
    pub pickups: Mutex<Vec<PickupShipment>>,
    pub scans: Mutex<Vec<TrackingUpdate>>,
    waybill_seq: Mutex<u64>,
}

impl Default for StubCarrier {
    fn default() -> Self {
        Self {
            serviceable: Mutex::new(true),
            fail_pickup: Mutex::new(false),
            pickups: Mutex::new(Vec::new()),
            scans: Mutex::new(Vec::new()),
            waybill_seq: Mutex::new(0),
        }
    }
}

impl StubCarrier {
    pub fn set_scans(&self, scans: Vec<TrackingUpdate>) {
        *self.scans.lock().unwrap() = scans;
    }

    pub fn set_fail_pickup(&self, fail: bool) {
        *self.fail_pickup.lock().unwrap() = fail;
    }
}

#[async_trait]
impl CarrierGateway for StubCarrier {
    async fn check_pincode(&self, _pincode: &str) -> Result<Serviceability, ServiceError> {
        if *self.serviceable.lock().unwrap() {
            Ok(Serviceability {
                serviceable: true,
                prepaid: true,
                cod: true,
                city: Some("Mumbai".to_string()),
                state_code: Some("MH".to_string()),
            })
        } else {
            Ok(Serviceability::unserviceable())
        }
    }

    async fn create_pickup(&self, shipment: PickupShipment) -> Result<PickupReceipt, ServiceError> {
        if *self.fail_pickup.lock().unwrap() {
            return Err(ServiceError::CarrierError(
                "pickup rejected by stub".to_string(),
            ));
        }
        self.pickups.lock().unwrap().push(shipment);
        let mut seq = self.waybill_seq.lock().unwrap();
        *seq += 1;
        Ok(PickupReceipt {
            waybill: format!("WB{:06}", *seq),
        })
    }

    async fn track(&self, _waybill: &str) -> Result<Vec<TrackingUpdate>, ServiceError> {
        Ok(self.scans.lock().unwrap().clone())
    }
}

/// Test fixture: a migrated SQLite database plus stubbed side-effect
/// boundaries, from which each test constructs the services it needs.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    pub mailer: Arc<RecordingMailer>,
    pub carrier: Arc<StubCarrier>,
    _tmp: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = tmp.path().join("storefront_test.db");
        let cfg = DbConfig {
            url: format!("sqlite://{}?mode=rwc", db_path.display()),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::event_channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        Self {
            db: Arc::new(pool),
            event_sender: Arc::new(event_sender),
            mailer: Arc::new(RecordingMailer::default()),
            carrier: Arc::new(StubCarrier::default()),
            _tmp: tmp,
            _event_task: event_task,
        }
    }

    /// Full HTTP router over this fixture's database and stubs.
    pub fn router(&self) -> axum::Router {
        let services = AppServices {
            cart: Arc::new(self.cart_service()),
            orders: Arc::new(self.order_service()),
            fulfillment: Arc::new(self.fulfillment_service()),
            devices: Arc::new(self.device_service()),
            carrier: self.carrier.clone(),
        };
        let state = Arc::new(AppState {
            db: self.db.clone(),
            config: AppConfig::default(),
            event_sender: (*self.event_sender).clone(),
            services,
        });
        build_router(state)
    }

    pub fn cart_service(&self) -> CartService {
        CartService::new(self.db.clone(), self.event_sender.clone())
    }

    /// Order service with free delivery above 1000 and a flat rate of 20.
    pub fn order_service(&self) -> OrderService {
        OrderService::new(
            self.db.clone(),
            self.event_sender.clone(),
            self.mailer.clone(),
            DeliveryChargeCalculator::new(dec!(1000), dec!(20)),
            Some(ALERT_EMAIL.to_string()),
        )
    }

    pub fn fulfillment_service(&self) -> FulfillmentService {
        FulfillmentService::new(
            self.db.clone(),
            self.event_sender.clone(),
            self.mailer.clone(),
            self.carrier.clone(),
        )
    }

    pub fn device_service(&self) -> DeviceService {
        DeviceService::new(self.db.clone(), self.event_sender.clone())
    }

    pub fn stock_monitor(&self) -> StockMonitor {
        StockMonitor::new(
            self.db.clone(),
            self.event_sender.clone(),
            self.mailer.clone(),
            Some(ALERT_EMAIL.to_string()),
        )
    }

    pub async fn seed_product(
        &self,
        name: &str,
        product_type: ProductType,
        base_price: Decimal,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sku: Set(format!("SKU-{}", Uuid::new_v4().simple())),
            product_type: Set(product_type),
            description: Set(None),
            category: Set(Some("Electronics".to_string())),
            hsn_code: Set(None),
            base_price: Set(base_price),
            weight_kg: Set(0.5),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed product")
    }

    pub async fn seed_color(
        &self,
        product_id: Uuid,
        model_id: Option<Uuid>,
        price: Decimal,
        stock_quantity: i32,
        reorder_threshold: i32,
    ) -> product_color::Model {
        product_color::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            model_id: Set(model_id),
            name: Set("Black".to_string()),
            price: Set(price),
            original_price: Set(None),
            stock_quantity: Set(stock_quantity),
            reorder_threshold: Set(reorder_threshold),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed color")
    }

    pub async fn seed_customer(&self) -> customer::Model {
        let id = Uuid::new_v4();
        customer::ActiveModel {
            id: Set(id),
            name: Set("Asha Rao".to_string()),
            email: Set(format!("asha+{}@example.test", id.simple())),
            phone: Set(Some("9876543210".to_string())),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed customer")
    }

    pub async fn seed_address(&self, customer_id: Uuid) -> address::Model {
        self.seed_address_for(Some(customer_id), None).await
    }

    pub async fn seed_address_for(
        &self,
        customer_id: Option<Uuid>,
        offline_customer_id: Option<Uuid>,
    ) -> address::Model {
        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            offline_customer_id: Set(offline_customer_id),
            name: Set("Asha Rao".to_string()),
            mobile: Set("9876543210".to_string()),
            pincode: Set("400001".to_string()),
            locality: Set("Fort".to_string()),
            address_line: Set("12 Marine Drive".to_string()),
            city: Set("Mumbai".to_string()),
            state: Set("Maharashtra".to_string()),
            landmark: Set(None),
            alternate_phone: Set(None),
            address_type: Set("home".to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed address")
    }

    pub async fn seed_offline_customer(&self) -> offline_customer::Model {
        offline_customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Walk-in Customer".to_string()),
            email: Set(None),
            phone: Set("9123456780".to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed offline customer")
    }
}
