use crate::carrier::CarrierGateway;
use crate::services::{CartService, DeviceService, FulfillmentService, OrderService};
use std::sync::Arc;

pub mod carts;
pub mod common;
pub mod devices;
pub mod health;
pub mod orders;
pub mod serviceability;

/// Service container shared across handlers.
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub fulfillment: Arc<FulfillmentService>,
    pub devices: Arc<DeviceService>,
    pub carrier: Arc<dyn CarrierGateway>,
}
