pub mod cart;
pub mod delivery;
pub mod devices;
pub mod fulfillment;
pub mod orders;
pub mod pricing;
pub mod stock_monitor;

pub use cart::CartService;
pub use delivery::DeliveryChargeCalculator;
pub use devices::DeviceService;
pub use fulfillment::FulfillmentService;
pub use orders::OrderService;
pub use pricing::{resolve_price, PriceQuote};
pub use stock_monitor::StockMonitor;
