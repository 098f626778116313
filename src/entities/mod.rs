pub mod address;
pub mod cart;
pub mod cart_item;
pub mod customer;
pub mod device_transaction;
pub mod offline_customer;
pub mod order;
pub mod order_detail;
pub mod order_item;
pub mod order_sequence;
pub mod order_status_history;
pub mod product;
pub mod product_color;
pub mod product_model;
pub mod stock_notification;

// Re-export entities
pub use address::{Entity as Address, Model as AddressModel};
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use device_transaction::{
    Direction as DeviceDirection, Entity as DeviceTransaction, Model as DeviceTransactionModel,
};
pub use offline_customer::{Entity as OfflineCustomer, Model as OfflineCustomerModel};
pub use order::{
    Channel, DeliveryStatus, Entity as Order, Model as OrderModel, OrderCustomer, OrderStatus,
};
pub use order_detail::{Entity as OrderDetail, Model as OrderDetailModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_sequence::{Entity as OrderSequence, Model as OrderSequenceModel, SEQUENCE_ROW_ID};
pub use order_status_history::{Entity as OrderStatusHistory, Model as OrderStatusHistoryModel};
pub use product::{Entity as Product, Model as ProductModel, ProductType};
pub use product_color::{Entity as ProductColor, Model as ProductColorModel};
pub use product_model::{Entity as ProductModelEntity, Model as ProductModelModel};
pub use stock_notification::{Entity as StockNotification, Model as StockNotificationModel};
