use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_customer_tables::Migration),
            Box::new(m20240101_000003_create_cart_tables::Migration),
            Box::new(m20240101_000004_create_order_tables::Migration),
            Box::new(m20240101_000005_create_ledger_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::ProductType).string().not_null())
                        .col(ColumnDef::new(Products::Description).string().null())
                        .col(ColumnDef::new(Products::Category).string().null())
                        .col(ColumnDef::new(Products::HsnCode).string().null())
                        .col(
                            ColumnDef::new(Products::BasePrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::WeightKg)
                                .double()
                                .not_null()
                                .default(0.5),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductModels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductModels::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductModels::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductModels::Name).string().not_null())
                        .col(ColumnDef::new(ProductModels::Description).string().null())
                        .col(
                            ColumnDef::new(ProductModels::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_models_product")
                                .from(ProductModels::Table, ProductModels::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductColors::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductColors::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductColors::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductColors::ModelId).uuid().null())
                        .col(ColumnDef::new(ProductColors::Name).string().not_null())
                        .col(
                            ColumnDef::new(ProductColors::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductColors::OriginalPrice)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductColors::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductColors::ReorderThreshold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductColors::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductColors::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_colors_product")
                                .from(ProductColors::Table, ProductColors::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_colors_model")
                                .from(ProductColors::Table, ProductColors::ModelId)
                                .to(ProductModels::Table, ProductModels::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_colors_product_id")
                        .table(ProductColors::Table)
                        .col(ProductColors::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_colors_stock")
                        .table(ProductColors::Table)
                        .col(ProductColors::StockQuantity)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductColors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductModels::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Name,
        Sku,
        ProductType,
        Description,
        Category,
        HsnCode,
        BasePrice,
        WeightKg,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum ProductModels {
        Table,
        Id,
        ProductId,
        Name,
        Description,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum ProductColors {
        Table,
        Id,
        ProductId,
        ModelId,
        Name,
        Price,
        OriginalPrice,
        StockQuantity,
        ReorderThreshold,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_customer_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_customer_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(
                            ColumnDef::new(Customers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OfflineCustomers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OfflineCustomers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OfflineCustomers::Name).string().not_null())
                        .col(ColumnDef::new(OfflineCustomers::Email).string().null())
                        .col(ColumnDef::new(OfflineCustomers::Phone).string().not_null())
                        .col(
                            ColumnDef::new(OfflineCustomers::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Addresses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Addresses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Addresses::CustomerId).uuid().null())
                        .col(ColumnDef::new(Addresses::OfflineCustomerId).uuid().null())
                        .col(ColumnDef::new(Addresses::Name).string().not_null())
                        .col(ColumnDef::new(Addresses::Mobile).string().not_null())
                        .col(ColumnDef::new(Addresses::Pincode).string().not_null())
                        .col(ColumnDef::new(Addresses::Locality).string().not_null())
                        .col(ColumnDef::new(Addresses::AddressLine).string().not_null())
                        .col(ColumnDef::new(Addresses::City).string().not_null())
                        .col(ColumnDef::new(Addresses::State).string().not_null())
                        .col(ColumnDef::new(Addresses::Landmark).string().null())
                        .col(ColumnDef::new(Addresses::AlternatePhone).string().null())
                        .col(ColumnDef::new(Addresses::AddressType).string().not_null())
                        .col(ColumnDef::new(Addresses::CreatedAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_addresses_customer")
                                .from(Addresses::Table, Addresses::CustomerId)
                                .to(Customers::Table, Customers::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_addresses_offline_customer")
                                .from(Addresses::Table, Addresses::OfflineCustomerId)
                                .to(OfflineCustomers::Table, OfflineCustomers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_addresses_customer_id")
                        .table(Addresses::Table)
                        .col(Addresses::CustomerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Addresses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OfflineCustomers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Customers {
        Table,
        Id,
        Name,
        Email,
        Phone,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OfflineCustomers {
        Table,
        Id,
        Name,
        Email,
        Phone,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Addresses {
        Table,
        Id,
        CustomerId,
        OfflineCustomerId,
        Name,
        Mobile,
        Pincode,
        Locality,
        AddressLine,
        City,
        State,
        Landmark,
        AlternatePhone,
        AddressType,
        CreatedAt,
    }
}

mod m20240101_000003_create_cart_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Carts::CustomerId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Carts::TotalPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Carts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Carts::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ModelId).uuid().null())
                        .col(ColumnDef::new(CartItems::ColorId).uuid().null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CartItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::TotalItemPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::AddedAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_cart")
                                .from(CartItems::Table, CartItems::CartId)
                                .to(Carts::Table, Carts::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_cart_id")
                        .table(CartItems::Table)
                        .col(CartItems::CartId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Carts {
        Table,
        Id,
        CustomerId,
        TotalPrice,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum CartItems {
        Table,
        Id,
        CartId,
        ProductId,
        ModelId,
        ColorId,
        Quantity,
        UnitPrice,
        TotalItemPrice,
        AddedAt,
    }
}

mod m20240101_000004_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderIndex)
                                .big_integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().null())
                        .col(ColumnDef::new(Orders::OfflineCustomerId).uuid().null())
                        .col(ColumnDef::new(Orders::AddressId).uuid().not_null())
                        .col(ColumnDef::new(Orders::TotalItems).integer().not_null())
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::GstAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DiscountPercent)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DiscountAmount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryCharge)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Channel).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(ColumnDef::new(Orders::DeliveryMethod).string().not_null())
                        .col(ColumnDef::new(Orders::OrderStatus).string().not_null())
                        .col(
                            ColumnDef::new(Orders::FulfillmentStatus)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::DeliveryStatus).string().not_null())
                        .col(ColumnDef::new(Orders::AwbNumber).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_status")
                        .table(Orders::Table)
                        .col(Orders::OrderStatus)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ModelId).uuid().null())
                        .col(ColumnDef::new(OrderItems::ColorId).uuid().null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::TotalPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::DiscountPercent)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderDetails::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderDetails::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderDetails::OrderItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderDetails::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderDetails::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderDetails::SrNo).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_details_order_item")
                                .from(OrderDetails::Table, OrderDetails::OrderItemId)
                                .to(OrderItems::Table, OrderItems::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_details_order")
                                .from(OrderDetails::Table, OrderDetails::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_details_order_id")
                        .table(OrderDetails::Table)
                        .col(OrderDetails::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::FromState)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::ToState)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistory::Actor).string().not_null())
                        .col(ColumnDef::new(OrderStatusHistory::Reason).string().null())
                        .col(
                            ColumnDef::new(OrderStatusHistory::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_status_history_order")
                                .from(OrderStatusHistory::Table, OrderStatusHistory::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderSequence::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderSequence::Id)
                                .integer()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderSequence::LastIndex)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            // Seed the single counter row so the placement transaction can
            // always claim by UPDATE.
            let insert = Query::insert()
                .into_table(OrderSequence::Table)
                .columns([OrderSequence::Id, OrderSequence::LastIndex])
                .values_panic([1.into(), 0i64.into()])
                .to_owned();
            manager.exec_stmt(insert).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderSequence::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderStatusHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderDetails::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderIndex,
        OrderNumber,
        CustomerId,
        OfflineCustomerId,
        AddressId,
        TotalItems,
        Subtotal,
        GstAmount,
        DiscountPercent,
        DiscountAmount,
        DeliveryCharge,
        TotalAmount,
        Channel,
        PaymentStatus,
        DeliveryMethod,
        OrderStatus,
        FulfillmentStatus,
        DeliveryStatus,
        AwbNumber,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ModelId,
        ColorId,
        Quantity,
        UnitPrice,
        TotalPrice,
        DiscountPercent,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderDetails {
        Table,
        Id,
        OrderItemId,
        OrderId,
        ProductId,
        SrNo,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderStatusHistory {
        Table,
        Id,
        OrderId,
        FromState,
        ToState,
        Actor,
        Reason,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderSequence {
        Table,
        Id,
        LastIndex,
    }
}

mod m20240101_000005_create_ledger_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeviceTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeviceTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeviceTransactions::DeviceSrno)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeviceTransactions::DeviceName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeviceTransactions::Sku).string().not_null())
                        .col(ColumnDef::new(DeviceTransactions::OrderId).uuid().null())
                        .col(
                            ColumnDef::new(DeviceTransactions::Direction)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeviceTransactions::Price)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(DeviceTransactions::Remarks).string().null())
                        .col(
                            ColumnDef::new(DeviceTransactions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_device_transactions_srno")
                        .table(DeviceTransactions::Table)
                        .col(DeviceTransactions::DeviceSrno)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockNotifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockNotifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockNotifications::ColorId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockNotifications::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockNotifications::NotifiedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_notifications_color_id")
                        .table(StockNotifications::Table)
                        .col(StockNotifications::ColorId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockNotifications::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeviceTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum DeviceTransactions {
        Table,
        Id,
        DeviceSrno,
        DeviceName,
        Sku,
        OrderId,
        Direction,
        Price,
        Remarks,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockNotifications {
        Table,
        Id,
        ColorId,
        ProductName,
        NotifiedAt,
    }
}

// Standalone migration runner used by deployment scripts.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
