mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::entities::ProductType;
use storefront_api::errors::ServiceError;
use storefront_api::services::cart::AddItemInput;

#[tokio::test]
async fn first_add_creates_cart_lazily() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let customer = app.seed_customer().await;

    // No cart yet.
    let err = carts.get_cart(customer.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let product = app
        .seed_product("Earbuds", ProductType::Single, dec!(50))
        .await;
    let color = app.seed_color(product.id, None, dec!(50), 10, 2).await;

    let view = carts
        .add_item(
            customer.id,
            AddItemInput {
                product_id: product.id,
                model_id: None,
                color_id: Some(color.id),
                quantity: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.cart.total_price, dec!(50));
}

#[tokio::test]
async fn same_selection_merges_into_one_line() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let customer = app.seed_customer().await;

    let product = app
        .seed_product("Earbuds", ProductType::Single, dec!(50))
        .await;
    let color = app.seed_color(product.id, None, dec!(50), 10, 2).await;

    let input = AddItemInput {
        product_id: product.id,
        model_id: None,
        color_id: Some(color.id),
        quantity: 2,
    };
    carts.add_item(customer.id, input.clone()).await.unwrap();
    let view = carts.add_item(customer.id, input).await.unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 4);
    assert_eq!(view.items[0].total_item_price, dec!(200));
    assert_eq!(view.cart.total_price, dec!(200));
}

#[tokio::test]
async fn merged_quantity_is_stock_checked() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let customer = app.seed_customer().await;

    let product = app
        .seed_product("Earbuds", ProductType::Single, dec!(50))
        .await;
    let color = app.seed_color(product.id, None, dec!(50), 3, 1).await;

    let input = AddItemInput {
        product_id: product.id,
        model_id: None,
        color_id: Some(color.id),
        quantity: 2,
    };
    carts.add_item(customer.id, input.clone()).await.unwrap();

    // 2 already in the cart; adding 2 more exceeds the 3 in stock.
    let err = carts.add_item(customer.id, input).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    let view = carts.get_cart(customer.id).await.unwrap();
    assert_eq!(view.items[0].quantity, 2);
}

#[tokio::test]
async fn partial_remove_decrements_line() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let customer = app.seed_customer().await;

    let product = app
        .seed_product("Power Bank", ProductType::Single, dec!(40))
        .await;
    let color = app.seed_color(product.id, None, dec!(40), 10, 2).await;

    let view = carts
        .add_item(
            customer.id,
            AddItemInput {
                product_id: product.id,
                model_id: None,
                color_id: Some(color.id),
                quantity: 5,
            },
        )
        .await
        .unwrap();
    let item_id = view.items[0].id;

    let view = carts
        .remove_item(customer.id, item_id, Some(2))
        .await
        .unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 3);
    assert_eq!(view.cart.total_price, dec!(120));

    // Removing at least the remaining quantity deletes the line.
    let view = carts
        .remove_item(customer.id, item_id, Some(3))
        .await
        .unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.cart.total_price, dec!(0));
}

#[tokio::test]
async fn remove_without_quantity_drops_whole_line() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let customer = app.seed_customer().await;

    let product = app
        .seed_product("Stand", ProductType::Single, dec!(15))
        .await;
    let color = app.seed_color(product.id, None, dec!(15), 10, 2).await;

    let view = carts
        .add_item(
            customer.id,
            AddItemInput {
                product_id: product.id,
                model_id: None,
                color_id: Some(color.id),
                quantity: 4,
            },
        )
        .await
        .unwrap();

    let view = carts
        .remove_item(customer.id, view.items[0].id, None)
        .await
        .unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn update_quantity_reprices_the_line() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let customer = app.seed_customer().await;

    let product = app
        .seed_product("Case", ProductType::Single, dec!(20))
        .await;
    let color = app.seed_color(product.id, None, dec!(20), 10, 2).await;

    let view = carts
        .add_item(
            customer.id,
            AddItemInput {
                product_id: product.id,
                model_id: None,
                color_id: Some(color.id),
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let view = carts
        .update_item_quantity(customer.id, view.items[0].id, 6)
        .await
        .unwrap();
    assert_eq!(view.items[0].quantity, 6);
    assert_eq!(view.items[0].total_item_price, dec!(120));
    assert_eq!(view.cart.total_price, dec!(120));

    let err = carts
        .update_item_quantity(customer.id, view.items[0].id, 11)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
}

#[tokio::test]
async fn clear_empties_cart_but_keeps_it() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let customer = app.seed_customer().await;

    let product = app
        .seed_product("Lamp", ProductType::Single, dec!(35))
        .await;
    let color = app.seed_color(product.id, None, dec!(35), 10, 2).await;

    carts
        .add_item(
            customer.id,
            AddItemInput {
                product_id: product.id,
                model_id: None,
                color_id: Some(color.id),
                quantity: 2,
            },
        )
        .await
        .unwrap();

    let view = carts.clear(customer.id).await.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.cart.total_price, dec!(0));

    // The cart row itself survives.
    assert!(carts.get_cart(customer.id).await.is_ok());
}

#[tokio::test]
async fn another_customers_line_is_unreachable() {
    let app = TestApp::new().await;
    let carts = app.cart_service();
    let alice = app.seed_customer().await;
    let bob = app.seed_customer().await;

    let product = app
        .seed_product("Tripod", ProductType::Single, dec!(70))
        .await;
    let color = app.seed_color(product.id, None, dec!(70), 10, 2).await;

    let input = AddItemInput {
        product_id: product.id,
        model_id: None,
        color_id: Some(color.id),
        quantity: 1,
    };
    let alice_view = carts.add_item(alice.id, input.clone()).await.unwrap();
    carts.add_item(bob.id, input).await.unwrap();

    let err = carts
        .remove_item(bob.id, alice_view.items[0].id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
