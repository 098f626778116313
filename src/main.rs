use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::signal;
use tracing::{error, info};

use storefront_api as api;

use api::carrier::{CarrierGateway, HttpCarrierGateway};
use api::notifications::{LogMailer, Mailer};
use api::services::{
    CartService, DeliveryChargeCalculator, DeviceService, FulfillmentService, OrderService,
    StockMonitor,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_sender, event_rx) = api::events::event_channel(cfg.event_channel_capacity);
    tokio::spawn(api::events::process_events(event_rx));
    let event_sender_arc = Arc::new(event_sender.clone());

    // Outbound side effects
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let carrier: Arc<dyn CarrierGateway> = Arc::new(HttpCarrierGateway::new(&cfg.carrier)?);
    let delivery = DeliveryChargeCalculator::from_config(&cfg);

    // Build services
    let cart = Arc::new(CartService::new(db_arc.clone(), event_sender_arc.clone()));
    let orders = Arc::new(OrderService::new(
        db_arc.clone(),
        event_sender_arc.clone(),
        mailer.clone(),
        delivery,
        cfg.alert_email.clone(),
    ));
    let fulfillment = Arc::new(FulfillmentService::new(
        db_arc.clone(),
        event_sender_arc.clone(),
        mailer.clone(),
        carrier.clone(),
    ));
    let devices = Arc::new(DeviceService::new(db_arc.clone(), event_sender_arc.clone()));
    let monitor = Arc::new(StockMonitor::new(
        db_arc.clone(),
        event_sender_arc.clone(),
        mailer.clone(),
        cfg.alert_email.clone(),
    ));

    // Periodic low-stock sweep
    let sweep_interval = Duration::from_secs(cfg.stock_monitor_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match monitor.run_once().await {
                Ok(report) => {
                    if report.low_stock_notified > 0 || report.out_of_stock_notified > 0 {
                        info!(
                            low = report.low_stock_notified,
                            out = report.out_of_stock_notified,
                            "stock sweep sent alerts"
                        );
                    }
                }
                Err(e) => error!("stock sweep failed: {}", e),
            }
        }
    });

    let services = api::handlers::AppServices {
        cart,
        orders,
        fulfillment,
        devices,
        carrier,
    };

    let app_state = Arc::new(api::AppState {
        db: db_arc,
        config: cfg.clone(),
        event_sender,
        services,
    });

    let app = api::build_router(app_state);

    // Bind and serve
    let addr: SocketAddr = cfg.bind_address().parse()?;
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
