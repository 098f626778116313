use crate::{
    entities::{product, product_color, stock_notification, ProductColorModel},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{Mailer, OutboundMail},
};
use chrono::{Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Colors already alerted inside this window are skipped, and notification
/// rows older than it are purged.
const DEDUP_WINDOW_DAYS: i64 = 2;

/// Periodic low-stock sweep. Schedule-agnostic: the caller decides when
/// `run_once` fires.
#[derive(Clone)]
pub struct StockMonitor {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    mailer: Arc<dyn Mailer>,
    alert_email: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub low_stock_notified: usize,
    pub out_of_stock_notified: usize,
    pub skipped_recent: usize,
}

impl StockMonitor {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        mailer: Arc<dyn Mailer>,
        alert_email: Option<String>,
    ) -> Self {
        Self {
            db,
            event_sender,
            mailer,
            alert_email,
        }
    }

    /// One sweep: collect low and out-of-stock colors, skip those alerted
    /// inside the dedup window, send one batch mail per severity, record a
    /// notification per color only when the send succeeded, and purge
    /// expired notification rows. Mail failure is logged, never raised.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<SweepReport, ServiceError> {
        let cutoff = Utc::now() - Duration::days(DEDUP_WINDOW_DAYS);

        // Purge first so the dedup check below only sees live rows.
        stock_notification::Entity::delete_many()
            .filter(stock_notification::Column::NotifiedAt.lt(cutoff))
            .exec(&*self.db)
            .await?;

        let recently_notified: HashSet<Uuid> = stock_notification::Entity::find()
            .filter(stock_notification::Column::NotifiedAt.gte(cutoff))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|n| n.color_id)
            .collect();

        let at_risk = product_color::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Expr::col(product_color::Column::StockQuantity)
                            .lte(Expr::col(product_color::Column::ReorderThreshold)),
                    )
                    .add(product_color::Column::StockQuantity.eq(0)),
            )
            .all(&*self.db)
            .await?;

        let product_names = self.product_names(&at_risk).await?;

        let mut low_stock = Vec::new();
        let mut out_of_stock = Vec::new();
        let mut skipped = 0usize;

        for color in at_risk {
            if color.stock_quantity > color.reorder_threshold {
                continue;
            }
            if recently_notified.contains(&color.id) {
                skipped += 1;
                continue;
            }
            if color.stock_quantity == 0 {
                out_of_stock.push(color);
            } else if color.stock_quantity > 0 {
                low_stock.push(color);
            }
        }

        let mut report = SweepReport {
            skipped_recent: skipped,
            ..Default::default()
        };

        if self
            .alert_bucket("Low stock alert", &low_stock, &product_names)
            .await
        {
            report.low_stock_notified = low_stock.len();
            self.record_notifications(&low_stock, &product_names).await?;
        }
        if self
            .alert_bucket("Out of stock alert", &out_of_stock, &product_names)
            .await
        {
            report.out_of_stock_notified = out_of_stock.len();
            self.record_notifications(&out_of_stock, &product_names)
                .await?;
        }

        for color in low_stock.iter().chain(out_of_stock.iter()) {
            self.event_sender
                .send_or_log(Event::StockAlert {
                    color_id: color.id,
                    product_name: product_names
                        .get(&color.product_id)
                        .cloned()
                        .unwrap_or_default(),
                    stock_quantity: color.stock_quantity,
                    reorder_threshold: color.reorder_threshold,
                })
                .await;
        }

        info!(?report, "stock sweep finished");
        Ok(report)
    }

    async fn product_names(
        &self,
        colors: &[ProductColorModel],
    ) -> Result<HashMap<Uuid, String>, ServiceError> {
        let product_ids: Vec<Uuid> = colors.iter().map(|c| c.product_id).collect();
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect())
    }

    /// Sends one batch mail for a severity bucket. Returns whether the send
    /// succeeded (an empty bucket counts as success with no mail sent).
    async fn alert_bucket(
        &self,
        subject: &str,
        colors: &[ProductColorModel],
        product_names: &HashMap<Uuid, String>,
    ) -> bool {
        if colors.is_empty() {
            return false;
        }
        let Some(to) = &self.alert_email else {
            warn!("no alert email configured; stock alert not sent");
            return false;
        };

        let body = colors
            .iter()
            .map(|color| {
                format!(
                    "{} / {}: {} left (threshold {})",
                    product_names
                        .get(&color.product_id)
                        .map(String::as_str)
                        .unwrap_or("unknown product"),
                    color.name,
                    color.stock_quantity,
                    color.reorder_threshold
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        match self
            .mailer
            .send(OutboundMail::new(to.clone(), subject, body))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("stock alert mail failed: {}", e);
                false
            }
        }
    }

    async fn record_notifications(
        &self,
        colors: &[ProductColorModel],
        product_names: &HashMap<Uuid, String>,
    ) -> Result<(), ServiceError> {
        for color in colors {
            stock_notification::ActiveModel {
                id: Set(Uuid::new_v4()),
                color_id: Set(color.id),
                product_name: Set(product_names
                    .get(&color.product_id)
                    .cloned()
                    .unwrap_or_default()),
                notified_at: Set(Utc::now()),
            }
            .insert(&*self.db)
            .await?;
        }
        Ok(())
    }
}
