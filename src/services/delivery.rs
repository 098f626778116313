use crate::config::AppConfig;
use rust_decimal::Decimal;

/// Deterministic delivery charge policy: free at or above a configured
/// subtotal threshold, flat rate below it, nothing for an empty subtotal.
#[derive(Debug, Clone)]
pub struct DeliveryChargeCalculator {
    free_threshold: Decimal,
    flat_rate: Decimal,
}

impl DeliveryChargeCalculator {
    pub fn new(free_threshold: Decimal, flat_rate: Decimal) -> Self {
        Self {
            free_threshold,
            flat_rate,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            Decimal::try_from(cfg.free_delivery_threshold).unwrap_or(Decimal::MAX),
            Decimal::try_from(cfg.delivery_flat_rate).unwrap_or_default(),
        )
    }

    pub fn calculate(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO || subtotal >= self.free_threshold {
            Decimal::ZERO
        } else {
            self.flat_rate
        }
    }
}
