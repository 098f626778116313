use crate::config::CarrierConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Serviceability verdict for a destination pincode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Serviceability {
    pub serviceable: bool,
    pub prepaid: bool,
    pub cod: bool,
    pub city: Option<String>,
    pub state_code: Option<String>,
}

impl Serviceability {
    pub fn unserviceable() -> Self {
        Self {
            serviceable: false,
            prepaid: false,
            cod: false,
            city: None,
            state_code: None,
        }
    }
}

/// One shipment inside a pickup request. All fields are copied from the
/// order at request time; the gateway never reads the database.
#[derive(Debug, Clone, Serialize)]
pub struct PickupShipment {
    pub order_number: String,
    pub recipient_name: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub phone: String,
    pub payment_mode: PaymentMode,
    pub total_amount: Decimal,
    pub weight_kg: f64,
    pub products_desc: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum PaymentMode {
    Prepaid,
    Cod,
}

impl PaymentMode {
    fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Prepaid => "Prepaid",
            PaymentMode::Cod => "COD",
        }
    }
}

/// Result of a successful pickup booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupReceipt {
    pub waybill: String,
}

/// A single tracking scan reported by the carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub status: String,
    pub location: Option<String>,
    pub remark: Option<String>,
}

/// Courier partner integration boundary. Implementations talk to the real
/// carrier API; tests substitute a stub so no fulfillment path depends on
/// the network.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// Checks whether the carrier delivers to `pincode`.
    async fn check_pincode(&self, pincode: &str) -> Result<Serviceability, ServiceError>;

    /// Books a pickup for a shipment and returns the assigned waybill.
    async fn create_pickup(&self, shipment: PickupShipment) -> Result<PickupReceipt, ServiceError>;

    /// Fetches the scan history for a waybill, most recent first.
    async fn track(&self, waybill: &str) -> Result<Vec<TrackingUpdate>, ServiceError>;
}

/// HTTP implementation over the carrier's public API.
pub struct HttpCarrierGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    pickup_location: String,
    pickup_pincode: String,
}

impl HttpCarrierGateway {
    pub fn new(cfg: &CarrierConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::CarrierError(format!("client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_token: cfg.api_token.clone(),
            pickup_location: cfg.pickup_location.clone(),
            pickup_pincode: cfg.pickup_pincode.clone(),
        })
    }
}

#[async_trait]
impl CarrierGateway for HttpCarrierGateway {
    async fn check_pincode(&self, pincode: &str) -> Result<Serviceability, ServiceError> {
        let url = format!(
            "{}/c/api/pin-codes/json/?filter_codes={}",
            self.base_url, pincode
        );
        debug!(%pincode, "checking pincode serviceability");

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_token)
            .send()
            .await
            .map_err(|e| ServiceError::CarrierError(format!("serviceability check: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::CarrierError(format!(
                "serviceability check returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::CarrierError(format!("serviceability decode: {}", e)))?;

        // An empty delivery_codes array means the carrier does not cover
        // this pincode at all.
        let postal = body["delivery_codes"]
            .as_array()
            .and_then(|codes| codes.first())
            .map(|entry| &entry["postal_code"]);

        let Some(postal) = postal else {
            return Ok(Serviceability::unserviceable());
        };

        let prepaid = postal["pre_paid"].as_str() == Some("Y");
        let cod = postal["cod"].as_str() == Some("Y");

        Ok(Serviceability {
            serviceable: prepaid || cod,
            prepaid,
            cod,
            city: postal["city"].as_str().map(str::to_string),
            state_code: postal["state_code"].as_str().map(str::to_string),
        })
    }

    async fn create_pickup(&self, shipment: PickupShipment) -> Result<PickupReceipt, ServiceError> {
        let url = format!("{}/api/cmu/create.json", self.base_url);

        let cod_amount = match shipment.payment_mode {
            PaymentMode::Prepaid => Decimal::ZERO,
            PaymentMode::Cod => shipment.total_amount,
        };

        let payload = json!({
            "pickup_location": {
                "name": self.pickup_location,
                "pin": self.pickup_pincode,
                "country": "India",
            },
            "shipments": [{
                "name": shipment.recipient_name,
                "add": shipment.address_line,
                "city": shipment.city,
                "state": shipment.state,
                "pin": shipment.pincode,
                "country": "India",
                "phone": shipment.phone,
                "order": shipment.order_number,
                "payment_mode": shipment.payment_mode.as_str(),
                "total_amount": shipment.total_amount,
                "cod_amount": cod_amount,
                "weight": shipment.weight_kg,
                "shipment_width": 10,
                "shipment_height": 10,
                "shipment_length": 10,
                "products_desc": shipment.products_desc,
            }],
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_token))
            .form(&[("data", payload.to_string()), ("format", "json".to_string())])
            .send()
            .await
            .map_err(|e| ServiceError::CarrierError(format!("pickup request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "pickup request rejected");
            return Err(ServiceError::CarrierError(format!(
                "pickup request returned {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::CarrierError(format!("pickup decode: {}", e)))?;

        let waybill = body["packages"]
            .as_array()
            .and_then(|packages| packages.first())
            .and_then(|package| package["waybill"].as_str())
            .ok_or_else(|| {
                ServiceError::CarrierError("pickup response carried no waybill".to_string())
            })?;

        Ok(PickupReceipt {
            waybill: waybill.to_string(),
        })
    }

    async fn track(&self, waybill: &str) -> Result<Vec<TrackingUpdate>, ServiceError> {
        let url = format!(
            "{}/api/v1/packages/json/?waybill={}",
            self.base_url, waybill
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_token))
            .send()
            .await
            .map_err(|e| ServiceError::CarrierError(format!("track request: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::CarrierError(format!(
                "track request returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::CarrierError(format!("track decode: {}", e)))?;

        let scans = body["ShipmentData"]
            .as_array()
            .and_then(|shipments| shipments.first())
            .and_then(|shipment| shipment["Shipment"]["Scans"].as_array())
            .cloned()
            .unwrap_or_default();

        let mut updates: Vec<TrackingUpdate> = scans
            .iter()
            .filter_map(|scan| {
                let detail = &scan["ScanDetail"];
                detail["Scan"].as_str().map(|status| TrackingUpdate {
                    status: status.to_string(),
                    location: detail["ScannedLocation"].as_str().map(str::to_string),
                    remark: detail["Instructions"].as_str().map(str::to_string),
                })
            })
            .collect();
        updates.reverse();

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unserviceable_verdict_has_no_modes() {
        let verdict = Serviceability::unserviceable();
        assert!(!verdict.serviceable);
        assert!(!verdict.prepaid && !verdict.cod);
    }

    #[test]
    fn payment_mode_uses_carrier_spelling() {
        assert_eq!(PaymentMode::Prepaid.as_str(), "Prepaid");
        assert_eq!(PaymentMode::Cod.as_str(), "COD");
    }
}
