use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::distance_km;
use crate::models::location::Location;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub urgent_fee: f64,
    pub weight_fee_per_kg: f64,
    pub free_weight_kg: f64,
    pub average_speed_kmh: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 50.0,
            per_km_rate: 2.5,
            urgent_fee: 20.0,
            weight_fee_per_kg: 5.0,
            free_weight_kg: 10.0,
            average_speed_kmh: 25.0,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let amounts = [
            ("BASE_FARE", self.base_fare),
            ("PER_KM_RATE", self.per_km_rate),
            ("URGENT_FEE", self.urgent_fee),
            ("WEIGHT_FEE_PER_KG", self.weight_fee_per_kg),
            ("FREE_WEIGHT_KG", self.free_weight_kg),
        ];

        for (key, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Internal(format!(
                    "invalid {key}: must be a non-negative number"
                )));
            }
        }

        if !self.average_speed_kmh.is_finite() || self.average_speed_kmh <= 0.0 {
            return Err(AppError::Internal(
                "invalid AVERAGE_SPEED_KMH: must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_fare: f64,
    pub distance_charge: f64,
    pub urgent_fee: f64,
    pub excess_weight_fee: f64,
}

impl PriceBreakdown {
    pub fn total(&self) -> f64 {
        self.base_fare + self.distance_charge + self.urgent_fee + self.excess_weight_fee
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub distance_km: f64,
    pub price: u32,
    pub formatted_price: String,
    pub estimated_minutes: u32,
    pub breakdown: PriceBreakdown,
}

pub fn breakdown(
    distance_km: f64,
    weight: f64,
    urgent: bool,
    config: &PricingConfig,
) -> PriceBreakdown {
    let excess_weight = (weight - config.free_weight_kg).max(0.0);

    PriceBreakdown {
        base_fare: config.base_fare,
        distance_charge: distance_km.max(0.0) * config.per_km_rate,
        urgent_fee: if urgent { config.urgent_fee } else { 0.0 },
        excess_weight_fee: excess_weight * config.weight_fee_per_kg,
    }
}

pub fn price(distance_km: f64, weight: f64, urgent: bool, config: &PricingConfig) -> u32 {
    round_price(breakdown(distance_km, weight, urgent, config).total())
}

fn round_price(total: f64) -> u32 {
    total.round().max(0.0) as u32
}

pub fn estimate_minutes(distance_km: f64, average_speed_kmh: f64) -> u32 {
    if average_speed_kmh <= 0.0 {
        return 0;
    }

    let hours = distance_km.max(0.0) / average_speed_kmh;
    (hours * 60.0).ceil() as u32
}

pub fn format_price(price: u32) -> String {
    format!("{:.2} DH", f64::from(price))
}

pub fn quote(
    pickup: &Location,
    destination: &Location,
    weight: f64,
    urgent: bool,
    config: &PricingConfig,
) -> Quote {
    let distance = distance_km(pickup, destination);
    let breakdown = breakdown(distance, weight, urgent, config);
    let price = round_price(breakdown.total());

    Quote {
        distance_km: distance,
        price,
        formatted_price: format_price(price),
        estimated_minutes: estimate_minutes(distance, config.average_speed_kmh),
        breakdown,
    }
}
