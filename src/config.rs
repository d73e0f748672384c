use std::env;

use crate::error::AppError;
use crate::pricing::PricingConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub seed_demo_data: bool,
    pub pricing: PricingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = PricingConfig::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            seed_demo_data: parse_or_default("SEED_DEMO_DATA", false)?,
            pricing: PricingConfig {
                base_fare: parse_or_default("BASE_FARE", defaults.base_fare)?,
                per_km_rate: parse_or_default("PER_KM_RATE", defaults.per_km_rate)?,
                urgent_fee: parse_or_default("URGENT_FEE", defaults.urgent_fee)?,
                weight_fee_per_kg: parse_or_default(
                    "WEIGHT_FEE_PER_KG",
                    defaults.weight_fee_per_kg,
                )?,
                free_weight_kg: parse_or_default("FREE_WEIGHT_KG", defaults.free_weight_kg)?,
                average_speed_kmh: parse_or_default(
                    "AVERAGE_SPEED_KMH",
                    defaults.average_speed_kmh,
                )?,
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
