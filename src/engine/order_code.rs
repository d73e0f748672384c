use chrono::{DateTime, Utc};
use rand::Rng;

pub const PREFIX: &str = "TRIP-";

/// `TRIP-` followed by the last six digits of the millisecond clock and three
/// random digits.
pub fn generate(now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    let suffix: u16 = rng.gen_range(0..1000);

    format!("{PREFIX}{millis:06}{suffix:03}")
}

pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}
