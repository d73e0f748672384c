use serde::{Deserialize, Serialize};

use crate::geo::distance_km;
use crate::models::driver::{Driver, MAX_RATING};
use crate::models::location::Location;

const DISTANCE_WEIGHT: f64 = 0.50;
const RATING_WEIGHT: f64 = 0.35;
const EXPERIENCE_WEIGHT: f64 = 0.15;

const EXPERIENCE_HALF_POINT: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub rating_score: f64,
    pub experience_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub driver: Driver,
    pub distance_to_pickup_km: Option<f64>,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}

pub fn compute_score(driver: &Driver, pickup: &Location) -> (f64, Option<f64>, ScoreBreakdown) {
    let distance = driver
        .current_location
        .as_ref()
        .map(|location| distance_km(location, pickup));

    let breakdown = ScoreBreakdown {
        distance_score: distance.map(distance_score).unwrap_or(0.0),
        rating_score: rating_score(driver.rating),
        experience_score: experience_score(driver.completed_missions),
    };

    (weighted_score(&breakdown), distance, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.distance_score * DISTANCE_WEIGHT)
        + (breakdown.rating_score * RATING_WEIGHT)
        + (breakdown.experience_score * EXPERIENCE_WEIGHT)
}

pub fn rank<'a>(drivers: impl IntoIterator<Item = &'a Driver>, pickup: &Location) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = drivers
        .into_iter()
        .filter(|driver| driver.is_available)
        .map(|driver| {
            let (score, distance, breakdown) = compute_score(driver, pickup);
            Candidate {
                driver: driver.clone(),
                distance_to_pickup_km: distance,
                score,
                score_breakdown: breakdown,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.driver.name.cmp(&b.driver.name))
    });
    candidates
}

fn distance_score(distance_km: f64) -> f64 {
    1.0 / (1.0 + distance_km.max(0.0))
}

fn rating_score(rating: f64) -> f64 {
    (rating / MAX_RATING).clamp(0.0, 1.0)
}

fn experience_score(completed_missions: u32) -> f64 {
    let completed = f64::from(completed_missions);
    completed / (completed + EXPERIENCE_HALF_POINT)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{compute_score, rank};
    use crate::models::driver::Driver;
    use crate::models::location::Location;

    fn driver(id_seed: u128, location: Option<(f64, f64)>, rating: f64, completed: u32) -> Driver {
        Driver {
            id: Uuid::from_u128(id_seed),
            name: format!("driver-{id_seed}"),
            phone: "+212 6 00 00 00 00".to_string(),
            vehicle_type: "Triporteur électrique".to_string(),
            license_plate: "12345-A-6".to_string(),
            is_available: true,
            current_location: location.map(|(lat, lng)| Location::new(lat, lng)),
            rating,
            completed_missions: completed,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn closer_driver_gets_higher_score_when_other_factors_match() {
        let pickup = Location::new(33.7890, -7.1600);

        let near = driver(1, Some((33.7891, -7.1601)), 4.5, 10);
        let far = driver(2, Some((31.7917, -7.0926)), 4.5, 10);

        let (near_score, _, _) = compute_score(&near, &pickup);
        let (far_score, _, _) = compute_score(&far, &pickup);

        assert!(near_score > far_score);
    }

    #[test]
    fn unknown_location_scores_zero_on_distance() {
        let pickup = Location::new(33.7890, -7.1600);
        let (_, distance, breakdown) = compute_score(&driver(1, None, 5.0, 0), &pickup);

        assert!(distance.is_none());
        assert_eq!(breakdown.distance_score, 0.0);
    }

    #[test]
    fn rank_skips_unavailable_and_orders_best_first() {
        let pickup = Location::new(33.7890, -7.1600);

        let mut busy = driver(1, Some((33.7890, -7.1600)), 5.0, 300);
        busy.is_available = false;
        let near = driver(2, Some((33.7891, -7.1601)), 4.6, 89);
        let far = driver(3, Some((31.7917, -7.0926)), 4.9, 203);

        let ranked = rank([&busy, &far, &near], &pickup);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].driver.id, near.id);
        assert_eq!(ranked[1].driver.id, far.id);
        assert!(ranked[0].score >= ranked[1].score);
    }
}
