use chrono::{Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::order_code;
use crate::engine::scoring::{self, Candidate};
use crate::engine::transitions::{self, Transition};
use crate::error::AppError;
use crate::geo::distance_km;
use crate::models::driver::{Driver, MAX_RATING};
use crate::models::event::{MissionAction, MissionEvent};
use crate::models::location::Location;
use crate::models::mission::{AssignedDriver, Mission, MissionStatus};
use crate::pricing::{self, estimate_minutes, PricingConfig};

pub const MIN_WEIGHT_KG: f64 = 0.1;
pub const MAX_WEIGHT_KG: f64 = 100.0;

#[derive(Debug, Clone, Deserialize)]
pub struct NewMission {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub pickup: Location,
    pub destination: Location,
    pub weight: f64,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub phone: String,
    pub vehicle_type: String,
    pub license_plate: String,
    #[serde(default)]
    pub current_location: Option<Location>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub vehicle_type: Option<String>,
    pub license_plate: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissionFilter {
    pub status: Option<MissionStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub mission: Mission,
    pub driver: Option<Driver>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchStats {
    pub total_missions: usize,
    pub pending: usize,
    pub assigned: usize,
    pub accepted: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub completed_revenue: u64,
    pub drivers_total: usize,
    pub drivers_available: usize,
}

// Anything touching a mission and a driver runs under `transition_lock` and
// holds both entries while writing.
pub struct DispatchStore {
    missions: DashMap<Uuid, Mission>,
    codes: DashMap<String, Uuid>,
    drivers: DashMap<Uuid, Driver>,
    transition_lock: Mutex<()>,
    events_tx: broadcast::Sender<MissionEvent>,
    pricing: PricingConfig,
}

impl DispatchStore {
    pub fn new(pricing: PricingConfig, event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            missions: DashMap::new(),
            codes: DashMap::new(),
            drivers: DashMap::new(),
            transition_lock: Mutex::new(()),
            events_tx,
            pricing,
        }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MissionEvent> {
        self.events_tx.subscribe()
    }

    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn available_driver_count(&self) -> usize {
        self.drivers
            .iter()
            .filter(|entry| entry.value().is_available)
            .count()
    }

    pub fn create_mission(&self, request: NewMission) -> Result<Mission, AppError> {
        let customer_name = required("customer_name", &request.customer_name)?;
        let customer_phone = required("customer_phone", &request.customer_phone)?;
        let customer_email = optional_text(request.customer_email);
        if let Some(email) = &customer_email {
            if !email.contains('@') {
                return Err(AppError::BadRequest(format!("invalid customer_email: {email}")));
            }
        }

        if !request.weight.is_finite()
            || !(MIN_WEIGHT_KG..=MAX_WEIGHT_KG).contains(&request.weight)
        {
            return Err(AppError::BadRequest(format!(
                "weight must be between {MIN_WEIGHT_KG} and {MAX_WEIGHT_KG} kg"
            )));
        }

        let pickup = checked_location("pickup", request.pickup)?;
        let destination = checked_location("destination", request.destination)?;

        let quote = pricing::quote(
            &pickup,
            &destination,
            request.weight,
            request.urgent,
            &self.pricing,
        );

        let id = Uuid::new_v4();
        let now = Utc::now();
        let command_number = self.reserve_code(id);

        let mission = Mission {
            id,
            command_number,
            customer_name,
            customer_phone,
            customer_email,
            pickup,
            destination,
            weight: request.weight,
            urgent: request.urgent,
            price: quote.price,
            distance_km: quote.distance_km,
            status: MissionStatus::Pending,
            driver: None,
            created_at: now,
            updated_at: now,
            estimated_pickup_time: None,
            estimated_delivery_time: None,
            notes: optional_text(request.notes),
        };

        self.missions.insert(id, mission.clone());
        self.publish(&mission, MissionAction::Created);

        info!(
            command_number = %mission.command_number,
            distance_km = mission.distance_km,
            price = mission.price,
            urgent = mission.urgent,
            "mission created"
        );

        Ok(mission)
    }

    fn reserve_code(&self, id: Uuid) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code = order_code::generate(Utc::now(), &mut rng);
            match self.codes.entry(code.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(id);
                    return code;
                }
                Entry::Occupied(_) => continue,
            }
        }
    }

    fn mission_id(&self, code: &str) -> Result<Uuid, AppError> {
        let key = order_code::normalize(code);
        self.codes
            .get(&key)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("mission {key} not found")))
    }

    pub fn get_mission(&self, code: &str) -> Result<Mission, AppError> {
        let id = self.mission_id(code)?;
        self.missions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("mission {} not found", code.trim())))
    }

    pub fn list_missions(&self, filter: &MissionFilter) -> Vec<Mission> {
        let search = filter.search.as_deref().unwrap_or("");

        let mut missions: Vec<Mission> = self
            .missions
            .iter()
            .filter(|entry| {
                let mission = entry.value();
                filter.status.is_none_or(|status| mission.status == status)
                    && mission.matches_search(search)
            })
            .map(|entry| entry.value().clone())
            .collect();

        missions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.command_number.cmp(&a.command_number))
        });
        missions
    }

    pub fn update_notes(&self, code: &str, notes: Option<String>) -> Result<Mission, AppError> {
        let id = self.mission_id(code)?;
        let mut mission = self
            .missions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("mission {} not found", code.trim())))?;

        mission.notes = optional_text(notes);
        mission.updated_at = Utc::now();

        let mission = mission.clone();
        self.publish(&mission, MissionAction::NotesUpdated);
        Ok(mission)
    }

    pub fn candidates(&self, code: &str) -> Result<Vec<Candidate>, AppError> {
        let mission = self.get_mission(code)?;
        if mission.status != MissionStatus::Pending {
            return Err(AppError::Conflict(format!(
                "mission {} is {}, only pending missions take a driver",
                mission.command_number, mission.status
            )));
        }

        let drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        Ok(scoring::rank(&drivers, &mission.pickup))
    }

    pub fn assign(&self, code: &str, driver_id: Uuid) -> Result<TransitionOutcome, AppError> {
        let id = self.mission_id(code)?;
        let _guard = self.transition_lock.lock();

        let mut mission = self
            .missions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("mission {} not found", code.trim())))?;
        let next = transitions::apply(mission.status, Transition::Assign)?;

        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
        if !driver.is_available {
            return Err(AppError::Conflict(format!(
                "driver {} is not available",
                driver.name
            )));
        }

        let now = Utc::now();
        let speed = self.pricing.average_speed_kmh;
        let pickup_eta = driver.current_location.as_ref().map(|location| {
            let to_pickup = distance_km(location, &mission.pickup);
            now + minutes(estimate_minutes(to_pickup, speed))
        });
        let delivery_eta =
            pickup_eta.unwrap_or(now) + minutes(estimate_minutes(mission.distance_km, speed));

        driver.is_available = false;
        driver.updated_at = now;

        mission.status = next;
        mission.driver = Some(AssignedDriver::from(&*driver));
        mission.estimated_pickup_time = pickup_eta;
        mission.estimated_delivery_time = Some(delivery_eta);
        mission.updated_at = now;

        let outcome = TransitionOutcome {
            mission: mission.clone(),
            driver: Some(driver.clone()),
        };
        drop(driver);
        drop(mission);

        self.publish(&outcome.mission, MissionAction::Assigned);
        info!(
            command_number = %outcome.mission.command_number,
            driver_id = %driver_id,
            "driver assigned"
        );

        Ok(outcome)
    }

    pub fn accept(&self, code: &str) -> Result<TransitionOutcome, AppError> {
        self.advance(code, Transition::Accept)
    }

    pub fn start(&self, code: &str) -> Result<TransitionOutcome, AppError> {
        self.advance(code, Transition::Start)
    }

    pub fn complete(&self, code: &str) -> Result<TransitionOutcome, AppError> {
        self.advance(code, Transition::Complete)
    }

    pub fn cancel(&self, code: &str) -> Result<TransitionOutcome, AppError> {
        self.advance(code, Transition::Cancel)
    }

    fn advance(&self, code: &str, transition: Transition) -> Result<TransitionOutcome, AppError> {
        let id = self.mission_id(code)?;
        let _guard = self.transition_lock.lock();

        let mut mission = self
            .missions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("mission {} not found", code.trim())))?;
        let next = transitions::apply(mission.status, transition)?;
        let now = Utc::now();

        let mut driver = match mission.driver_id() {
            Some(driver_id) if transition.releases_driver() => {
                let driver = self.drivers.get_mut(&driver_id);
                if driver.is_none() {
                    warn!(
                        command_number = %mission.command_number,
                        driver_id = %driver_id,
                        "bound driver no longer exists"
                    );
                }
                driver
            }
            _ => None,
        };

        if let Some(driver) = driver.as_mut() {
            driver.is_available = true;
            if transition == Transition::Complete {
                driver.completed_missions = driver.completed_missions.saturating_add(1);
            }
            driver.updated_at = now;
        }

        match transition {
            Transition::Start => {
                let minutes_left =
                    estimate_minutes(mission.distance_km, self.pricing.average_speed_kmh);
                mission.estimated_delivery_time = Some(now + minutes(minutes_left));
            }
            Transition::Cancel => {
                mission.estimated_pickup_time = None;
                mission.estimated_delivery_time = None;
            }
            _ => {}
        }
        mission.status = next;
        mission.updated_at = now;

        let outcome = TransitionOutcome {
            mission: mission.clone(),
            driver: driver.as_ref().map(|driver| driver.value().clone()),
        };
        drop(driver);
        drop(mission);

        self.publish(&outcome.mission, transition.action());
        info!(
            command_number = %outcome.mission.command_number,
            status = %outcome.mission.status,
            "mission {}", transition.action().as_str()
        );

        Ok(outcome)
    }

    pub fn create_driver(&self, request: NewDriver) -> Result<Driver, AppError> {
        let current_location = request
            .current_location
            .map(|location| checked_location("current_location", location))
            .transpose()?;

        let driver = Driver {
            id: Uuid::new_v4(),
            name: required("name", &request.name)?,
            phone: required("phone", &request.phone)?,
            vehicle_type: required("vehicle_type", &request.vehicle_type)?,
            license_plate: required("license_plate", &request.license_plate)?,
            is_available: true,
            current_location,
            rating: MAX_RATING,
            completed_missions: 0,
            updated_at: Utc::now(),
        };

        self.drivers.insert(driver.id, driver.clone());
        info!(driver_id = %driver.id, name = %driver.name, "driver added");

        Ok(driver)
    }

    pub fn get_driver(&self, id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))
    }

    pub fn list_drivers(&self, available_only: bool) -> Vec<Driver> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .filter(|entry| !available_only || entry.value().is_available)
            .map(|entry| entry.value().clone())
            .collect();

        drivers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        drivers
    }

    pub fn update_driver(&self, id: Uuid, update: DriverUpdate) -> Result<Driver, AppError> {
        let name = update.name.as_deref().map(|v| required("name", v)).transpose()?;
        let phone = update.phone.as_deref().map(|v| required("phone", v)).transpose()?;
        let vehicle_type = update
            .vehicle_type
            .as_deref()
            .map(|v| required("vehicle_type", v))
            .transpose()?;
        let license_plate = update
            .license_plate
            .as_deref()
            .map(|v| required("license_plate", v))
            .transpose()?;
        if let Some(rating) = update.rating {
            if !rating.is_finite() {
                return Err(AppError::BadRequest("rating must be a number".to_string()));
            }
        }

        let _guard = self.transition_lock.lock();
        let active_mission = self.active_mission_of(id);

        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        if let Some(name) = name {
            driver.name = name;
        }
        if let Some(phone) = phone {
            driver.phone = phone;
        }
        if let Some(vehicle_type) = vehicle_type {
            driver.vehicle_type = vehicle_type;
        }
        if let Some(license_plate) = license_plate {
            driver.license_plate = license_plate;
        }
        if let Some(rating) = update.rating {
            driver.rating = rating.clamp(0.0, MAX_RATING);
        }
        driver.updated_at = Utc::now();

        if let Some(mission_id) = active_mission {
            if let Some(mut mission) = self.missions.get_mut(&mission_id) {
                mission.driver = Some(AssignedDriver::from(&*driver));
                mission.updated_at = driver.updated_at;
            }
        }

        Ok(driver.clone())
    }

    pub fn set_availability(&self, id: Uuid, is_available: bool) -> Result<Driver, AppError> {
        let _guard = self.transition_lock.lock();

        if let Some(mission_id) = self.active_mission_of(id) {
            return Err(AppError::Conflict(format!(
                "driver is on mission {}",
                self.code_of(mission_id)
            )));
        }

        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
        driver.is_available = is_available;
        driver.updated_at = Utc::now();

        info!(driver_id = %id, is_available, "driver availability changed");
        Ok(driver.clone())
    }

    pub fn update_driver_location(&self, id: Uuid, location: Location) -> Result<Driver, AppError> {
        let location = checked_location("location", location)?;

        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
        driver.current_location = Some(location);
        driver.updated_at = Utc::now();

        Ok(driver.clone())
    }

    pub fn delete_driver(&self, id: Uuid) -> Result<Driver, AppError> {
        let _guard = self.transition_lock.lock();

        if let Some(mission_id) = self.active_mission_of(id) {
            return Err(AppError::Conflict(format!(
                "cannot delete a driver on mission {}",
                self.code_of(mission_id)
            )));
        }

        let (_, driver) = self
            .drivers
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        info!(driver_id = %id, name = %driver.name, "driver removed");
        Ok(driver)
    }

    pub fn stats(&self) -> DispatchStats {
        let _guard = self.transition_lock.lock();
        let mut stats = DispatchStats::default();

        for entry in self.missions.iter() {
            let mission = entry.value();
            stats.total_missions += 1;
            match mission.status {
                MissionStatus::Pending => stats.pending += 1,
                MissionStatus::Assigned => stats.assigned += 1,
                MissionStatus::Accepted => stats.accepted += 1,
                MissionStatus::InProgress => stats.in_progress += 1,
                MissionStatus::Completed => {
                    stats.completed += 1;
                    stats.completed_revenue += u64::from(mission.price);
                }
                MissionStatus::Cancelled => stats.cancelled += 1,
            }
        }

        for entry in self.drivers.iter() {
            stats.drivers_total += 1;
            if entry.value().is_available {
                stats.drivers_available += 1;
            }
        }

        stats
    }

    pub fn consistency_violations(&self) -> Vec<String> {
        let _guard = self.transition_lock.lock();
        let mut violations = Vec::new();
        let mut bound: Vec<Uuid> = Vec::new();

        for entry in self.missions.iter() {
            let mission = entry.value();
            if !mission.status.is_active() {
                continue;
            }
            let Some(driver_id) = mission.driver_id() else {
                violations.push(format!(
                    "{} is {} without a driver",
                    mission.command_number, mission.status
                ));
                continue;
            };
            if bound.contains(&driver_id) {
                violations.push(format!("driver {driver_id} is bound to several missions"));
            }
            bound.push(driver_id);

            match self.drivers.get(&driver_id) {
                Some(driver) if driver.is_available => violations.push(format!(
                    "driver {driver_id} is available while on {}",
                    mission.command_number
                )),
                Some(_) => {}
                None => violations.push(format!(
                    "{} references missing driver {driver_id}",
                    mission.command_number
                )),
            }
        }

        violations
    }

    fn active_mission_of(&self, driver_id: Uuid) -> Option<Uuid> {
        self.missions
            .iter()
            .find(|entry| {
                let mission = entry.value();
                mission.status.is_active() && mission.driver_id() == Some(driver_id)
            })
            .map(|entry| *entry.key())
    }

    fn code_of(&self, mission_id: Uuid) -> String {
        self.missions
            .get(&mission_id)
            .map(|entry| entry.value().command_number.clone())
            .unwrap_or_else(|| mission_id.to_string())
    }

    fn publish(&self, mission: &Mission, action: MissionAction) {
        let _ = self.events_tx.send(MissionEvent {
            mission_id: mission.id,
            command_number: mission.command_number.clone(),
            action,
            status: mission.status,
            driver_id: mission.driver_id(),
            at: mission.updated_at,
        });
    }
}

fn minutes(value: u32) -> Duration {
    Duration::minutes(i64::from(value))
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn checked_location(field: &str, location: Location) -> Result<Location, AppError> {
    if !location.is_valid() {
        return Err(AppError::BadRequest(format!(
            "{field} must have lat in [-90, 90] and lng in [-180, 180]"
        )));
    }

    Ok(Location {
        address: optional_text(location.address),
        ..location
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{DispatchStore, DriverUpdate, MissionFilter, NewDriver, NewMission};
    use crate::error::AppError;
    use crate::models::event::MissionAction;
    use crate::models::location::Location;
    use crate::models::mission::MissionStatus;
    use crate::pricing::PricingConfig;

    fn store() -> DispatchStore {
        DispatchStore::new(PricingConfig::default(), 64)
    }

    fn booking(name: &str) -> NewMission {
        NewMission {
            customer_name: name.to_string(),
            customer_phone: "+212 6 12 34 56 78".to_string(),
            customer_email: None,
            pickup: Location::new(33.7890, -7.1600).with_address("Bouznika"),
            destination: Location::new(31.7917, -7.0926).with_address("Marrakech"),
            weight: 25.0,
            urgent: true,
            notes: None,
        }
    }

    fn driver(store: &DispatchStore, name: &str) -> Uuid {
        store
            .create_driver(NewDriver {
                name: name.to_string(),
                phone: "+212 6 55 66 77 88".to_string(),
                vehicle_type: "Triporteur thermique".to_string(),
                license_plate: "67890-B-6".to_string(),
                current_location: Some(Location::new(33.7890, -7.1600)),
            })
            .unwrap()
            .id
    }

    #[test]
    fn create_mission_prices_server_side() {
        let store = store();
        let mission = store.create_mission(booking("Ahmed Benali")).unwrap();

        assert_eq!(mission.status, MissionStatus::Pending);
        assert!(mission.command_number.starts_with("TRIP-"));
        assert!((mission.distance_km - 222.18).abs() < 1e-9);
        assert_eq!(mission.price, 700);
        assert!(mission.driver.is_none());
    }

    #[test]
    fn create_mission_validates_input() {
        let store = store();

        let mut blank = booking("  ");
        assert!(matches!(store.create_mission(blank.clone()), Err(AppError::BadRequest(_))));

        blank.customer_name = "Fatima".to_string();
        blank.weight = 0.0;
        assert!(matches!(store.create_mission(blank.clone()), Err(AppError::BadRequest(_))));

        blank.weight = 120.0;
        assert!(matches!(store.create_mission(blank.clone()), Err(AppError::BadRequest(_))));

        blank.weight = 5.0;
        blank.pickup = Location::new(95.0, 0.0);
        assert!(matches!(store.create_mission(blank), Err(AppError::BadRequest(_))));

        assert_eq!(store.mission_count(), 0);
    }

    #[test]
    fn lookup_by_code_ignores_case() {
        let store = store();
        let mission = store.create_mission(booking("Ahmed")).unwrap();

        let found = store
            .get_mission(&format!(" {} ", mission.command_number.to_lowercase()))
            .unwrap();
        assert_eq!(found.id, mission.id);

        assert!(matches!(store.get_mission("TRIP-000"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn assignment_flips_only_the_chosen_driver() {
        let store = store();
        let chosen = driver(&store, "Hassan Tazi");
        let other = driver(&store, "Karim Bennani");
        let mission = store.create_mission(booking("Ahmed")).unwrap();

        let outcome = store.assign(&mission.command_number, chosen).unwrap();

        assert_eq!(outcome.mission.status, MissionStatus::Assigned);
        assert_eq!(outcome.mission.driver_id(), Some(chosen));
        assert!(outcome.mission.estimated_pickup_time.is_some());
        assert!(outcome.mission.estimated_delivery_time.is_some());
        assert!(!store.get_driver(chosen).unwrap().is_available);
        assert!(store.get_driver(other).unwrap().is_available);
        assert!(store.consistency_violations().is_empty());
    }

    #[test]
    fn assignment_guards() {
        let store = store();
        let busy = driver(&store, "Mohammed Alami");
        let free = driver(&store, "Hassan Tazi");
        let first = store.create_mission(booking("Ahmed")).unwrap();
        let second = store.create_mission(booking("Fatima")).unwrap();

        store.assign(&first.command_number, busy).unwrap();

        assert!(matches!(
            store.assign(&second.command_number, busy),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store.assign(&first.command_number, free),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store.assign(&second.command_number, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));

        let untouched = store.get_mission(&second.command_number).unwrap();
        assert_eq!(untouched.status, MissionStatus::Pending);
        assert!(store.get_driver(free).unwrap().is_available);
    }

    #[test]
    fn completion_frees_driver_and_counts_mission() {
        let store = store();
        let id = driver(&store, "Karim Bennani");
        let mission = store.create_mission(booking("Ahmed")).unwrap();
        let code = mission.command_number.as_str();

        store.assign(code, id).unwrap();
        store.accept(code).unwrap();
        store.start(code).unwrap();
        let outcome = store.complete(code).unwrap();

        assert_eq!(outcome.mission.status, MissionStatus::Completed);
        assert!(outcome.mission.status.is_terminal());
        let freed = outcome.driver.unwrap();
        assert!(freed.is_available);
        assert_eq!(freed.completed_missions, 1);
        assert_eq!(store.stats().completed_revenue, 700);
    }

    #[test]
    fn cancelling_releases_driver_and_is_final() {
        let store = store();
        let id = driver(&store, "Karim Bennani");
        let mission = store.create_mission(booking("Ahmed")).unwrap();
        let code = mission.command_number.as_str();

        store.assign(code, id).unwrap();
        let outcome = store.cancel(code).unwrap();

        assert_eq!(outcome.mission.status, MissionStatus::Cancelled);
        assert!(outcome.mission.estimated_delivery_time.is_none());
        assert!(store.get_driver(id).unwrap().is_available);
        assert_eq!(store.get_driver(id).unwrap().completed_missions, 0);

        assert!(matches!(store.cancel(code), Err(AppError::Conflict(_))));
        assert!(matches!(store.start(code), Err(AppError::Conflict(_))));
    }

    #[test]
    fn cancelling_pending_mission_has_no_driver() {
        let store = store();
        let mission = store.create_mission(booking("Ahmed")).unwrap();

        let outcome = store.cancel(&mission.command_number).unwrap();
        assert!(outcome.driver.is_none());
    }

    #[test]
    fn driver_on_mission_cannot_be_deleted_or_toggled() {
        let store = store();
        let id = driver(&store, "Mohammed Alami");
        let mission = store.create_mission(booking("Ahmed")).unwrap();
        store.assign(&mission.command_number, id).unwrap();

        assert!(matches!(store.delete_driver(id), Err(AppError::Conflict(_))));
        assert!(matches!(
            store.set_availability(id, true),
            Err(AppError::Conflict(_))
        ));

        store.cancel(&mission.command_number).unwrap();
        store.set_availability(id, false).unwrap();
        assert!(store.delete_driver(id).is_ok());
        assert_eq!(store.driver_count(), 0);
    }

    #[test]
    fn driver_edit_refreshes_active_mission() {
        let store = store();
        let id = driver(&store, "Hassan");
        let mission = store.create_mission(booking("Ahmed")).unwrap();
        store.assign(&mission.command_number, id).unwrap();

        let updated = store
            .update_driver(
                id,
                DriverUpdate {
                    name: Some("Hassan Tazi".to_string()),
                    rating: Some(7.5),
                    ..DriverUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.rating, 5.0);
        let mission = store.get_mission(&mission.command_number).unwrap();
        assert_eq!(mission.driver.unwrap().name, "Hassan Tazi");
    }

    #[test]
    fn list_filters_by_status_and_search() {
        let store = store();
        let id = driver(&store, "Hassan");
        let ahmed = store.create_mission(booking("Ahmed Benali")).unwrap();
        store.create_mission(booking("Fatima Zahra")).unwrap();
        store.assign(&ahmed.command_number, id).unwrap();

        let pending = store.list_missions(&MissionFilter {
            status: Some(MissionStatus::Pending),
            search: None,
        });
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].customer_name, "Fatima Zahra");

        let by_name = store.list_missions(&MissionFilter {
            status: None,
            search: Some("benali".to_string()),
        });
        assert_eq!(by_name.len(), 1);

        let by_code = store.list_missions(&MissionFilter {
            status: None,
            search: Some(ahmed.command_number.to_lowercase()),
        });
        assert_eq!(by_code[0].id, ahmed.id);

        assert_eq!(store.list_missions(&MissionFilter::default()).len(), 2);
    }

    #[test]
    fn candidates_only_for_pending_missions() {
        let store = store();
        let near = driver(&store, "Hassan");
        let mission = store.create_mission(booking("Ahmed")).unwrap();

        let ranked = store.candidates(&mission.command_number).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].driver.id, near);

        store.assign(&mission.command_number, near).unwrap();
        assert!(matches!(
            store.candidates(&mission.command_number),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn events_follow_commit_order() {
        let store = store();
        let mut rx = store.subscribe();
        let id = driver(&store, "Hassan");
        let mission = store.create_mission(booking("Ahmed")).unwrap();
        store.assign(&mission.command_number, id).unwrap();
        store.cancel(&mission.command_number).unwrap();

        let actions: Vec<MissionAction> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                MissionAction::Created,
                MissionAction::Assigned,
                MissionAction::Cancelled
            ]
        );
    }

    #[test]
    fn subscribers_receive_events_in_wire_shape() {
        let store = store();
        let mut rx = store.subscribe();
        let id = driver(&store, "Hassan");
        let mission = store.create_mission(booking("Ahmed")).unwrap();
        store.assign(&mission.command_number, id).unwrap();

        let created = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(created["action"], "created");
        assert_eq!(created["status"], "pending");
        assert_eq!(created["command_number"], mission.command_number.as_str());
        assert_eq!(created["mission_id"], mission.id.to_string());
        assert!(created["driver_id"].is_null());

        let assigned = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(assigned["action"], "assigned");
        assert_eq!(assigned["status"], "assigned");
        assert_eq!(assigned["driver_id"], id.to_string());
    }

    #[test]
    fn concurrent_assignments_bind_a_driver_once() {
        let store = store();
        let id = driver(&store, "Hassan");
        let codes: Vec<String> = (0..8)
            .map(|i| {
                store
                    .create_mission(booking(&format!("customer {i}")))
                    .unwrap()
                    .command_number
            })
            .collect();

        let shared = &store;
        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = codes
                .iter()
                .map(|code| scope.spawn(move || shared.assign(code, id).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 1);
        assert!(store.consistency_violations().is_empty());
        assert_eq!(store.stats().assigned, 1);
    }
}
