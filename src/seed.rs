use tracing::info;

use crate::engine::store::{DispatchStore, NewDriver, NewMission};
use crate::error::AppError;
use crate::models::location::Location;

pub fn load_demo_data(store: &DispatchStore) -> Result<(), AppError> {
    let alami = store.create_driver(NewDriver {
        name: "Mohammed Alami".to_string(),
        phone: "+212 6 11 22 33 44".to_string(),
        vehicle_type: "Triporteur électrique".to_string(),
        license_plate: "12345-A-6".to_string(),
        current_location: Some(Location::new(33.5731, -7.5898).with_address("Casablanca")),
    })?;
    store.create_driver(NewDriver {
        name: "Hassan Tazi".to_string(),
        phone: "+212 6 55 66 77 88".to_string(),
        vehicle_type: "Triporteur thermique".to_string(),
        license_plate: "67890-B-6".to_string(),
        current_location: Some(Location::new(33.7890, -7.1600).with_address("Bouznika")),
    })?;
    store.create_driver(NewDriver {
        name: "Karim Bennani".to_string(),
        phone: "+212 6 99 00 11 22".to_string(),
        vehicle_type: "Triporteur électrique".to_string(),
        license_plate: "11111-C-6".to_string(),
        current_location: Some(Location::new(31.7917, -7.0926).with_address("Marrakech")),
    })?;

    store.create_mission(NewMission {
        customer_name: "Ahmed Benali".to_string(),
        customer_phone: "+212 6 12 34 56 78".to_string(),
        customer_email: Some("ahmed@email.com".to_string()),
        pickup: Location::new(33.7890, -7.1600).with_address("Bouznika, Maroc"),
        destination: Location::new(31.7917, -7.0926).with_address("Marrakech, Maroc"),
        weight: 25.0,
        urgent: true,
        notes: Some("Bagages fragiles, manipulation délicate requise".to_string()),
    })?;
    let assigned = store.create_mission(NewMission {
        customer_name: "Fatima Zahra".to_string(),
        customer_phone: "+212 6 98 76 54 32".to_string(),
        customer_email: None,
        pickup: Location::new(33.5731, -7.5898).with_address("Casablanca, Maroc"),
        destination: Location::new(33.7890, -7.1600).with_address("Bouznika, Maroc"),
        weight: 15.0,
        urgent: false,
        notes: None,
    })?;
    store.assign(&assigned.command_number, alami.id)?;

    info!(
        drivers = store.driver_count(),
        missions = store.mission_count(),
        "demo data loaded"
    );
    Ok(())
}
