pub mod driver;
pub mod event;
pub mod location;
pub mod mission;
