pub mod order_code;
pub mod scoring;
pub mod store;
pub mod transitions;
