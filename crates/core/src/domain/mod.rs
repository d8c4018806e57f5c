pub mod order;
pub mod profile;
