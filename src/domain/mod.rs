pub mod acquisition;
pub mod error;
pub mod models;
pub mod settings;
pub mod stability;
