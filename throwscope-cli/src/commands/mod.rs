pub mod analyze;
pub mod class;
pub mod common;
pub mod methods;
pub mod path;
