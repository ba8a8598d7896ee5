pub mod actor;
pub mod message;
