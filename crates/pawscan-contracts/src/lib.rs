pub mod consultations;
pub mod diagnosis;
pub mod error;
pub mod events;
pub mod flow;
pub mod images;
pub mod models;
pub mod pet;
pub mod records;
