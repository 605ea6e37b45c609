pub mod generation;
pub mod history;
pub mod models;
