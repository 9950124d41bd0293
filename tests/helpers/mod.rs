pub mod app;
pub mod fixtures;
