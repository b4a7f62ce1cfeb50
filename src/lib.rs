pub mod api;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod intake;
pub mod layers;
pub mod render;
pub mod server;
pub mod session;
pub mod style;
pub mod submission;
pub mod types;
pub mod visibility;
