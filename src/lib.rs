pub mod config;
pub mod controller;
pub mod domain;
pub mod normalizer;
pub mod presenter;
pub mod prices;
pub mod telemetry;
