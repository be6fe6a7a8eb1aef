//! Price-aware virtual outdoor temperature for heat pumps.
//!
//! Each cycle turns indoor/outdoor readings, a price series and an optional
//! weather forecast into a synthetic outdoor temperature that the heat pump
//! reads instead of its real outdoor sensor.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod inputs;
pub mod pricing;
pub mod telemetry;
