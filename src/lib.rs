//! Time-anchored video annotations: unit-space shapes captured on top of a
//! playing video and re-displayed whenever playback comes back to them.

pub mod app;
pub mod config;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod model;
pub mod overlay;
pub mod playback;
pub mod raster;
pub mod session;
pub mod store;
pub mod visibility;
pub mod workspace;
