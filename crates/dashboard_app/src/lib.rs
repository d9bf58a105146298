//! Dashboard server: video streaming, analysis and analytics proxies, and the
//! headless dashboard session.
pub mod config;
mod effects;
pub mod logging;
mod routes;
pub mod session;
pub mod sheet;
pub mod upstream;

pub use routes::{router, AppContext};
