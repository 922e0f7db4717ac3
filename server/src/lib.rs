//! Pocketbook Server
//!
//! Process wiring for the rate cache, the currency converter and the ledger.

pub mod app;
pub mod config;
pub mod state;

pub use app::App;
pub use config::ServerConfig;
pub use state::AppState;
