//! The popsicle bridge: one WebSocket endpoint relaying wallet commands to
//! `cardano-wallet` and faucet commands to the raw-transaction layer.

pub mod config;
pub mod events;
pub mod server;

pub use events::AppState;
pub use server::app_router;
