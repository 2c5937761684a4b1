pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod store;
pub mod tasks;
pub mod templates;
pub mod voting;

pub use broadcast::{ChannelHub, TierEvent};
pub use config::Config;
pub use db::Database;
pub use error::{Result, TierError};
pub use handlers::TierService;
pub use store::{MemoryStore, TierStore};
