pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod passwords;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::ApiError;
pub use http::router;
pub use state::{AppState, StateError};
pub use store::{AccountRecord, AccountStore, MemoryAccountStore, StoreError};
