mod app;
mod config;
mod execute;
mod store;
mod validation;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use execute::ExecuteError;
pub use store::StoreError;
pub use validation::ValidationError;
