pub mod config;
pub mod error;
pub mod slug;
pub mod types;

pub use config::Config;
pub use error::TrendScoutError;
pub use slug::slugify;
pub use types::*;
