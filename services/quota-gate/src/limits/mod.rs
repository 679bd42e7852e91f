pub mod cache;
pub mod error;
pub mod provider;
pub mod snapshot;

pub use cache::{ConfigCache, RefreshTask};
pub use error::LimitsError;
pub use provider::{HttpLimitsProvider, LimitsProvider, StaticLimitsProvider};
pub use snapshot::{ConfigSnapshot, LimitName, LimitValues};

pub const DAILY_FREE_CHARS: &str = "daily_free_chars";
pub const WEEKLY_FREE_CHARS: &str = "weekly_free_chars";
pub const MONTHLY_FREE_CHARS: &str = "monthly_free_chars";
pub const MONTHLY_PLUS_CHARS: &str = "monthly_plus_chars";
