pub mod rate_limit;
pub mod tls;

pub use rate_limit::RateLimiter;
pub use tls::{TlsConfig, TlsInfo, TlsInfoCache};
