pub mod store;
pub mod token;

pub use store::{CacheTokenStore, TokenRecord, TokenStore};
pub use token::{MIN_TOKEN_TTL, TokenClaims, TokenService};
