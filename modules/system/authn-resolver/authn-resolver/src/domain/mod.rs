pub mod fetcher;
pub mod issuer;
pub mod jwt;
pub mod key_cache;
