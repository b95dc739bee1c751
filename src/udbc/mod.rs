pub mod provider;

pub const DEFAULT_POOL_NAME: &str = "default";
