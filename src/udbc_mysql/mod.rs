pub mod client;
pub mod provider;

pub use client::MysqlClient;
pub use provider::MysqlProvider;
