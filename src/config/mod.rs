pub mod schema;

pub use schema::{Config, GatewayConfig, ProviderConfig, ProviderKind, StoreConfig};
