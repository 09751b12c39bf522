pub mod schema;

pub use schema::{
    mask_secret, resolve_config_dir, Config, GatewayConfig, DEFAULT_MODEL, DEFAULT_PROVIDER,
};
