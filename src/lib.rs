pub mod config;
pub mod relay;

pub use config::{Config, ConfigError};
pub use relay::{
    decode, relay_queue, DecodeError, Endpoint, Forwarder, ForwarderStats, IngressListener,
    ListenerStats, WorkItem,
};
