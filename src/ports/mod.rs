pub mod cache_port;
pub mod config_port;
pub mod data_port;
pub mod market_cap_port;
pub mod picks_port;
