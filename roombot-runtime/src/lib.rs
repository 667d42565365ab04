pub mod config_store;
pub mod defaults;
pub mod http_client;
pub mod runtime_engine;
pub mod secrets;
