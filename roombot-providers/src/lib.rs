pub mod api;
pub mod events;
pub mod ndjson;
pub mod parse;
pub mod request;
pub mod runtime;
