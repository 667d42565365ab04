pub mod config;
pub mod text;
pub mod types;

// Keep the public surface small and intentional.
pub use config::*;
pub use text::*;
pub use types::*;
