pub mod composer;
pub mod dictation;
pub mod engine;
pub mod render;
pub mod session;
pub mod traits;
pub mod turn;
pub mod workflow;
