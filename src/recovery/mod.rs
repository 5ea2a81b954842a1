pub mod block;
pub mod engine;
pub mod partial_key;
pub mod state;

pub use block::Block;
pub use engine::{CancelToken, RecoveryEngine};
pub use partial_key::PartialKey;
pub use state::RecoveryState;
