//! Application layer containing business logic and shared state.

pub mod service;
pub mod state;

pub use service::MessageService;
pub use state::AppState;
