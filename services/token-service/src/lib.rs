pub mod app;
pub mod handlers;

pub use app::{router, AppState};
