mod handlers;
mod listener;

pub use listener::{router, HealthServer};
