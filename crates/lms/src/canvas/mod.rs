mod client;
mod graphql;
pub mod models;
pub mod transformer;

pub use client::{CanvasClient, next_link};
