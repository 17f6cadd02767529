//! HTTP request handlers.

pub mod catalog;
pub mod catchments;
pub mod choropleth;
pub mod common;
pub mod dissolve;
pub mod health;
pub mod tiles;
