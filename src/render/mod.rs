//! Text and JSON renderings of resolved queries

pub mod json;
pub mod text;
