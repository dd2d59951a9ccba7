pub mod api;
pub mod chunk;
