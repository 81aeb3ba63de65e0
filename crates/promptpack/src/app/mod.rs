//! Application layer orchestrating domain logic and infrastructure.

pub mod content;
pub mod export;
pub mod freshness;
pub mod minify;
pub mod presets;
pub mod scan;
pub mod search;
pub mod selection;
pub mod suggest;
pub mod tokens;
pub mod tree;
pub mod workspace;
