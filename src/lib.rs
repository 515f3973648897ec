pub mod band;
pub mod config;
pub mod error;
pub mod expand;
pub mod input;
pub mod job;
pub mod render;
pub mod sheet;
pub mod solver;
pub mod span;
pub mod strip;
pub mod tail;
pub mod types;
