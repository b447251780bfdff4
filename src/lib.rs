// src/lib.rs — Library root for flockmirror

pub mod api;
pub mod cli;
pub mod engine;
pub mod gateway;
pub mod infra;
pub mod store;
pub mod util;
