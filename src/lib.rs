pub mod cache_key;
pub mod engine;
pub mod error;
pub mod http;
pub mod playlist;
pub mod segment;
pub mod service;
pub mod settings;
pub mod signing;
pub mod single_flight;
pub mod workspace;

#[cfg(test)]
mod test_util;
