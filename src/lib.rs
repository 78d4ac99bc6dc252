pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middlewares;
pub mod models;
pub mod queries;
pub mod quiz;
pub mod routes;
pub mod store;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod test_support;
