pub mod config;
pub mod errors;
pub mod extraction;
pub mod migration;
pub mod profile;
pub mod routes;
pub mod state;
