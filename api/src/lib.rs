pub mod handlers;
pub mod models;
pub mod observability;
pub mod routes;
pub mod state;
