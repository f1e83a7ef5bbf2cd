pub mod channels;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;
pub mod verification;
