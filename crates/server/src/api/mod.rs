pub mod downloads;
pub mod handlers;
pub mod middleware;
pub mod packages;
pub mod routes;
pub mod versions;
pub mod ws;

pub use routes::create_router;
