pub mod batch;
pub mod dispatch;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod watermarks;

pub use routes::create_router;
