pub mod http;
pub mod live;
pub mod routes;

pub use http::start_server;
pub use live::{LiveChannelHub, LiveConnection, LiveEvent};
pub use routes::{create_router, AppState};
