pub mod auth;
pub mod client;
pub mod endpoints;

pub use client::CameraClient;
pub use endpoints::CameraApi;
