// Users module - account records and current-user endpoints

pub mod handlers;
pub mod models;
pub mod repo;
pub mod routes;

pub use routes::users_routes;
