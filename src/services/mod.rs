// src/services/mod.rs
pub mod email;
pub mod google;

pub use email::{EmailService, EmailTemplate, EmailVariables};
pub use google::GoogleOAuthService;
