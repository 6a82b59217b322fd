pub mod auth;

pub use auth::AuthCommand;
