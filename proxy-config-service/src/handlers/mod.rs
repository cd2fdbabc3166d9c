pub mod auth;
pub mod configs;
pub mod headers;
pub mod projects;
