pub mod admin;
pub mod auth;
pub mod booking;
pub mod functions;
pub mod identity;
pub mod screens;
pub mod validation;
