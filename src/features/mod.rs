//! HTTP features, each with its own dtos, handlers, services and routes

pub mod files;
pub mod health;
