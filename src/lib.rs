//! Landify: admin client core for the agricultural-management backend.

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod profile;
pub mod session;
pub mod validation;
pub mod wizard;
