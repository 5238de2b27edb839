//! Daily Savings Library
//!
//! Re-exports modules for the binary, integration testing and external use.

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
mod error;
pub mod handlers;
pub mod jobs;
pub mod rate_limit;
pub mod repository;
pub mod services;

pub use config::Config;
pub use domain::{Currency, DomainError, Money, MoneyError, OperationContext, PlanId, UserId};
pub use error::{AppError, AppResult, ErrorResponse};
