//! Concrete subsystem implementations for the lifecycle container.
//!
//! Each type here binds one third-party client into a `svckit` capability
//! contract: process environment parsing ([`EnvSettings`]), the global log
//! subscriber ([`LogStack`]), the relational pool ([`SqlDatabase`]), the
//! cache client ([`RedisCache`]), payload rules ([`PayloadValidator`]), and
//! the span exporter ([`OtelTracer`]). All of them resolve their inputs
//! lazily through the [`svckit::ServiceHub`] during `init`, so attachment
//! order never matters.

pub mod cache;
pub mod db;
pub mod env;
pub mod logging;
pub mod trace;
pub mod validate;

pub use cache::RedisCache;
pub use db::SqlDatabase;
pub use env::{EnvConfig, EnvSettings};
pub use logging::{LogConfig, LogStack};
pub use trace::OtelTracer;
pub use validate::PayloadValidator;
