//! Placeholder subsystems used as every slot's initial value.
//!
//! Each one is an independent unit struct relying entirely on the contract's
//! default bodies: no work is performed, no call ever fails, and sibling
//! lookups are never made. A manager carrying only these is runnable end to
//! end, which is what lets tests and partial configurations (the migrate
//! entry point needs just environment, logger, and database) skip the slots
//! they do not care about.

use crate::contracts::{
    Cache, Database, Environment, Handlers, HttpServer, Logger, Subsystem, Tracer, Validator,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnvironment;
impl Subsystem for NoopEnvironment {}
impl Environment for NoopEnvironment {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;
impl Subsystem for NoopLogger {}
impl Logger for NoopLogger {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDatabase;
impl Subsystem for NoopDatabase {}
impl Database for NoopDatabase {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;
impl Subsystem for NoopCache {}
impl Cache for NoopCache {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopValidator;
impl Subsystem for NoopValidator {}
impl Validator for NoopValidator {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHttpServer;
impl Subsystem for NoopHttpServer {}
impl HttpServer for NoopHttpServer {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandlers;
impl Subsystem for NoopHandlers {}
impl Handlers for NoopHandlers {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;
impl Subsystem for NoopTracer {}
impl Tracer for NoopTracer {}
