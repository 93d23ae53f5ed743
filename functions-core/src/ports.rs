//! The two abstract contracts that keep the Registry and the Supervisor decoupled
//! (§9 "operations as decoupling"): the Registry only needs *something* that can
//! provision/tear down a worker, and the Supervisor only needs *something* that can
//! look up a [`Function`] by name. Concrete implementations live in the
//! `functions-registry` and `functions-supervisor` crates respectively; this crate
//! (which both depend on) owns only the trait shape so neither needs to depend on the
//! other.

use async_trait::async_trait;

use crate::error::Error;
use crate::model::Function;

/// What the Registry needs from whatever owns worker processes.
#[async_trait]
pub trait WorkerProvisioner: Send + Sync {
    async fn provision(&self, function: &Function) -> Result<(), Error>;
    async fn teardown(&self, name: &str) -> Result<(), Error>;
}

/// What the Supervisor needs from whatever owns the function catalogue.
#[async_trait]
pub trait FunctionLookup: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Function, Error>;
}
