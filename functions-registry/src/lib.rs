//! The Functions Registry (C2, §4.2): the authoritative `(name → Function)` catalogue
//! plus the `(op-name → Operation)` ledger that conveys async create/delete completion.
//!
//! The registry never spawns or tears down a worker itself (see the teacher's own
//! `Registry<'a>` in `azure-functions/src/registry.rs`, which is likewise a pure
//! id-to-metadata map with no process-management responsibility of its own). Instead it
//! depends on an abstract [`WorkerProvisioner`], letting the Supervisor crate depend on
//! the registry without the registry ever depending back on the Supervisor.

use std::path::Path;
use std::sync::Arc;

use functions_core::model::{Operation, OperationType};
use functions_core::store::KvStore;
use functions_core::{Error, Function, FunctionLookup, WorkerProvisioner};

/// The registry itself: two write-through [`KvStore`]s plus a provisioner handle.
///
/// `Registry` also implements [`FunctionLookup`] (below) so the Supervisor can resolve
/// a function by name for an invoke that didn't go through `create` in this process's
/// lifetime, without depending on this crate for anything but that one trait.
pub struct Registry {
    functions: Arc<KvStore<Function>>,
    operations: Arc<KvStore<Operation>>,
    provisioner: Arc<dyn WorkerProvisioner>,
}

impl Registry {
    /// Opens (or creates) the registry's `.functions`/`.operations` files under `dir`.
    pub fn open(dir: &Path, provisioner: Arc<dyn WorkerProvisioner>) -> Result<Self, Error> {
        Ok(Registry {
            functions: Arc::new(KvStore::open(dir.join(".functions"))?),
            operations: Arc::new(KvStore::open(dir.join(".operations"))?),
            provisioner,
        })
    }

    /// `create(function) → Operation` (§4.2). Rejects a duplicate name synchronously;
    /// otherwise registers the function, creates a pending operation, and kicks off
    /// provisioning in the background — the call itself returns as soon as the
    /// bookkeeping is durable, not when the worker is ready.
    pub fn create(&self, function: Function) -> Result<Operation, Error> {
        if self.functions.contains(&function.name) {
            return Err(Error::already_exists(format!(
                "Function '{}' already exists.",
                function.name
            )));
        }

        let op = Operation::pending(
            format!("create {}", function.name),
            OperationType::Create,
        );
        self.operations.insert(op.name.clone(), op.clone())?;
        self.functions.insert(function.name.clone(), function.clone())?;

        self.spawn_provision(op.name.clone(), function);
        Ok(op)
    }

    /// `delete(name) → Operation` (§4.2). Symmetric to [`Registry::create`]: the
    /// Function record is removed immediately (a concurrent `get` sees `NOT_FOUND`
    /// right away) while worker teardown completes in the background.
    pub fn delete(&self, name: &str) -> Result<Operation, Error> {
        if self.functions.remove(name)?.is_none() {
            return Err(Error::not_found(format!(
                "Function '{}' does not exist.",
                name
            )));
        }

        let op = Operation::pending(format!("delete {}", name), OperationType::Delete);
        self.operations.insert(op.name.clone(), op.clone())?;

        self.spawn_teardown(op.name.clone(), name.to_owned());
        Ok(op)
    }

    /// `get(name) → Function` (§4.2).
    pub fn get(&self, name: &str) -> Result<Function, Error> {
        self.functions
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Function '{}' does not exist.", name)))
    }

    /// `list(location, pageSize) → Function[]` (§4.2). `location` is the
    /// `projects/{p}/locations/{l}` prefix; results are ordered by name. `page_size`
    /// truncates the result but this registry has no cursor-based pagination beyond
    /// that (§4.2: "pagination optional").
    pub fn list(&self, location: &str, page_size: Option<usize>) -> Vec<Function> {
        let prefix = format!("{}/functions/", location);
        let mut functions: Vec<Function> = self
            .functions
            .list()
            .into_iter()
            .filter(|f| f.name.starts_with(&prefix))
            .collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(page_size) = page_size {
            functions.truncate(page_size);
        }
        functions
    }

    /// `getOperation(name) → Operation` (§4.2).
    pub fn get_operation(&self, name: &str) -> Result<Operation, Error> {
        self.operations
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Operation '{}' does not exist.", name)))
    }

    fn spawn_provision(&self, op_name: String, function: Function) {
        let operations = self.operations.clone();
        let provisioner = self.provisioner.clone();
        tokio::spawn(async move {
            let outcome = provisioner.provision(&function).await;
            Self::complete(&operations, &op_name, outcome.map(|()| Some(function)));
        });
    }

    fn spawn_teardown(&self, op_name: String, name: String) {
        let operations = self.operations.clone();
        let provisioner = self.provisioner.clone();
        tokio::spawn(async move {
            let outcome = provisioner.teardown(&name).await;
            Self::complete(&operations, &op_name, outcome.map(|()| None));
        });
    }

    fn complete(
        operations: &KvStore<Operation>,
        op_name: &str,
        outcome: Result<Option<Function>, Error>,
    ) {
        let Some(mut op) = operations.get(op_name) else {
            tracing::warn!(op_name, "operation vanished before it could be completed");
            return;
        };
        match outcome {
            Ok(response) => op.complete_with_response(response),
            Err(error) => op.complete_with_error(error),
        }
        if let Err(e) = operations.insert(op_name.to_owned(), op) {
            tracing::error!(op_name, error = %e, "failed to persist completed operation");
        }
    }
}

#[async_trait::async_trait]
impl FunctionLookup for Registry {
    async fn lookup(&self, name: &str) -> Result<Function, Error> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use functions_core::model::SourceLocation;
    use functions_core::Trigger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeProvisioner {
        fail_provision: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkerProvisioner for FakeProvisioner {
        async fn provision(&self, _function: &Function) -> Result<(), Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_provision {
                Err(Error::internal("failed to spawn worker"))
            } else {
                Ok(())
            }
        }

        async fn teardown(&self, _name: &str) -> Result<(), Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn a_function(short: &str) -> Function {
        Function::new(
            "proj",
            "us-central1",
            short,
            Trigger::Http,
            SourceLocation::LocalPath { path: "./fixture".into() },
            None,
            None,
            Default::default(),
        )
        .unwrap()
    }

    async fn wait_until_done(registry: &Registry, op_name: &str) -> Operation {
        for _ in 0..100 {
            let op = registry.get_operation(op_name).unwrap();
            if op.done {
                return op;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("operation never completed");
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = Arc::new(FakeProvisioner {
            fail_provision: false,
            calls: AtomicUsize::new(0),
        });
        let registry = Registry::open(dir.path(), provisioner).unwrap();

        let function = a_function("hello");
        let op = registry.create(function.clone()).unwrap();
        assert!(!op.done);

        let fetched = registry.get(&function.name).unwrap();
        assert_eq!(fetched.name, function.name);

        let completed = wait_until_done(&registry, &op.name).await;
        assert!(completed.done);
    }

    #[tokio::test]
    async fn create_then_delete_then_get_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = Arc::new(FakeProvisioner {
            fail_provision: false,
            calls: AtomicUsize::new(0),
        });
        let registry = Registry::open(dir.path(), provisioner).unwrap();

        let function = a_function("hello");
        registry.create(function.clone()).unwrap();

        let delete_op = registry.delete(&function.name).unwrap();
        wait_until_done(&registry, &delete_op.name).await;

        let err = registry.get(&function.name).unwrap_err();
        assert_eq!(err.kind, functions_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn duplicate_create_is_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = Arc::new(FakeProvisioner {
            fail_provision: false,
            calls: AtomicUsize::new(0),
        });
        let registry = Registry::open(dir.path(), provisioner).unwrap();

        let function = a_function("hello");
        registry.create(function.clone()).unwrap();

        let err = registry.create(function).unwrap_err();
        assert_eq!(err.kind, functions_core::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn failed_provisioning_completes_the_operation_with_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = Arc::new(FakeProvisioner {
            fail_provision: true,
            calls: AtomicUsize::new(0),
        });
        let registry = Registry::open(dir.path(), provisioner).unwrap();

        let op = registry.create(a_function("hello")).unwrap();
        let completed = wait_until_done(&registry, &op.name).await;

        match completed.outcome {
            Some(functions_core::model::OperationOutcome::Error(e)) => {
                assert_eq!(e.kind, functions_core::ErrorKind::Internal);
            }
            other => panic!("expected an error outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_filters_by_location_and_orders_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = Arc::new(FakeProvisioner {
            fail_provision: false,
            calls: AtomicUsize::new(0),
        });
        let registry = Registry::open(dir.path(), provisioner).unwrap();

        registry.create(a_function("zeta")).unwrap();
        registry.create(a_function("alpha")).unwrap();

        let listed = registry.list("projects/proj/locations/us-central1", None);
        let names: Vec<&str> = listed.iter().map(|f| f.short_name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
