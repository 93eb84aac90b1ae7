//! The ordered set of steps active on a client.
//!
//! Registration order is execution order, for both the before-chain and the
//! after-chain. Names are expected to be unique but registration does not
//! check: removal takes out every step with the given name.

use tracing::trace;

use crate::{AnyStep, Error, Result, StepInfo};

/// How [`Registry::remove`] treats a name that is not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    /// Fail with [`Error::NotRegistered`].
    Strict,
    /// Do nothing.
    Lenient,
}

impl Default for RemovalMode {
    /// `Strict` in debug builds, `Lenient` in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Ordered collection of [`AnyStep`]s.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    steps: Vec<AnyStep>,
    mode: RemovalMode,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(mode: RemovalMode) -> Self {
        Self {
            steps: Vec::new(),
            mode,
        }
    }

    /// Removal mode in effect.
    #[must_use]
    pub const fn mode(&self) -> RemovalMode {
        self.mode
    }

    /// Appends a step at the end.
    pub fn register(&mut self, step: impl Into<AnyStep>) {
        let step = step.into();
        trace!(step = step.name(), position = self.steps.len(), "registering step");
        self.steps.push(step);
    }

    /// Removes every step called `name`, or every step when `name` is `None`.
    ///
    /// # Errors
    ///
    /// In [`RemovalMode::Strict`], returns [`Error::NotRegistered`] when no
    /// step carries that name. The registry is left unchanged in that case.
    pub fn remove(&mut self, name: Option<&str>) -> Result<()> {
        let Some(name) = name else {
            self.clear();
            return Ok(());
        };

        let before = self.steps.len();
        self.steps.retain(|step| step.name() != name);
        let removed = before - self.steps.len();

        if removed == 0 && self.mode == RemovalMode::Strict {
            return Err(Error::not_registered(name));
        }
        trace!(step = name, removed, "removed step");
        Ok(())
    }

    /// Removes every step.
    pub fn clear(&mut self) {
        trace!(count = self.steps.len(), "clearing all steps");
        self.steps.clear();
    }

    /// Returns `true` if a step called `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|step| step.name() == name)
    }

    /// Names of the registered steps, in execution order.
    #[must_use]
    pub fn list(&self) -> Vec<StepInfo> {
        self.steps
            .iter()
            .map(|step| StepInfo {
                name: step.name().to_string(),
            })
            .collect()
    }

    /// A copy of the step list for one call.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AnyStep> {
        self.steps.clone()
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
