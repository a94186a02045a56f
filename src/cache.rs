//! Content-addressed cache of compiled scripts within one interpreter session.
//!
//! The cache binds a [`ScriptId`] to the engine's compiled representation of
//! the script body. Compiled units are held through the Lua registry, so they
//! stay invocable for the lifetime of the owning session's VM and are released
//! together with it. There is no eviction: units accumulate until the session
//! is dropped.

use crate::hash::ScriptId;
use mlua::{Lua, RegistryKey};
use std::collections::HashMap;

/// Outcome of registering a script body under its identity.
#[derive(Debug)]
pub enum AddOutcome {
    /// The body compiled and the unit is now cached.
    Added,

    /// The identity was already bound to a compiled unit. Not an error:
    /// identity equality is trusted as content equality, so the body is
    /// neither recompiled nor compared.
    AlreadyCached,

    /// The engine rejected the body; nothing was cached. Carries the
    /// engine's diagnostic text.
    CompileError(String),
}

impl AddOutcome {
    /// Returns true unless the outcome is a compile error.
    pub fn is_cached(&self) -> bool {
        !matches!(self, AddOutcome::CompileError(_))
    }
}

/// Maps script identities to compiled units inside one engine instance.
pub(crate) struct ScriptCache {
    units: HashMap<ScriptId, RegistryKey>,
}

impl ScriptCache {
    pub(crate) fn new() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Compiles and binds `body` under `id` unless already bound.
    ///
    /// `Err` is reserved for engine-level registry failures; compile
    /// diagnostics travel inside the outcome.
    pub(crate) fn register(
        &mut self,
        lua: &Lua,
        id: ScriptId,
        body: &str,
    ) -> crate::Result<AddOutcome> {
        if self.units.contains_key(&id) {
            return Ok(AddOutcome::AlreadyCached);
        }

        let chunk = lua.load(body).set_name(format!("script:{}", id));
        let func = match chunk.into_function() {
            Ok(func) => func,
            Err(err) => return Ok(AddOutcome::CompileError(err.to_string())),
        };

        let key = lua.create_registry_value(func)?;
        self.units.insert(id, key);
        Ok(AddOutcome::Added)
    }

    /// Looks up the compiled unit for `id`. Pure read, never compiles.
    pub(crate) fn lookup(&self, id: &ScriptId) -> Option<&RegistryKey> {
        self.units.get(id)
    }

    /// Number of cached units.
    pub(crate) fn len(&self) -> usize {
        self.units.len()
    }
}
