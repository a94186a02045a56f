//! Interpreter sessions: one embedded Lua VM plus its script cache.
//!
//! A [`Session`] is the unit of script execution. It exclusively owns one
//! engine instance and every compiled unit registered in it, tracks the
//! reentrancy depth of command calls, and holds the last produced result
//! until it is serialized. Failures of individual scripts (compile errors,
//! runtime errors, untrapped command errors) are contained to the failing
//! invocation; the session and its cache stay usable.

use crate::bridge::{self, BridgeShared, CommandDispatcher};
use crate::cache::{AddOutcome, ScriptCache};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::hash::ScriptId;
use crate::reply::ReplySink;
use mlua::{HookTriggers, Lua, RegistryKey, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// One script-execution context over one embedded engine instance.
///
/// Clients register script bodies with [`add_function`](Session::add_function),
/// run them by content identity with [`run_function`](Session::run_function)
/// (or fuse both steps with [`execute`](Session::execute)), and drain the
/// produced value through [`serialize`](Session::serialize).
///
/// # Thread Safety
///
/// A session is a confined resource: it is move-only and must not be shared
/// for concurrent use. The intended model is one session per worker execution
/// context (one per thread, one per shard), each handling one invocation to
/// completion before accepting the next. The embedded VM's call stack, global
/// table, and heap are not reentrant across independent invocations.
///
/// # Example
///
/// ```
/// use scriptbox::{ReplyCollector, ReplySink, ReplyValue, Session};
///
/// # fn main() -> Result<(), scriptbox::Error> {
/// let mut session = Session::new()?;
/// session.set_dispatcher(|args: &mut [Vec<u8>], sink: &mut dyn ReplySink| {
///     // A toy dispatcher: every command replies with its own name.
///     let name = args[0].clone();
///     sink.on_string(&name);
/// });
///
/// let (id, result) = session.execute("return store.call('PING')");
/// result?;
///
/// let mut reply = ReplyCollector::new();
/// session.serialize(&mut reply)?;
/// assert_eq!(reply.take(), Some(ReplyValue::string("PING")));
///
/// // The id keeps working for later invocations of the same body.
/// session.run_function(&id)?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    /// The embedded engine instance. Owned exclusively; released when the
    /// session is dropped.
    lua: Lua,

    /// Compiled units registered in this session, by content identity.
    cache: ScriptCache,

    /// Dispatcher slot and reentrancy depth, shared with the bridge
    /// built-ins registered inside the VM.
    bridge: Arc<BridgeShared>,

    /// The value produced by the last successful run, pending serialization.
    last_result: Option<RegistryKey>,

    /// Configuration this session was created with.
    options: Options,
}

impl Session {
    /// Creates a session with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(Options::default())
    }

    /// Creates a session with the given options.
    ///
    /// Validates the options, creates the VM, and registers the `store.call`
    /// and `store.pcall` built-ins.
    pub fn with_options(options: Options) -> Result<Self> {
        options.validate()?;

        let lua = Lua::new();
        let shared = Arc::new(BridgeShared::new(options.max_command_depth));
        bridge::install(&lua, Arc::clone(&shared))?;

        Ok(Self {
            lua,
            cache: ScriptCache::new(),
            bridge: shared,
            last_result: None,
            options,
        })
    }

    /// Installs the command dispatcher scripts call into.
    ///
    /// Until a dispatcher is installed, `store.call` and `store.pcall` raise
    /// a runtime error inside the script. Installing again replaces the
    /// previous dispatcher.
    pub fn set_dispatcher<F>(&mut self, dispatcher: F)
    where
        F: CommandDispatcher + 'static,
    {
        *self.bridge.dispatcher.lock() = Some(Box::new(dispatcher));
    }

    /// Registers a script body under its content identity.
    ///
    /// Returns the identity together with the registration outcome:
    /// [`AddOutcome::Added`] for a newly compiled body,
    /// [`AddOutcome::AlreadyCached`] when the identity is already bound
    /// (idempotent success, the body is not recompiled), or
    /// [`AddOutcome::CompileError`] with the engine's diagnostic when the
    /// body is malformed (nothing is cached).
    ///
    /// # Errors
    ///
    /// `Err` is reserved for engine-level failures; compile diagnostics are
    /// reported through the outcome, not the error channel.
    pub fn add_function(&mut self, body: &str) -> Result<(ScriptId, AddOutcome)> {
        let id = ScriptId::of(body.as_bytes());
        let outcome = self.cache.register(&self.lua, id, body)?;
        match &outcome {
            AddOutcome::Added => {
                log::debug!("cached script {} ({} bytes)", id, body.len());
            }
            AddOutcome::AlreadyCached => {
                log::debug!("script {} already cached", id);
            }
            AddOutcome::CompileError(msg) => {
                log::warn!("script {} failed to compile: {}", id, msg);
            }
        }
        Ok((id, outcome))
    }

    /// Runs a previously registered script by identity.
    ///
    /// The reentrancy depth is reset to zero at entry. On success the
    /// produced value becomes the pending result, retrievable once via
    /// [`serialize`](Session::serialize). On a script runtime error the
    /// pending result is cleared and the session remains usable; previously
    /// cached units are unaffected.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no script is cached under `id`.
    /// - [`Error::Runtime`] if the script raises, makes an untrapped failing
    ///   command call, or exceeds the configured time limit.
    pub fn run_function(&mut self, id: &ScriptId) -> Result<()> {
        let key = match self.cache.lookup(id) {
            Some(key) => key,
            None => {
                return Err(Error::not_found(format!(
                    "no script cached under id {}",
                    id
                )))
            }
        };
        let func: mlua::Function<'_> = self.lua.registry_value(key)?;

        self.bridge.depth.store(0, Ordering::Relaxed);
        self.last_result = None;

        let start = Instant::now();
        if let Some(timeout) = self.options.script_timeout {
            let interval = self.options.instruction_hook_interval;
            self.lua.set_hook(
                HookTriggers {
                    every_nth_instruction: Some(interval),
                    ..Default::default()
                },
                move |_lua, _debug| {
                    if start.elapsed() > timeout {
                        Err(mlua::Error::RuntimeError(
                            "script execution timeout".to_string(),
                        ))
                    } else {
                        Ok(())
                    }
                },
            );
        }

        let outcome = func.call::<_, Value>(());

        if self.options.script_timeout.is_some() {
            self.lua.remove_hook();
        }

        match outcome {
            Ok(value) => {
                let result_key = self.lua.create_registry_value(value)?;
                self.last_result = Some(result_key);
                log::info!("script {} completed in {:?}", id, start.elapsed());
                Ok(())
            }
            Err(err) => {
                log::warn!("script {} failed: {}", id, err);
                Err(Error::Runtime(err.to_string()))
            }
        }
    }

    /// Registers and immediately runs a script body.
    ///
    /// Equivalent to [`add_function`](Session::add_function) followed by
    /// [`run_function`](Session::run_function). The assigned identity is
    /// always reported, even when the body fails to compile, so callers can
    /// retry by id later once the body is fixed elsewhere.
    pub fn execute(&mut self, body: &str) -> (ScriptId, Result<()>) {
        let (id, outcome) = match self.add_function(body) {
            Ok(added) => added,
            Err(err) => return (ScriptId::of(body.as_bytes()), Err(err)),
        };
        if let AddOutcome::CompileError(msg) = outcome {
            return (id, Err(Error::Compile(msg)));
        }
        (id, self.run_function(&id))
    }

    /// Drains the pending result through the serializer contract into `sink`.
    ///
    /// Walks the value once, emitting a well-formed event stream: array
    /// lengths declared up front, starts and ends balanced. Serializing
    /// consumes the result; a second call without an intervening successful
    /// run fails.
    ///
    /// # Errors
    ///
    /// [`Error::NoPendingResult`] if there is nothing to serialize: no run
    /// has succeeded yet, the last run failed, or the result was already
    /// drained.
    pub fn serialize(&mut self, sink: &mut dyn ReplySink) -> Result<()> {
        let key = self.last_result.take().ok_or(Error::NoPendingResult)?;
        let value: Value<'_> = self.lua.registry_value(&key)?;
        let reply = bridge::lua_value_to_reply(&value)?;
        self.lua.remove_registry_value(key)?;
        reply.emit(sink);
        Ok(())
    }

    /// Binds a named global to an ordered array of byte strings.
    ///
    /// Used to inject an invocation's argument vector before running it;
    /// scripts see a 1-indexed table of strings under `name`. Rebinding the
    /// same name overwrites the previous array.
    ///
    /// # Example
    ///
    /// ```
    /// use scriptbox::{ReplyCollector, ReplyValue, Session};
    ///
    /// # fn main() -> Result<(), scriptbox::Error> {
    /// let mut session = Session::new()?;
    /// session.set_global_array("ARGV", &[b"alpha", b"beta"])?;
    ///
    /// let (_, result) = session.execute("return ARGV[2]");
    /// result?;
    ///
    /// let mut reply = ReplyCollector::new();
    /// session.serialize(&mut reply)?;
    /// assert_eq!(reply.take(), Some(ReplyValue::string("beta")));
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_global_array(&mut self, name: &str, values: &[&[u8]]) -> Result<()> {
        let table = self.lua.create_table()?;
        for (i, value) in values.iter().enumerate() {
            table.raw_set(i + 1, self.lua.create_string(value)?)?;
        }
        self.lua.globals().raw_set(name, table)?;
        Ok(())
    }

    /// Current nesting depth of in-flight command invocations.
    ///
    /// Zero whenever no script-issued command call is running, in particular
    /// between invocations.
    pub fn command_depth(&self) -> u32 {
        self.bridge.depth.load(Ordering::Relaxed)
    }

    /// Number of compiled units cached in this session.
    pub fn cached_scripts(&self) -> usize {
        self.cache.len()
    }
}
