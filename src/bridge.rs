//! The call bridge between running scripts and the store's command dispatcher.
//!
//! Two built-ins are installed into every session's global table `store`:
//!
//! - `store.call(...)`: executes a command; a command-level error is raised
//!   as a script error and unwinds the invocation.
//! - `store.pcall(...)`: executes the same way, but a command-level error is
//!   returned to the script as an `{err = text}` table it can inspect.
//!
//! The bridge converts in both directions through the crate's single value
//! type: script arguments are read into byte strings handed to the
//! dispatcher, and the dispatcher's reply events are collected back into a
//! [`ReplyValue`] and materialized as script values. Argument buffers are
//! borrowed by the dispatcher only for the duration of one call.

use crate::reply::{ReplyCollector, ReplySink, ReplyValue};
use bytes::Bytes;
use mlua::{Lua, Table, Value, Variadic};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Executes one store command on behalf of a running script.
///
/// `args` is the command name followed by its arguments. The slices are
/// mutable and owned by the calling script's execution frame; they must not
/// be retained beyond the call. The reply is written into `sink` using the
/// nine [`ReplySink`] event kinds.
///
/// Implemented for any `FnMut(&mut [Vec<u8>], &mut dyn ReplySink)` closure.
pub trait CommandDispatcher {
    /// Runs the command and writes its reply into `sink`.
    fn dispatch(&mut self, args: &mut [Vec<u8>], sink: &mut dyn ReplySink);
}

impl<F> CommandDispatcher for F
where
    F: FnMut(&mut [Vec<u8>], &mut dyn ReplySink),
{
    fn dispatch(&mut self, args: &mut [Vec<u8>], sink: &mut dyn ReplySink) {
        self(args, sink)
    }
}

/// State shared between the session and the bridge built-ins.
pub(crate) struct BridgeShared {
    /// Dispatcher slot; empty until the session installs one.
    pub(crate) dispatcher: Mutex<Option<Box<dyn CommandDispatcher>>>,

    /// Count of command invocations currently in flight. Zero whenever no
    /// script-issued command call is running.
    pub(crate) depth: AtomicU32,

    /// Calls at this depth are rejected before reaching the dispatcher.
    max_depth: Option<u32>,
}

impl BridgeShared {
    pub(crate) fn new(max_depth: Option<u32>) -> Self {
        Self {
            dispatcher: Mutex::new(None),
            depth: AtomicU32::new(0),
            max_depth,
        }
    }
}

/// Registers `store.call` and `store.pcall` in the VM's global table.
pub(crate) fn install(lua: &Lua, shared: Arc<BridgeShared>) -> mlua::Result<()> {
    let table = lua.create_table()?;

    let shared_call = Arc::clone(&shared);
    let call = lua.create_function(move |lua, args: Variadic<Value<'_>>| {
        invoke_command(lua, &shared_call, args, true)
    })?;
    table.set("call", call)?;

    let shared_pcall = Arc::clone(&shared);
    let pcall = lua.create_function(move |lua, args: Variadic<Value<'_>>| {
        invoke_command(lua, &shared_pcall, args, false)
    })?;
    table.set("pcall", pcall)?;

    lua.globals().set("store", table)?;
    Ok(())
}

/// Common path of both built-ins.
///
/// Depth is incremented for the duration of the dispatch and decremented on
/// every exit path, including the raise path.
fn invoke_command<'lua>(
    lua: &'lua Lua,
    shared: &BridgeShared,
    args: Variadic<Value<'lua>>,
    raise_error: bool,
) -> mlua::Result<Value<'lua>> {
    let mut argv = collect_args(&args)?;

    if let Some(max) = shared.max_depth {
        if shared.depth.load(Ordering::Relaxed) >= max {
            log::warn!("rejecting command call nested beyond depth {}", max);
            return Err(mlua::Error::RuntimeError(format!(
                "command call depth limit of {} exceeded",
                max
            )));
        }
    }

    let mut collector = ReplyCollector::new();
    shared.depth.fetch_add(1, Ordering::Relaxed);
    {
        let mut slot = shared.dispatcher.lock();
        match slot.as_mut() {
            Some(dispatcher) => dispatcher.dispatch(&mut argv, &mut collector),
            None => {
                shared.depth.fetch_sub(1, Ordering::Relaxed);
                return Err(mlua::Error::RuntimeError(
                    "no command dispatcher configured".to_string(),
                ));
            }
        }
    }
    shared.depth.fetch_sub(1, Ordering::Relaxed);

    // A dispatcher that emitted nothing replied with the absent value.
    let reply = collector.take().unwrap_or(ReplyValue::Nil);

    if raise_error {
        if let ReplyValue::Error(text) = &reply {
            return Err(mlua::Error::RuntimeError(text.clone()));
        }
    }
    reply_to_lua(lua, &reply)
}

/// Reads the script-provided argument list into owned byte strings.
///
/// Arguments must be strings or numbers; numbers are passed as their decimal
/// text, matching what the store's parser expects on the wire.
fn collect_args(args: &Variadic<Value<'_>>) -> mlua::Result<Vec<Vec<u8>>> {
    if args.is_empty() {
        return Err(mlua::Error::RuntimeError(
            "wrong number of arguments: expected a command name".to_string(),
        ));
    }

    let mut argv = Vec::with_capacity(args.len());
    for value in args.iter() {
        match value {
            Value::String(s) => argv.push(s.as_bytes().to_vec()),
            Value::Integer(i) => argv.push(i.to_string().into_bytes()),
            Value::Number(n) => argv.push(format!("{}", n).into_bytes()),
            _ => {
                return Err(mlua::Error::RuntimeError(
                    "command arguments must be strings or numbers".to_string(),
                ))
            }
        }
    }
    Ok(argv)
}

/// Materializes a reply as a script value.
///
/// Statuses and errors become `{ok = ..}` / `{err = ..}` tables, arrays
/// become 1-indexed tables, and the absent value surfaces as `false`, all
/// per the store's scripting conventions.
pub(crate) fn reply_to_lua<'lua>(
    lua: &'lua Lua,
    reply: &ReplyValue,
) -> mlua::Result<Value<'lua>> {
    match reply {
        ReplyValue::Nil => Ok(Value::Boolean(false)),
        ReplyValue::Bool(b) => Ok(Value::Boolean(*b)),
        ReplyValue::Int(i) => Ok(Value::Integer(*i)),
        ReplyValue::Double(d) => Ok(Value::Number(*d)),
        ReplyValue::String(s) => Ok(Value::String(lua.create_string(s)?)),
        ReplyValue::Status(s) => {
            let table = lua.create_table()?;
            table.raw_set("ok", s.as_str())?;
            Ok(Value::Table(table))
        }
        ReplyValue::Error(s) => {
            let table = lua.create_table()?;
            table.raw_set("err", s.as_str())?;
            Ok(Value::Table(table))
        }
        ReplyValue::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, reply_to_lua(lua, item)?)?;
            }
            Ok(Value::Table(table))
        }
    }
}

/// Adapts a script value into a reply.
///
/// Tables carrying a string `err` or `ok` field are error and status lines;
/// any other table is read as an array from index 1 up to the first nil.
/// Engine types with no wire form (functions, userdata, threads) adapt to
/// the absent value.
pub(crate) fn lua_value_to_reply(value: &Value<'_>) -> mlua::Result<ReplyValue> {
    match value {
        Value::Nil => Ok(ReplyValue::Nil),
        Value::Boolean(b) => Ok(ReplyValue::Bool(*b)),
        Value::Integer(i) => Ok(ReplyValue::Int(*i)),
        Value::Number(n) => Ok(ReplyValue::Double(*n)),
        Value::String(s) => Ok(ReplyValue::String(Bytes::copy_from_slice(s.as_bytes()))),
        Value::Table(table) => table_to_reply(table),
        _ => Ok(ReplyValue::Nil),
    }
}

fn table_to_reply(table: &Table<'_>) -> mlua::Result<ReplyValue> {
    if let Value::String(err) = table.raw_get::<_, Value<'_>>("err")? {
        return Ok(ReplyValue::Error(err.to_str()?.to_string()));
    }
    if let Value::String(ok) = table.raw_get::<_, Value<'_>>("ok")? {
        return Ok(ReplyValue::Status(ok.to_str()?.to_string()));
    }

    let mut items = Vec::new();
    for i in 1i64.. {
        let item: Value<'_> = table.raw_get(i)?;
        if let Value::Nil = item {
            break;
        }
        items.push(lua_value_to_reply(&item)?);
    }
    Ok(ReplyValue::Array(items))
}
