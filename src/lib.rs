//! # Scriptbox - Embedded Lua Scripting Core for In-Memory Data Stores
//!
//! Scriptbox is the script-execution core of an in-memory data store: it lets
//! clients submit Lua scripts that run inside the server process, invoke
//! store commands, and return a result serialized in the store's native reply
//! format. Scripts are identified by the SHA-1 of their body, compiled once
//! per session, and cached for cheap re-invocation.
//!
//! ## Architecture
//!
//! The core consists of a few small components:
//!
//! - **ScriptId**: content-addressed identity of a script body (40 hex chars)
//! - **Script cache**: maps identities to compiled units inside one VM
//! - **Command bridge**: `store.call`/`store.pcall` built-ins that execute
//!   store commands on behalf of running scripts
//! - **Reply serializer**: a visitor contract converting any result into a
//!   stream of typed write events for the wire layer
//! - **Session**: owns one VM, its cache, and the reentrancy depth counter
//!
//! The data store itself stays outside: commands are executed through a
//! [`CommandDispatcher`] the embedder installs, and serialized output is
//! written into a [`ReplySink`] the embedder supplies.
//!
//! ## Example Usage
//!
//! ```
//! use scriptbox::{ReplyCollector, ReplySink, ReplyValue, Session};
//!
//! # fn main() -> Result<(), scriptbox::Error> {
//! let mut session = Session::new()?;
//!
//! // Wire scripts to the store's command dispatcher.
//! session.set_dispatcher(|args: &mut [Vec<u8>], sink: &mut dyn ReplySink| {
//!     match args[0].as_slice() {
//!         b"PING" => sink.on_status("PONG"),
//!         _ => sink.on_error("ERR unknown command"),
//!     }
//! });
//!
//! // Register once, run many times by content identity.
//! let (id, result) = session.execute("return store.call('PING')");
//! result?;
//!
//! let mut reply = ReplyCollector::new();
//! session.serialize(&mut reply)?;
//! assert_eq!(reply.take(), Some(ReplyValue::status("PONG")));
//!
//! session.run_function(&id)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod hash;
pub mod reply;
pub mod session;

// Re-exports
pub use bridge::CommandDispatcher;
pub use cache::AddOutcome;
pub use config::Options;
pub use error::{Error, Result};
pub use hash::{ScriptId, SCRIPT_ID_LEN};
pub use reply::{ReplyCollector, ReplySink, ReplyValue};
pub use session::Session;
