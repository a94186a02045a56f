//! Reply values and the write-event contract they serialize through.
//!
//! Everything a script produces, and everything a store command replies with,
//! is expressible as a [`ReplyValue`]. A value becomes bytes on the wire by
//! being walked once through a [`ReplySink`], an ordered stream of typed
//! write events. The same nine event kinds are used in both directions: the
//! session serializes script results out through a sink, and the command
//! bridge reassembles dispatcher replies from a sink back into values.

use bytes::Bytes;

/// Visitor contract for serializing one top-level reply value.
///
/// The caller guarantees a well-formed stream: `on_array_start`/`on_array_end`
/// nest and balance, and the length declared by `on_array_start` equals the
/// number of top-level events emitted before the matching `on_array_end`.
/// Implementations own how events become bytes; an implementation that cannot
/// proceed must treat the whole pass as failed, there is no partial resume.
pub trait ReplySink {
    /// A boolean value.
    fn on_bool(&mut self, b: bool);

    /// A binary-safe bulk string.
    fn on_string(&mut self, s: &[u8]);

    /// A double-precision number.
    fn on_double(&mut self, d: f64);

    /// A signed 64-bit integer.
    fn on_int(&mut self, i: i64);

    /// Start of an array with a known element count.
    fn on_array_start(&mut self, len: usize);

    /// End of the most recently started array.
    fn on_array_end(&mut self);

    /// The absent value.
    fn on_nil(&mut self);

    /// A simple status line.
    fn on_status(&mut self, s: &str);

    /// An error line.
    fn on_error(&mut self, s: &str);
}

/// A store reply or script result, as a tagged value tree.
///
/// This is the one conversion point shared by the result serializer, the
/// command bridge, and the script-value adapter; no component carries its own
/// type-matching logic.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyValue {
    /// The absent value.
    Nil,
    /// A boolean.
    Bool(bool),
    /// A signed 64-bit integer.
    Int(i64),
    /// A double-precision number.
    Double(f64),
    /// A binary-safe bulk string.
    String(Bytes),
    /// A simple status line, e.g. `OK`.
    Status(String),
    /// An error line, e.g. `ERR unknown command`.
    Error(String),
    /// An ordered array of nested values.
    Array(Vec<ReplyValue>),
}

impl ReplyValue {
    /// Creates a bulk string value.
    pub fn string(s: impl Into<Bytes>) -> Self {
        ReplyValue::String(s.into())
    }

    /// Creates a status-line value.
    pub fn status(s: impl Into<String>) -> Self {
        ReplyValue::Status(s.into())
    }

    /// Creates an error-line value.
    pub fn error(s: impl Into<String>) -> Self {
        ReplyValue::Error(s.into())
    }

    /// Walks the value once, emitting a well-formed event stream into `sink`.
    ///
    /// Array lengths are known up front, so `on_array_start` always carries
    /// the exact element count.
    pub fn emit(&self, sink: &mut dyn ReplySink) {
        match self {
            ReplyValue::Nil => sink.on_nil(),
            ReplyValue::Bool(b) => sink.on_bool(*b),
            ReplyValue::Int(i) => sink.on_int(*i),
            ReplyValue::Double(d) => sink.on_double(*d),
            ReplyValue::String(s) => sink.on_string(s),
            ReplyValue::Status(s) => sink.on_status(s),
            ReplyValue::Error(s) => sink.on_error(s),
            ReplyValue::Array(items) => {
                sink.on_array_start(items.len());
                for item in items {
                    item.emit(sink);
                }
                sink.on_array_end();
            }
        }
    }
}

/// A [`ReplySink`] that reassembles an event stream into a [`ReplyValue`].
///
/// This is the deserialization direction of the contract: the command bridge
/// hands a collector to the dispatcher, then converts the collected tree into
/// script-visible values. Also convenient in tests for asserting on replies
/// structurally.
///
/// # Example
///
/// ```
/// use scriptbox::{ReplyCollector, ReplySink, ReplyValue};
///
/// let mut collector = ReplyCollector::new();
/// collector.on_array_start(2);
/// collector.on_int(1);
/// collector.on_status("OK");
/// collector.on_array_end();
///
/// let value = collector.take().unwrap();
/// assert_eq!(
///     value,
///     ReplyValue::Array(vec![ReplyValue::Int(1), ReplyValue::status("OK")])
/// );
/// ```
#[derive(Debug, Default)]
pub struct ReplyCollector {
    root: Option<ReplyValue>,
    open: Vec<Vec<ReplyValue>>,
}

impl ReplyCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the collected top-level value, leaving the collector empty.
    ///
    /// Returns `None` if no event stream was collected, or if the stream is
    /// still inside an unbalanced array.
    pub fn take(&mut self) -> Option<ReplyValue> {
        self.open.clear();
        self.root.take()
    }

    fn push(&mut self, value: ReplyValue) {
        match self.open.last_mut() {
            Some(frame) => frame.push(value),
            None => self.root = Some(value),
        }
    }
}

impl ReplySink for ReplyCollector {
    fn on_bool(&mut self, b: bool) {
        self.push(ReplyValue::Bool(b));
    }

    fn on_string(&mut self, s: &[u8]) {
        self.push(ReplyValue::String(Bytes::copy_from_slice(s)));
    }

    fn on_double(&mut self, d: f64) {
        self.push(ReplyValue::Double(d));
    }

    fn on_int(&mut self, i: i64) {
        self.push(ReplyValue::Int(i));
    }

    fn on_array_start(&mut self, len: usize) {
        self.open.push(Vec::with_capacity(len));
    }

    fn on_array_end(&mut self) {
        if let Some(frame) = self.open.pop() {
            self.push(ReplyValue::Array(frame));
        }
    }

    fn on_nil(&mut self) {
        self.push(ReplyValue::Nil);
    }

    fn on_status(&mut self, s: &str) {
        self.push(ReplyValue::Status(s.to_string()));
    }

    fn on_error(&mut self, s: &str) {
        self.push(ReplyValue::Error(s.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records events as strings, for asserting on ordering and nesting.
    #[derive(Default)]
    struct EventLog {
        events: Vec<String>,
    }

    impl ReplySink for EventLog {
        fn on_bool(&mut self, b: bool) {
            self.events.push(format!("bool:{}", b));
        }
        fn on_string(&mut self, s: &[u8]) {
            self.events.push(format!("string:{}", String::from_utf8_lossy(s)));
        }
        fn on_double(&mut self, d: f64) {
            self.events.push(format!("double:{}", d));
        }
        fn on_int(&mut self, i: i64) {
            self.events.push(format!("int:{}", i));
        }
        fn on_array_start(&mut self, len: usize) {
            self.events.push(format!("array:{}", len));
        }
        fn on_array_end(&mut self) {
            self.events.push("end".to_string());
        }
        fn on_nil(&mut self) {
            self.events.push("nil".to_string());
        }
        fn on_status(&mut self, s: &str) {
            self.events.push(format!("status:{}", s));
        }
        fn on_error(&mut self, s: &str) {
            self.events.push(format!("error:{}", s));
        }
    }

    #[test]
    fn test_emit_scalars() {
        let mut log = EventLog::default();
        ReplyValue::Int(42).emit(&mut log);
        ReplyValue::Nil.emit(&mut log);
        ReplyValue::status("OK").emit(&mut log);
        assert_eq!(log.events, vec!["int:42", "nil", "status:OK"]);
    }

    #[test]
    fn test_emit_nested_array_declares_lengths() {
        let value = ReplyValue::Array(vec![
            ReplyValue::Int(1),
            ReplyValue::Array(vec![ReplyValue::string("a"), ReplyValue::Nil]),
            ReplyValue::error("ERR oops"),
        ]);

        let mut log = EventLog::default();
        value.emit(&mut log);

        assert_eq!(
            log.events,
            vec![
                "array:3",
                "int:1",
                "array:2",
                "string:a",
                "nil",
                "end",
                "error:ERR oops",
                "end",
            ]
        );
    }

    #[test]
    fn test_collector_roundtrip() {
        let value = ReplyValue::Array(vec![
            ReplyValue::Bool(true),
            ReplyValue::Double(0.5),
            ReplyValue::Array(vec![ReplyValue::string("nested")]),
        ]);

        let mut collector = ReplyCollector::new();
        value.emit(&mut collector);
        assert_eq!(collector.take(), Some(value));
    }

    #[test]
    fn test_collector_take_is_draining() {
        let mut collector = ReplyCollector::new();
        ReplyValue::Int(7).emit(&mut collector);
        assert_eq!(collector.take(), Some(ReplyValue::Int(7)));
        assert_eq!(collector.take(), None);
    }

    #[test]
    fn test_collector_unbalanced_stream_yields_nothing() {
        let mut collector = ReplyCollector::new();
        collector.on_array_start(2);
        collector.on_int(1);
        // Missing on_array_end.
        assert_eq!(collector.take(), None);
    }
}
