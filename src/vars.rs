//! Seam toward the external variable-hosting layer.
//!
//! The hosting layer exposes a fixed hierarchy of named values over its own
//! network protocol; this crate only supplies the per-variable read and
//! write callbacks. Each exposed quantity is a [`Variable`]: a synchronous
//! `get()`, and for the single writable quantity (the relay enable flag) a
//! `set()` delegating to the relay controller. Writes never fail at this
//! seam; a rejected or ignored write is visible only through the status
//! variables.

use std::sync::Arc;

use tracing::trace;

/// A scalar value crossing the variable-hosting boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Double-precision float.
    Double(f64),
    /// Text value.
    Text(String),
}

/// One hosted variable: a read callback and an optional write callback.
pub trait Variable: Send + Sync {
    /// Current value of the variable.
    fn get(&self) -> VarValue;

    /// Accept a new value. The default implementation ignores the write;
    /// read-only variables keep it.
    fn set(&self, value: VarValue) {
        let _ = value;
    }
}

/// Read-only variable backed by a closure.
pub struct ReadVar<F>(pub F);

impl<F> Variable for ReadVar<F>
where
    F: Fn() -> VarValue + Send + Sync,
{
    fn get(&self) -> VarValue {
        (self.0)()
    }
}

/// Read-write variable backed by a getter and setter pair.
pub struct ReadWriteVar<G, S> {
    getter: G,
    setter: S,
}

impl<G, S> ReadWriteVar<G, S> {
    /// Build a variable from a getter and a setter.
    pub fn new(getter: G, setter: S) -> Self {
        Self { getter, setter }
    }
}

impl<G, S> Variable for ReadWriteVar<G, S>
where
    G: Fn() -> VarValue + Send + Sync,
    S: Fn(VarValue) + Send + Sync,
{
    fn get(&self) -> VarValue {
        (self.getter)()
    }

    fn set(&self, value: VarValue) {
        (self.setter)(value)
    }
}

/// The fixed variable hierarchy exposed to the hosting layer.
///
/// Dotted names mirror the folder tree of the device's control protocol
/// (`Signals.SP.VA`, `Stream.Transmit`, ...). The tree is built once at
/// startup and is immutable afterwards; only the values behind the
/// callbacks change.
pub struct VariableTree {
    entries: Vec<(String, Arc<dyn Variable>)>,
}

impl VariableTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register a variable under a dotted name.
    pub fn register(&mut self, name: impl Into<String>, var: Arc<dyn Variable>) {
        self.entries.push((name.into(), var));
    }

    /// Read a variable by name.
    pub fn get(&self, name: &str) -> Option<VarValue> {
        self.find(name).map(|var| var.get())
    }

    /// Write a variable by name. Returns whether the name exists; the write
    /// itself always "succeeds" at this level, matching the hosting layer's
    /// protocol contract.
    pub fn set(&self, name: &str, value: VarValue) -> bool {
        match self.find(name) {
            Some(var) => {
                trace!("variable write: {name}");
                var.set(value);
                true
            }
            None => false,
        }
    }

    /// Names of all registered variables, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Variable>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, var)| var)
    }
}

impl Default for VariableTree {
    fn default() -> Self {
        Self::new()
    }
}
