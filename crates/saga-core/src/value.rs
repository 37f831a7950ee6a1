use std::any::Any;

use serde::Serialize;
use serde_json::Value;

/// A type-erased value flowing between saga steps.
///
/// Combines `Any` with cloning and a JSON snapshot, so the executor can keep
/// a copy of every step input for compensation and record every step output
/// in the saga instance log without knowing the concrete types.
pub(crate) trait ErasedValue: Any + Send {
    /// Clone the value into a new boxed trait object.
    fn clone_box(&self) -> Box<dyn ErasedValue>;

    /// Convert into a boxed `Any` for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    /// Serialize the value for the instance log.
    fn snapshot(&self) -> Value;
}

impl<T> ErasedValue for T
where
    T: Clone + Send + Serialize + 'static,
{
    fn clone_box(&self) -> Box<dyn ErasedValue> {
        Box::new(self.clone())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(self)
            .unwrap_or_else(|error| Value::String(format!("<unserializable: {error}>")))
    }
}
