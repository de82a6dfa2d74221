use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::Mutex;
use tandem_model::Usage;

/// The context shared by everything spawned during one run or session.
///
/// It carries an optional user value, which the SDK never touches, and the
/// usage accumulated by every model call. Clones share the same state.
#[derive(Clone, Default)]
pub struct RunContext {
    value: Option<Arc<dyn Any + Send + Sync>>,
    usage: Arc<Mutex<Usage>>,
}

impl RunContext {
    /// Creates a context without a user value.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context carrying the given user value.
    #[inline]
    pub fn with_value<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
            usage: Default::default(),
        }
    }

    /// Returns the user value if it has type `T`.
    ///
    /// Use interior mutability in `T` to mutate it during a run.
    #[inline]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.value.as_deref()?.downcast_ref()
    }

    /// Returns the usage accumulated so far.
    #[inline]
    pub fn usage(&self) -> Usage {
        *self.usage.lock()
    }

    /// Adds the usage of a model call.
    #[inline]
    pub fn add_usage(&self, usage: &Usage) {
        self.usage.lock().add(usage);
    }
}

impl Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("has_value", &self.value.is_some())
            .field("usage", &self.usage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_shared_state() {
        let ctx = RunContext::with_value(AtomicU32::new(1));
        let cloned = ctx.clone();
        cloned.get::<AtomicU32>().unwrap().fetch_add(1, Ordering::Relaxed);
        cloned.add_usage(&Usage {
            requests: 1,
            input_tokens: 3,
            output_tokens: 4,
            total_tokens: 7,
        });

        assert_eq!(ctx.get::<AtomicU32>().unwrap().load(Ordering::Relaxed), 2);
        assert!(ctx.get::<String>().is_none());
        assert_eq!(ctx.usage().total_tokens, 7);
        assert!(RunContext::new().get::<AtomicU32>().is_none());
    }
}
