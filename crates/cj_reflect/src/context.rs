use alloc::string::String;
use alloc::sync::Arc;
use core::any::Any;
use core::error::Error;
use core::fmt;

use crate::Value;

// -----------------------------------------------------------------------------
// StreamingContext

/// Why a (de)serialization is happening.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextState {
    CrossProcess,
    CrossMachine,
    File,
    Persistence,
    Remoting,
    Clone,
    #[default]
    All,
}

/// Caller supplied context handed to every callback.
#[derive(Clone, Default)]
pub struct StreamingContext {
    pub state: ContextState,
    pub context: Option<Arc<dyn Any + Send + Sync>>,
}

impl StreamingContext {
    #[inline]
    pub fn new(state: ContextState) -> Self {
        Self {
            state,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Any + Send + Sync) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    /// Returns the additional context if it has type `T`.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.context.as_deref().and_then(|c| c.downcast_ref::<T>())
    }
}

impl fmt::Debug for StreamingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingContext")
            .field("state", &self.state)
            .field("context", &self.context.is_some())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ErrorContext

/// Describes an error raised while a member, item or entry was processed.
///
/// Setting `handled` from an error callback or handler makes the engine skip
/// the offending element and continue.
#[derive(Clone)]
pub struct ErrorContext {
    /// The object, list or dictionary being processed when the error occurred.
    pub original_object: Option<Value>,
    /// The property name, index or key being processed.
    pub member: Option<Value>,
    /// The document path of the error.
    pub path: String,
    pub error: Arc<dyn Error + Send + Sync>,
    pub handled: bool,
    /// Set once the error has been reported to callbacks of an outer object.
    pub traced: bool,
}

impl ErrorContext {
    pub fn new(
        original_object: Option<Value>,
        member: Option<Value>,
        path: String,
        error: Arc<dyn Error + Send + Sync>,
    ) -> Self {
        Self {
            original_object,
            member,
            path,
            error,
            handled: false,
            traced: false,
        }
    }
}

impl fmt::Debug for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorContext")
            .field("member", &self.member)
            .field("path", &self.path)
            .field("error", &format_args!("{}", self.error))
            .field("handled", &self.handled)
            .finish()
    }
}
