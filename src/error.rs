use std::cell::RefCell;
use std::ffi::CString;

/// Errors surfaced by the bridge.
///
/// None of these are fatal to the host engine: a failed binding is disabled,
/// an unavailable context makes the device inert and a failed pose query means
/// "no fresh data this frame".
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Tracking client context unavailable")]
    ContextUnavailable,

    #[error("Failed to resolve interface {0}")]
    Resolution(String),

    #[error("Callback registration failed for {0}")]
    CallbackRegistration(String),

    #[error("Pose query failed for {0}")]
    QueryFailure(String),

    #[error("No fresh tracking data")]
    Untracked,

    #[error("Client pump error: {0}")]
    Pump(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
}

thread_local! {
    static LAST_MESSAGE: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Last-error storage for the C FFI layer.
///
/// Messages are kept per calling thread, so the pointer handed to C stays
/// valid until that same thread makes another failing or resetting call.
pub(crate) struct LastError;

impl LastError {
    pub const fn new() -> Self {
        Self
    }

    pub fn set(&self, err: &BridgeError) {
        let text = err.to_string().replace('\0', "");
        LAST_MESSAGE.with(|msg| *msg.borrow_mut() = CString::new(text).ok());
    }

    pub fn clear(&self) {
        LAST_MESSAGE.with(|msg| *msg.borrow_mut() = None);
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        LAST_MESSAGE.with(|msg| match msg.borrow().as_ref() {
            Some(text) => text.as_ptr(),
            None => std::ptr::null(),
        })
    }
}
