//! Error taxonomy shared by every geobridge crate.

use thiserror::Error;

/// Errors raised at or around the engine boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The engine's error channel reported a non-zero code after a call.
    #[error("engine error {code}: {message}")]
    Boundary { code: i32, message: String },

    /// A fixed-size numeric block passed into a host API has the wrong length.
    #[error("{what} expects {expected} values, got {actual}")]
    Shape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A registry token is unknown or was already released.
    #[error("unknown or already released registry token {0}")]
    Lifecycle(usize),

    /// A host handler failed or panicked inside an engine callback.
    #[error("callback {callback} failed: {reason}")]
    CallbackFault {
        callback: &'static str,
        reason: String,
    },

    #[error("engine returned a null {0} handle")]
    NullHandle(&'static str),

    #[error("engine returned a null {what} buffer of {len} bytes")]
    InvalidBuffer { what: &'static str, len: u32 },

    #[error("unknown {kind} value {value:#x}")]
    UnknownEnum { kind: &'static str, value: u32 },

    #[error("index value {value} does not fit into 16 bits")]
    IndexOverflow { value: u32 },

    /// Frame surface calls issued in the wrong order.
    #[error("{operation} is not allowed while {phase}")]
    OutOfOrder {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("string passed to the engine contains an interior nul byte")]
    InvalidString,
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

impl BridgeError {
    /// Faults abort the current frame; everything else is reported to the
    /// immediate caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::CallbackFault { .. })
    }
}

/// Reject numeric blocks whose length does not match the boundary contract.
pub fn check_shape<T>(what: &'static str, values: &[T], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(BridgeError::Shape {
            what,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Copy a checked slice into a fixed-size array.
pub fn to_array<const N: usize>(what: &'static str, values: &[f64]) -> Result<[f64; N]> {
    check_shape(what, values, N)?;
    let mut out = [0.0; N];
    out.copy_from_slice(values);
    Ok(out)
}

/// Strings cross the boundary as C strings.
pub fn check_c_string(value: &str) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(BridgeError::InvalidString);
    }
    Ok(())
}
