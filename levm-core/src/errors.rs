//! The error taxonomy for a single step.
//!
//! Every opcode handler returns `Result<OpcodeResult, VMError>`. A `VMError`
//! is not propagated out of [`crate::vm::Vm::exec1`] as a Rust-level `Err`
//! unless it is [`VMError::Fatal`]: the recoverable variants are caught by
//! the step loop and folded into the same unwind `REVERT` uses (pop a frame,
//! restore or delete, push 0) — see [`crate::vm::Vm::unwind_with_failure`].

use crate::addr::Addr;
use thiserror::Error;

/// What an opcode handler hands back when it does not halt the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue,
    Halt,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    #[error("balance too low for transfer")]
    BalanceTooLow,

    #[error("unrecognized opcode 0x{0:02x}")]
    UnrecognizedOpcode(u8),

    #[error("contract self-destructed")]
    SelfDestruction,

    #[error("stack underflow")]
    StackUnderrun,

    #[error("bad jump destination")]
    BadJumpDestination,

    #[error("execution reverted")]
    Revert,

    #[error("no contract at {0:?}")]
    NoSuchContract(Addr),

    /// An internal invariant was violated (a missing context-trace parent on
    /// return, `CALLCODE` dispatch, an opcode-table slot with no handler for
    /// a byte `readOp` considers decodable). These are bugs, not contract
    /// behavior, and are never absorbed by the revert-style unwind: they
    /// propagate out of `exec1` as a genuine `Err`.
    #[error("internal invariant violated: {0}")]
    Fatal(String),
}

impl VMError {
    /// Fatal errors indicate a bug in this interpreter, not in the contract
    /// under execution, and must never be caught by the per-frame unwind.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VMError::Fatal(_))
    }
}
