//! A stepwise interpreter for EVM bytecode, built for symbolic debugging and
//! test execution rather than production consensus.
//!
//! The entry points are [`vm::Vm::new`] to construct a machine from
//! [`vm::VMOpts`] and [`vm::Vm::exec1`] to advance it by one opcode. Callers
//! loop `exec1` until [`vm::Vm::result`] is `Some`.
//!
//! ```text
//! Vm
//! ├── FrameState        (pc, stack, memory, calldata, callvalue, caller, ...)
//! ├── Vec<Frame>         (saved caller states, one per nested CALL/CREATE)
//! ├── Env                (world state: address -> Contract, sha3 pre-images)
//! ├── Block
//! └── ContextTrace        (ordered tree of logs and call/create entries)
//! ```
//!
//! Gas is not metered, block hashes are zero, and `CALLCODE` is a fatal
//! internal error rather than a recoverable opcode failure; this crate
//! targets debugging and test execution, not consensus.

pub mod addr;
pub mod contract;
pub mod env;
pub mod errors;
pub mod frame;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod rlp_encode;
pub mod trace;
pub mod vm;
pub mod w256;

pub use addr::Addr;
pub use contract::Contract;
pub use env::{Block, Env};
pub use errors::VMError;
pub use frame::{Frame, FrameContext, FrameState};
pub use opcodes::Opcode;
pub use trace::TraceLog as Log;
pub use vm::{VMOpts, VMResult, Vm};
pub use w256::W256;
