//! Opcode handlers, one module per EVM operation group, mirroring the
//! corpus's split of the dispatch table into domain-sized files rather than
//! one flat match arm per opcode.

pub mod arithmetic;
pub mod bitwise_comparison;
pub mod control_flow;
pub mod environment;
pub mod system;

pub use bitwise_comparison as bitwise;
