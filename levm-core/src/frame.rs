//! Per-frame register set and the saved-state/context pair pushed on every
//! nested `CALL`/`CREATE`/`DELEGATECALL`.

use rustc_hash::FxHashMap;

use crate::addr::Addr;
use crate::contract::Contract;
use crate::memory::Memory;
use crate::w256::W256;

/// The live register set of the currently executing frame.
#[derive(Debug, Clone)]
pub struct FrameState {
    /// The executing account: `SLOAD`/`SSTORE`'s receiver.
    pub contract: Addr,
    /// The account whose code is running. Differs from `contract` only
    /// under `DELEGATECALL`.
    pub code_contract: Addr,
    pub code: Vec<u8>,
    pub pc: usize,
    /// Top of stack at index 0, matching the spec's "top at head" wording,
    /// which keeps push/pop as `Vec::push`/`Vec::pop` if the implementation
    /// stores the stack reversed; here the stack's tail (`Vec::last`) is
    /// the top, since that orientation is the cheaper one for `Vec`.
    pub stack: Vec<W256>,
    pub memory: Memory,
    pub calldata: Vec<u8>,
    pub callvalue: W256,
    pub caller: Addr,
}

pub const MAX_STACK_DEPTH: usize = 1024;

use crate::errors::VMError;

impl FrameState {
    /// `push(x)`: prepends logically, though the backing `Vec` keeps the top
    /// at its tail for O(1) push/pop.
    pub fn push(&mut self, value: W256) {
        self.stack.push(value);
    }

    pub fn pop1(&mut self) -> Result<W256, VMError> {
        self.stack.pop().ok_or(VMError::StackUnderrun)
    }

    pub fn pop2(&mut self) -> Result<(W256, W256), VMError> {
        let a = self.pop1()?;
        let b = self.pop1()?;
        Ok((a, b))
    }

    pub fn pop3(&mut self) -> Result<(W256, W256, W256), VMError> {
        let a = self.pop1()?;
        let b = self.pop1()?;
        let c = self.pop1()?;
        Ok((a, b, c))
    }

    /// Pop `n` values (`n` in `0..=4`), in the order `LOGn`'s topics are
    /// given: `topic_1` popped first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<W256>, VMError> {
        (0..n).map(|_| self.pop1()).collect()
    }

    /// The `n`-th item from the top, 1-indexed, for `DUPn`.
    pub fn peek_from_top(&self, n: usize) -> Result<W256, VMError> {
        let len = self.stack.len();
        if n == 0 || n > len {
            return Err(VMError::StackUnderrun);
        }
        Ok(self.stack[len - n])
    }

    /// Exchange the top with the `(n+1)`-th item, for `SWAPn`.
    pub fn swap_with_top(&mut self, n: usize) -> Result<(), VMError> {
        let len = self.stack.len();
        if n == 0 || n >= len {
            return Err(VMError::StackUnderrun);
        }
        self.stack.swap(len - 1, len - 1 - n);
        Ok(())
    }

    pub fn new(
        contract: Addr,
        code_contract: Addr,
        code: Vec<u8>,
        calldata: Vec<u8>,
        callvalue: W256,
        caller: Addr,
    ) -> Self {
        Self {
            contract,
            code_contract,
            code,
            pc: 0,
            stack: Vec::new(),
            memory: Memory::new(),
            calldata,
            callvalue,
            caller,
        }
    }
}

/// What kind of nested invocation a [`Frame`] was pushed for, and what is
/// needed to unwind it on return, revert, or error.
#[derive(Debug, Clone)]
pub enum FrameContext {
    Creation {
        codehash: W256,
    },
    Call {
        out_offset: usize,
        out_size: usize,
        codehash: W256,
        /// Value copy of `env.contracts` taken at call entry, restored
        /// verbatim on revert or error.
        reversion: FxHashMap<Addr, Contract>,
    },
}

/// A saved caller frame: its register set plus the context describing how
/// to unwind back into it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub context: FrameContext,
    pub saved_state: FrameState,
}
