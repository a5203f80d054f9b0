//! The `Vm` struct, its construction, the `exec1` step function, and the
//! inspection helpers used by debuggers built on top of this crate.

use rustc_hash::FxHashMap;
use tracing::{debug, error, trace};

use crate::addr::Addr;
use crate::contract::Contract;
use crate::env::{Block, Env};
use crate::errors::{OpcodeResult, VMError};
use crate::frame::{Frame, FrameContext, FrameState};
use crate::opcodes::{Op, Opcode, op_size, read_op};
use crate::trace::{ContextTrace, TraceContextKind, TraceLog};
use crate::w256::W256;

/// Construction-time configuration. A plain struct: there is no
/// keyword/builder surface to maintain since every field is required.
#[derive(Debug, Clone)]
pub struct VMOpts {
    pub code: Vec<u8>,
    pub calldata: Vec<u8>,
    pub value: W256,
    pub address: Addr,
    pub caller: Addr,
    pub origin: Addr,
    pub number: W256,
    pub timestamp: W256,
    pub coinbase: Addr,
    pub difficulty: W256,
    pub gaslimit: W256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VMResult {
    Success { returndata: Vec<u8> },
    Failure { error: VMError },
}

/// The interpreter. One seed contract is loaded at construction; `exec1`
/// advances it by exactly one opcode until `result` becomes `Some`.
#[derive(Debug, Clone)]
pub struct Vm {
    pub result: Option<VMResult>,
    pub state: FrameState,
    pub frames: Vec<Frame>,
    pub env: Env,
    pub block: Block,
    pub selfdestructs: Vec<Addr>,
    pub logs: Vec<TraceLog>,
    pub context_trace: ContextTrace,
    /// The full output of the most recently returned-from call, for
    /// `RETURNDATASIZE`/`RETURNDATACOPY`. Empty at construction and after any
    /// transition that does not itself return data (e.g. a failed `CALL`).
    pub last_returndata: Vec<u8>,
}

impl Vm {
    /// `makeVm`: builds a VM whose env contains exactly one contract, at
    /// `opts.address`, with the given code. The top-level call's value is
    /// credited to that contract's balance up front, since there is no
    /// enclosing `CALL` transition to have transferred it.
    pub fn new(opts: VMOpts) -> Self {
        let mut contracts = FxHashMap::default();
        contracts.insert(opts.address, Contract::new(opts.code.clone(), opts.value, W256::ZERO));

        let env = Env { contracts, sha3_crack: FxHashMap::default(), origin: opts.origin };
        let block = Block {
            coinbase: opts.coinbase,
            timestamp: opts.timestamp,
            number: opts.number,
            difficulty: opts.difficulty,
            gaslimit: opts.gaslimit,
        };
        let state = FrameState::new(
            opts.address,
            opts.address,
            opts.code,
            opts.calldata,
            opts.value,
            opts.caller,
        );

        Self {
            result: None,
            state,
            frames: Vec::new(),
            env,
            block,
            selfdestructs: Vec::new(),
            logs: Vec::new(),
            context_trace: ContextTrace::new(),
            last_returndata: Vec::new(),
        }
    }

    /// The account whose storage the current frame reads and writes.
    pub fn current_contract(&self) -> Option<&Contract> {
        self.env.contracts.get(&self.state.contract)
    }

    /// The account whose code is actually running. Equal to
    /// `current_contract` except under `DELEGATECALL`, where `state.contract`
    /// (storage owner) and `state.code_contract` (code owner) diverge.
    pub fn code_contract(&self) -> Option<&Contract> {
        self.env.contracts.get(&self.state.code_contract)
    }

    /// Decode the operation at the current `pc`, if any remains.
    pub fn vm_op(&self) -> Option<Op> {
        let code = &self.state.code;
        let pc = self.state.pc;
        if pc >= code.len() {
            return None;
        }
        let byte = code[pc];
        let tail = code.get(pc.saturating_add(1)..).unwrap_or(&[]);
        Some(read_op(byte, tail))
    }

    /// The index into `opIxMap`/`codeOps` of the operation at the current
    /// `pc`.
    pub fn vm_op_ix(&self) -> Option<usize> {
        let pc = self.state.pc;
        self.code_contract().and_then(|c| c.op_ix_map.get(pc).copied())
    }

    /// Named parameters for the current op, for a debugger UI. Opcodes with
    /// no entry in the spec's table yield an empty map.
    pub fn op_params(&self) -> FxHashMap<&'static str, W256> {
        let mut out = FxHashMap::default();
        let Some(op) = self.vm_op() else { return out };
        let stack = &self.state.stack;
        let at = |n: usize| -> W256 {
            let len = stack.len();
            if n >= len { W256::ZERO } else { stack[len - 1 - n] }
        };
        match op.opcode {
            Opcode::Create => {
                out.insert("value", at(0));
                out.insert("offset", at(1));
                out.insert("size", at(2));
            }
            Opcode::Call => {
                out.insert("gas", at(0));
                out.insert("to", at(1));
                out.insert("value", at(2));
                out.insert("in-offset", at(3));
                out.insert("in-size", at(4));
                out.insert("out-offset", at(5));
                out.insert("out-size", at(6));
            }
            Opcode::SStore => {
                out.insert("index", at(0));
                out.insert("value", at(1));
            }
            Opcode::CodeCopy => {
                out.insert("mem-offset", at(0));
                out.insert("code-offset", at(1));
                out.insert("code-size", at(2));
            }
            Opcode::Sha3 => {
                out.insert("offset", at(0));
                out.insert("size", at(1));
            }
            Opcode::CallDataCopy => {
                out.insert("to", at(0));
                out.insert("from", at(1));
                out.insert("size", at(2));
            }
            Opcode::ExtCodeCopy => {
                out.insert("account", at(0));
                out.insert("mem-offset", at(1));
                out.insert("code-offset", at(2));
                out.insert("code-size", at(3));
            }
            Opcode::Return => {
                out.insert("offset", at(0));
                out.insert("size", at(1));
            }
            Opcode::JumpI => {
                out.insert("destination", at(0));
                out.insert("condition", at(1));
            }
            _ => {}
        }
        out
    }

    /// Advance the VM by exactly one opcode, or do nothing if `result` is
    /// already set. Fatal errors (a bug in this interpreter, not the
    /// contract under execution) propagate to the caller; every other
    /// opcode-level error is absorbed by the same unwind `REVERT` uses.
    pub fn exec1(&mut self) -> Result<(), VMError> {
        if self.result.is_some() {
            return Ok(());
        }

        if self.state.pc >= self.state.code.len() {
            self.finish_stop();
            return Ok(());
        }

        let pc_entry = self.state.pc;
        let byte = self.state.code[pc_entry];
        let size = op_size(byte);
        self.state.pc = pc_entry.saturating_add(size);
        let tail = self.state.code.get(pc_entry.saturating_add(1)..).unwrap_or(&[]);
        let op = read_op(byte, tail);

        trace!(pc = pc_entry, depth = self.frames.len(), opcode = %op.opcode, "exec1");

        match self.dispatch(op, pc_entry, byte) {
            Ok(_) => Ok(()),
            Err(err) if err.is_fatal() => {
                error!(?err, pc = pc_entry, "fatal internal error");
                Err(err)
            }
            Err(err) => {
                self.unwind_with_failure(err);
                Ok(())
            }
        }
    }

    /// `STOP`, and the implicit `STOP` at end-of-code: pop a frame and
    /// restore it pushing success, or terminate with an empty success
    /// result if this was the outermost frame.
    pub(crate) fn finish_stop(&mut self) {
        match self.frames.pop() {
            Some(frame) => {
                debug!(depth = self.frames.len(), "frame returns via STOP");
                self.context_trace.exit_context();
                self.state = frame.saved_state;
                self.state.push(W256::from_u64(1));
            }
            None => {
                self.result = Some(VMResult::Success { returndata: Vec::new() });
            }
        }
    }

    /// The shared unwind for `REVERT` and any other opcode-level error: pop
    /// a frame, restore or delete per its context, push 0 to the caller.
    /// With no frames left, the error becomes the VM's terminal result.
    pub(crate) fn unwind_with_failure(&mut self, error: VMError) {
        match self.frames.pop() {
            Some(frame) => {
                debug!(depth = self.frames.len(), ?error, "frame unwinds on failure");
                self.context_trace.exit_context();
                match frame.context {
                    FrameContext::Call { reversion, .. } => {
                        self.env.contracts = reversion;
                    }
                    FrameContext::Creation { .. } => {
                        self.env.contracts.remove(&self.state.contract);
                    }
                }
                self.state = frame.saved_state;
                self.state.push(W256::ZERO);
            }
            None => {
                self.result = Some(VMResult::Failure { error });
            }
        }
    }

    /// Push a new frame for a `CALL`/`CREATE`/`DELEGATECALL` transition,
    /// saving the caller's state and descending the context trace.
    pub(crate) fn enter_frame(
        &mut self,
        context: FrameContext,
        trace_kind: TraceContextKind,
        new_state: FrameState,
    ) {
        let saved_state = std::mem::replace(&mut self.state, new_state);
        self.frames.push(Frame { context, saved_state });
        self.context_trace.enter_context(trace_kind);
        self.last_returndata.clear();
    }

    /// `performCreation`: install `code` as `addr`'s bytecode, or delete the
    /// account entirely if `code` is empty, preserving existing storage and
    /// balance either way.
    pub(crate) fn perform_creation(&mut self, addr: Addr, code: Vec<u8>) {
        if code.is_empty() {
            self.env.contracts.remove(&addr);
            return;
        }
        if let Some(contract) = self.env.contracts.get_mut(&addr) {
            contract.install_code(code);
        }
    }

    fn dispatch(&mut self, op: Op, pc_entry: usize, byte: u8) -> Result<OpcodeResult, VMError> {
        use crate::opcode_handlers as h;
        match op.opcode {
            Opcode::Stop => {
                self.finish_stop();
                Ok(OpcodeResult::Halt)
            }
            Opcode::Add => h::arithmetic::op_add(self),
            Opcode::Mul => h::arithmetic::op_mul(self),
            Opcode::Sub => h::arithmetic::op_sub(self),
            Opcode::Div => h::arithmetic::op_div(self),
            Opcode::SDiv => h::arithmetic::op_sdiv(self),
            Opcode::Mod => h::arithmetic::op_mod(self),
            Opcode::SMod => h::arithmetic::op_smod(self),
            Opcode::AddMod => h::arithmetic::op_addmod(self),
            Opcode::MulMod => h::arithmetic::op_mulmod(self),
            Opcode::Exp => h::arithmetic::op_exp(self),
            Opcode::SignExtend => h::arithmetic::op_signextend(self),

            Opcode::Lt => h::bitwise::op_lt(self),
            Opcode::Gt => h::bitwise::op_gt(self),
            Opcode::SLt => h::bitwise::op_slt(self),
            Opcode::SGt => h::bitwise::op_sgt(self),
            Opcode::Eq => h::bitwise::op_eq(self),
            Opcode::IsZero => h::bitwise::op_iszero(self),
            Opcode::And => h::bitwise::op_and(self),
            Opcode::Or => h::bitwise::op_or(self),
            Opcode::Xor => h::bitwise::op_xor(self),
            Opcode::Not => h::bitwise::op_not(self),
            Opcode::Byte => h::bitwise::op_byte(self),
            Opcode::Shl => h::bitwise::op_shl(self),
            Opcode::Shr => h::bitwise::op_shr(self),
            Opcode::Sar => h::bitwise::op_sar(self),

            Opcode::Sha3 => h::system::op_sha3(self),

            Opcode::Address => h::environment::op_address(self),
            Opcode::Balance => h::environment::op_balance(self),
            Opcode::Origin => h::environment::op_origin(self),
            Opcode::Caller => h::environment::op_caller(self),
            Opcode::CallValue => h::environment::op_callvalue(self),
            Opcode::CallDataLoad => h::environment::op_calldataload(self),
            Opcode::CallDataSize => h::environment::op_calldatasize(self),
            Opcode::CallDataCopy => h::environment::op_calldatacopy(self),
            Opcode::CodeSize => h::environment::op_codesize(self),
            Opcode::CodeCopy => h::environment::op_codecopy(self),
            Opcode::GasPrice => h::environment::op_gasprice(self),
            Opcode::ExtCodeSize => h::environment::op_extcodesize(self),
            Opcode::ExtCodeCopy => h::environment::op_extcodecopy(self),
            Opcode::ReturnDataSize => h::environment::op_returndatasize(self),
            Opcode::ReturnDataCopy => h::environment::op_returndatacopy(self),
            Opcode::ExtCodeHash => h::environment::op_extcodehash(self),

            Opcode::BlockHash => h::environment::op_blockhash(self),
            Opcode::Coinbase => h::environment::op_coinbase(self),
            Opcode::Timestamp => h::environment::op_timestamp(self),
            Opcode::Number => h::environment::op_number(self),
            Opcode::Difficulty => h::environment::op_difficulty(self),
            Opcode::GasLimit => h::environment::op_gaslimit(self),

            Opcode::Pop => {
                self.state.pop1()?;
                Ok(OpcodeResult::Continue)
            }
            Opcode::MLoad => h::control_flow::op_mload(self),
            Opcode::MStore => h::control_flow::op_mstore(self),
            Opcode::MStore8 => h::control_flow::op_mstore8(self),
            Opcode::SLoad => h::control_flow::op_sload(self),
            Opcode::SStore => h::control_flow::op_sstore(self),
            Opcode::Jump => h::control_flow::op_jump(self),
            Opcode::JumpI => h::control_flow::op_jumpi(self),
            Opcode::Pc => h::control_flow::op_pc(self, pc_entry),
            Opcode::MSize => h::control_flow::op_msize(self),
            Opcode::Gas => h::control_flow::op_gas(self),
            Opcode::JumpDest => Ok(OpcodeResult::Continue),

            Opcode::Push(n) => h::control_flow::op_push(self, n, op.push_value),
            Opcode::Dup(n) => h::control_flow::op_dup(self, n),
            Opcode::Swap(n) => h::control_flow::op_swap(self, n),
            Opcode::Log(n) => h::system::op_log(self, n),

            Opcode::Create => h::system::op_create(self),
            Opcode::Call => h::system::op_call(self),
            Opcode::CallCode => Err(VMError::Fatal(
                "CALLCODE is decoded but not an implemented transition".into(),
            )),
            Opcode::Return => h::system::op_return(self),
            Opcode::DelegateCall => h::system::op_delegatecall(self),
            Opcode::Revert => h::system::op_revert(self),
            Opcode::Invalid => Err(VMError::UnrecognizedOpcode(0xfe)),
            Opcode::SelfDestruct => h::system::op_selfdestruct(self),

            Opcode::Create2
            | Opcode::StaticCall
            | Opcode::ChainId
            | Opcode::SelfBalance
            | Opcode::BaseFee
            | Opcode::Unknown(_) => Err(VMError::UnrecognizedOpcode(byte)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts_with_code(code: Vec<u8>) -> VMOpts {
        VMOpts {
            code,
            calldata: Vec::new(),
            value: W256::ZERO,
            address: Addr::from_low_u64_be(1),
            caller: Addr::from_low_u64_be(2),
            origin: Addr::from_low_u64_be(2),
            number: W256::ZERO,
            timestamp: W256::ZERO,
            coinbase: Addr::zero(),
            difficulty: W256::ZERO,
            gaslimit: W256::ZERO,
        }
    }

    #[test]
    fn arithmetic_scenario_adds_to_eight() {
        // PUSH1 5; PUSH1 3; ADD; STOP
        let code = hex::decode("6005600301").expect("valid hex");
        let mut vm = Vm::new(opts_with_code(code));
        for _ in 0..3 {
            vm.exec1().expect("recoverable only");
        }
        assert_eq!(*vm.state.stack.last().expect("stack has a value"), W256::from_u64(8));
        vm.exec1().expect("recoverable only");
        assert_eq!(vm.result, Some(VMResult::Success { returndata: Vec::new() }));
    }

    #[test]
    fn division_by_zero_pushes_zero() {
        // PUSH1 0; PUSH1 5; DIV
        let code = hex::decode("6000600504").expect("valid hex");
        let mut vm = Vm::new(opts_with_code(code));
        for _ in 0..3 {
            vm.exec1().expect("recoverable only");
        }
        assert_eq!(*vm.state.stack.last().expect("stack has a value"), W256::ZERO);
    }

    #[test]
    fn bad_jump_target_fails() {
        // PUSH1 0; JUMP
        let code = hex::decode("600056").expect("valid hex");
        let mut vm = Vm::new(opts_with_code(code));
        vm.exec1().expect("recoverable only");
        vm.exec1().expect("recoverable only");
        assert_eq!(vm.result, Some(VMResult::Failure { error: VMError::BadJumpDestination }));
    }

    #[test]
    fn jump_into_push_immediate_data_fails() {
        // PUSH1 0x5b; JUMP
        let code = hex::decode("605b56").expect("valid hex");
        let mut vm = Vm::new(opts_with_code(code));
        vm.exec1().expect("recoverable only");
        vm.exec1().expect("recoverable only");
        assert_eq!(vm.result, Some(VMResult::Failure { error: VMError::BadJumpDestination }));
    }

    #[test]
    fn sstore_sload_round_trip_and_zero_delete() {
        // PUSH1 0x2a; PUSH1 1; SSTORE; PUSH1 1; SLOAD
        let code = hex::decode("602a600155600154").expect("valid hex");
        let mut vm = Vm::new(opts_with_code(code));
        for _ in 0..5 {
            vm.exec1().expect("recoverable only");
        }
        assert_eq!(*vm.state.stack.last().expect("stack has a value"), W256::from_u64(0x2a));
        assert!(vm.current_contract().expect("seed contract exists").storage.contains_key(&W256::from_u64(1)));

        // PUSH1 0; PUSH1 1; SSTORE
        let code2 = hex::decode("6000600155").expect("valid hex");
        let mut vm2 = Vm::new(opts_with_code(code2));
        for _ in 0..3 {
            vm2.exec1().expect("recoverable only");
        }
        assert!(!vm2.current_contract().expect("seed contract exists").storage.contains_key(&W256::from_u64(1)));
    }
}
