//! System operations: SHA3, the `LOGn` family, CREATE, CALL, DELEGATECALL,
//! RETURN, REVERT, SELFDESTRUCT. `CALLCODE`, `CREATE2`, and `STATICCALL` are
//! decoded (see [`crate::opcodes`]) but have no transition here — dispatch in
//! [`crate::vm`] surfaces `CALLCODE` as a fatal error and the rest as
//! `UnrecognizedOpcode`, matching the corpus's single-fork scope.

use sha3::{Digest, Keccak256};

use crate::addr::{addr_to_w256, w256_to_addr};
use crate::contract::Contract;
use crate::errors::{OpcodeResult, VMError};
use crate::frame::{FrameContext, FrameState};
use crate::memory::checked_offset;
use crate::rlp_encode::encode_address_and_nonce;
use crate::trace::{TraceContextKind, TraceLog};
use crate::vm::{VMResult, Vm};
use crate::w256::W256;

pub fn op_sha3(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (offset, size) = vm.state.pop2()?;
    let offset = checked_offset(offset)?;
    let size = checked_offset(size)?;
    let bytes = vm.state.memory.slice(offset, size);

    let mut hasher = Keccak256::new();
    hasher.update(&bytes);
    let hash = W256::from_big_endian(&hasher.finalize());

    vm.env.sha3_crack.insert(hash, bytes);
    vm.state.push(hash);
    Ok(OpcodeResult::Continue)
}

/// `LOGn`, `n` in `0..=4`. Topics are popped in `topic_1`-first order, after
/// `offset`/`size`. Unlike the design this crate follows — which skips the
/// memory-expansion accounting for `LOG`'s payload — this implementation
/// calls `Memory::slice` (which always updates `memorySize`), per the
/// correctness note recorded in `DESIGN.md`.
pub fn op_log(vm: &mut Vm, n: u8) -> Result<OpcodeResult, VMError> {
    let (offset, size) = vm.state.pop2()?;
    let offset = checked_offset(offset)?;
    let size = checked_offset(size)?;
    let topics = vm.state.pop_n(n as usize)?;
    let data = vm.state.memory.slice(offset, size);

    let log = TraceLog { address: vm.state.contract, data, topics };
    vm.logs.push(log.clone());
    vm.context_trace.insert_log(log);
    Ok(OpcodeResult::Continue)
}

/// `CREATE(value, offset, size)`. Rejects with `BalanceTooLow` when `value`
/// exceeds the creator's balance, before any frame is pushed — the failure
/// is absorbed by the generic unwind just like any other opcode error,
/// unwinding the *calling* frame rather than a (never-pushed) child one.
pub fn op_create(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (value, offset, size) = vm.state.pop3()?;
    let offset = checked_offset(offset)?;
    let size = checked_offset(size)?;
    let init_code = vm.state.memory.slice(offset, size);

    let creator = vm.state.contract;
    let (creator_balance, creator_nonce) = {
        let c = vm.env.contracts.get(&creator).ok_or_else(|| {
            VMError::Fatal("CREATE's own frame has no contract record".into())
        })?;
        (c.balance, c.nonce)
    };
    if value > creator_balance {
        return Err(VMError::BalanceTooLow);
    }

    let new_addr = create_address(creator, creator_nonce);

    if let Some(c) = vm.env.contracts.get_mut(&creator) {
        c.nonce = c.nonce.wrapping_add(W256::from_u64(1));
        c.balance = c.balance.wrapping_sub(value);
    }

    let new_contract = Contract::new(init_code.clone(), value, W256::ZERO);
    let codehash = new_contract.codehash;
    vm.env.contracts.insert(new_addr, new_contract);

    let new_state = FrameState::new(new_addr, new_addr, init_code, Vec::new(), value, creator);
    vm.enter_frame(
        FrameContext::Creation { codehash },
        TraceContextKind::Creation { codehash },
        new_state,
    );
    Ok(OpcodeResult::Continue)
}

/// `newAddr = keccak(rlp([creator, nonce]))[12:]`.
fn create_address(creator: crate::addr::Addr, nonce: W256) -> crate::addr::Addr {
    let rlp = encode_address_and_nonce(creator, nonce);
    let mut hasher = Keccak256::new();
    hasher.update(&rlp);
    let hash = hasher.finalize();
    crate::addr::Addr::from_slice(&hash[12..32])
}

/// `CALL(gas, to, value, inOff, inSize, outOff, outSize)`.
pub fn op_call(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let args = vm.state.pop_n(7)?;
    let [_gas, to, value, in_offset, in_size, out_offset, out_size]: [W256; 7] =
        args.try_into().map_err(|_| VMError::Fatal("pop_n(7) returned wrong length".into()))?;

    let to = w256_to_addr(to);
    let in_offset = checked_offset(in_offset)?;
    let in_size = checked_offset(in_size)?;
    let out_offset = checked_offset(out_offset)?;
    let out_size = checked_offset(out_size)?;

    let caller = vm.state.contract;
    let caller_balance = vm.env.contracts.get(&caller).map(|c| c.balance).unwrap_or(W256::ZERO);
    if value > caller_balance {
        return Err(VMError::BalanceTooLow);
    }
    if !vm.env.contracts.contains_key(&to) {
        return Err(VMError::NoSuchContract(to));
    }

    let reversion = vm.env.contracts.clone();
    if let Some(c) = vm.env.contracts.get_mut(&caller) {
        c.balance = c.balance.wrapping_sub(value);
    }
    if let Some(c) = vm.env.contracts.get_mut(&to) {
        c.balance = c.balance.wrapping_add(value);
    }

    let callee = vm
        .env
        .contracts
        .get(&to)
        .ok_or_else(|| VMError::Fatal("callee vanished after presence check".into()))?;
    let code = callee.bytecode.clone();
    let codehash = callee.codehash;
    let calldata = vm.state.memory.slice(in_offset, in_size);

    let new_state = FrameState::new(to, to, code, calldata, value, caller);
    vm.enter_frame(
        FrameContext::Call { out_offset, out_size, codehash, reversion },
        TraceContextKind::Call { out_offset, out_size, codehash, abi: None },
        new_state,
    );
    Ok(OpcodeResult::Continue)
}

/// `DELEGATECALL(gas, to, inOff, inSize, outOff, outSize)`: as `CALL`, but
/// `contract`, `callvalue`, and `caller` carry over unchanged from the
/// current frame — only `codeContract`/`code` come from `to`, and no value
/// moves.
pub fn op_delegatecall(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let args = vm.state.pop_n(6)?;
    let [_gas, to, in_offset, in_size, out_offset, out_size]: [W256; 6] =
        args.try_into().map_err(|_| VMError::Fatal("pop_n(6) returned wrong length".into()))?;

    let to = w256_to_addr(to);
    let in_offset = checked_offset(in_offset)?;
    let in_size = checked_offset(in_size)?;
    let out_offset = checked_offset(out_offset)?;
    let out_size = checked_offset(out_size)?;

    if !vm.env.contracts.contains_key(&to) {
        return Err(VMError::NoSuchContract(to));
    }
    let reversion = vm.env.contracts.clone();
    let callee = vm
        .env
        .contracts
        .get(&to)
        .ok_or_else(|| VMError::Fatal("callee vanished after presence check".into()))?;
    let code = callee.bytecode.clone();
    let codehash = callee.codehash;
    let calldata = vm.state.memory.slice(in_offset, in_size);

    let new_state = FrameState {
        contract: vm.state.contract,
        code_contract: to,
        code,
        pc: 0,
        stack: Vec::new(),
        memory: crate::memory::Memory::new(),
        calldata,
        callvalue: vm.state.callvalue,
        caller: vm.state.caller,
    };
    vm.enter_frame(
        FrameContext::Call { out_offset, out_size, codehash, reversion },
        TraceContextKind::Call { out_offset, out_size, codehash, abi: None },
        new_state,
    );
    Ok(OpcodeResult::Continue)
}

/// `RETURN(offset, size)`. With a `CreationContext` parent, the returned
/// bytes become the new contract's code; with a `CallContext` parent, they
/// are copied into the caller's memory, truncated to `min(size, outSize)`.
/// With no frames left, they become the VM's terminal success result.
pub fn op_return(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (offset, size) = vm.state.pop2()?;
    let offset = checked_offset(offset)?;
    let size = checked_offset(size)?;
    let bytes = vm.state.memory.slice(offset, size);

    match vm.frames.pop() {
        Some(frame) => {
            vm.context_trace.exit_context();
            match frame.context {
                FrameContext::Creation { .. } => {
                    let new_addr = vm.state.contract;
                    vm.perform_creation(new_addr, bytes);
                    vm.state = frame.saved_state;
                    vm.state.push(addr_to_w256(new_addr));
                    vm.last_returndata.clear();
                }
                FrameContext::Call { out_offset, out_size, .. } => {
                    let copy_len = bytes.len().min(out_size);
                    vm.state = frame.saved_state;
                    if copy_len > 0 {
                        vm.state.memory.write_range(&bytes, copy_len, 0, out_offset);
                    }
                    vm.state.push(W256::from_u64(1));
                    vm.last_returndata = bytes;
                }
            }
        }
        None => {
            vm.result = Some(VMResult::Success { returndata: bytes });
        }
    }
    Ok(OpcodeResult::Halt)
}

/// Return data is dropped on `REVERT` in this design (see `DESIGN.md`); the
/// two stack arguments are still consumed since the frame is about to be
/// discarded regardless.
pub fn op_revert(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let _ = vm.state.pop2()?;
    Err(VMError::Revert)
}

/// Records `self` in `selfdestructs`, transfers its whole balance to
/// `beneficiary` (touching it if it has no prior state), zeroes `self`'s
/// balance, then surfaces `SelfDestruction`. That error is absorbed by the
/// same unwind as any other failure: inside a nested `CALL`, the balance
/// move made here is discarded along with everything else when
/// `env.contracts` is restored from the enclosing `CallContext`'s
/// `reversion` snapshot. Only at the outermost frame does it stick.
pub fn op_selfdestruct(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let beneficiary = w256_to_addr(vm.state.pop1()?);
    let self_addr = vm.state.contract;
    vm.selfdestructs.push(self_addr);

    let balance = vm.env.contracts.get(&self_addr).map(|c| c.balance).unwrap_or(W256::ZERO);
    vm.env.touch_account_mut(beneficiary);
    if let Some(c) = vm.env.contracts.get_mut(&beneficiary) {
        c.balance = c.balance.wrapping_add(balance);
    }
    if let Some(c) = vm.env.contracts.get_mut(&self_addr) {
        c.balance = W256::ZERO;
    }

    Err(VMError::SelfDestruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr;
    use crate::vm::VMOpts;

    fn vm_with_code(code: Vec<u8>) -> Vm {
        Vm::new(VMOpts {
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
        })
    }

    #[test]
    fn sha3_records_preimage() {
        let mut vm = vm_with_code(Vec::new());
        vm.state.memory.write_word(0, {
            let mut w = [0u8; 32];
            w[31] = 0x2a;
            w
        });
        vm.state.push(W256::from_u64(32));
        vm.state.push(W256::ZERO);
        op_sha3(&mut vm).expect("memory prepared above");
        let hash = *vm.state.stack.last().expect("has result");
        assert_eq!(vm.env.sha3_crack.get(&hash).expect("preimage recorded").len(), 32);
    }

    #[test]
    fn create_rejects_insufficient_balance() {
        let mut vm = vm_with_code(Vec::new());
        vm.state.push(W256::ZERO); // size
        vm.state.push(W256::ZERO); // offset
        vm.state.push(W256::from_u64(1)); // value, but contract balance is 0
        let err = op_create(&mut vm).unwrap_err();
        assert_eq!(err, VMError::BalanceTooLow);
    }

    #[test]
    fn call_to_missing_contract_fails() {
        let mut vm = vm_with_code(Vec::new());
        for v in [0u64, 0, 0, 0, 0, 99, 0] {
            vm.state.push(W256::from_u64(v));
        }
        let err = op_call(&mut vm).unwrap_err();
        assert_eq!(err, VMError::NoSuchContract(Addr::from_low_u64_be(99)));
    }

    #[test]
    fn selfdestruct_credits_beneficiary_and_zeroes_self() {
        let mut vm = vm_with_code(Vec::new());
        vm.env.contracts.get_mut(&vm.state.contract).expect("seed contract").balance =
            W256::from_u64(10);
        vm.state.push(addr_to_w256(Addr::from_low_u64_be(7)));
        let err = op_selfdestruct(&mut vm).unwrap_err();
        assert_eq!(err, VMError::SelfDestruction);
        assert_eq!(vm.env.contracts[&vm.state.contract].balance, W256::ZERO);
        assert_eq!(vm.env.contracts[&Addr::from_low_u64_be(7)].balance, W256::from_u64(10));
        assert_eq!(vm.selfdestructs, vec![vm.state.contract]);
    }
}
