//! Memory, storage, and control-flow operations: MLOAD, MSTORE, MSTORE8,
//! SLOAD, SSTORE, JUMP, JUMPI, PC, MSIZE, GAS, JUMPDEST, and the
//! PUSH/DUP/SWAP families.

use crate::contract::Contract;
use crate::errors::{OpcodeResult, VMError};
use crate::memory::checked_offset;
use crate::vm::Vm;
use crate::w256::W256;

pub fn op_mload(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let offset = checked_offset(vm.state.pop1()?)?;
    let word = vm.state.memory.read_word(offset);
    vm.state.push(W256::from_big_endian(&word));
    Ok(OpcodeResult::Continue)
}

pub fn op_mstore(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (offset, value) = vm.state.pop2()?;
    let offset = checked_offset(offset)?;
    vm.state.memory.write_word(offset, value.to_big_endian());
    Ok(OpcodeResult::Continue)
}

pub fn op_mstore8(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (offset, value) = vm.state.pop2()?;
    let offset = checked_offset(offset)?;
    let low_byte = value.to_big_endian()[31];
    vm.state.memory.write_byte(offset, low_byte);
    Ok(OpcodeResult::Continue)
}

pub fn op_sload(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let key = vm.state.pop1()?;
    let value = vm.env.contracts.get(&vm.state.contract).map(|c| c.storage_load(key)).unwrap_or(W256::ZERO);
    vm.state.push(value);
    Ok(OpcodeResult::Continue)
}

/// `v == 0` deletes the key, preserving the "zero keys are absent" invariant.
pub fn op_sstore(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (key, value) = vm.state.pop2()?;
    let contract_addr = vm.state.contract;
    vm.env.contracts.entry(contract_addr).or_insert_with(Contract::empty).storage_store(key, value);
    Ok(OpcodeResult::Continue)
}

pub fn op_jump(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let dest = vm.state.pop1()?;
    vm.state.pc = check_jump(vm, dest)?;
    Ok(OpcodeResult::Continue)
}

pub fn op_jumpi(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (dest, cond) = vm.state.pop2()?;
    if !cond.is_zero() {
        vm.state.pc = check_jump(vm, dest)?;
    }
    Ok(OpcodeResult::Continue)
}

/// `JUMP`/`JUMPI` share this validation: the target must be in range, land on
/// a `JUMPDEST` byte (`0x5b`), and not fall inside a `PUSHn`'s immediate data
/// (detected via `opIxMap` disagreeing with its predecessor).
fn check_jump(vm: &Vm, dest: W256) -> Result<usize, VMError> {
    let dest = dest.checked_usize().ok_or(VMError::BadJumpDestination)?;
    let code = &vm.state.code;
    if dest >= code.len() || code[dest] != 0x5b {
        return Err(VMError::BadJumpDestination);
    }
    let op_ix_map = &vm
        .code_contract()
        .ok_or_else(|| VMError::Fatal("running code has no matching contract record".into()))?
        .op_ix_map;
    let current = op_ix_map.get(dest).copied();
    let previous = if dest == 0 { None } else { op_ix_map.get(dest - 1).copied() };
    if current.is_some() && current != previous { Ok(dest) } else { Err(VMError::BadJumpDestination) }
}

/// Pushes the pre-advance program counter: `exec1` already advanced `pc` past
/// this opcode before dispatch, so the entry value is passed in explicitly.
pub fn op_pc(vm: &mut Vm, pc_entry: usize) -> Result<OpcodeResult, VMError> {
    vm.state.push(W256::from_usize(pc_entry));
    Ok(OpcodeResult::Continue)
}

pub fn op_msize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(W256::from_usize(vm.state.memory.size_in_bytes()));
    Ok(OpcodeResult::Continue)
}

/// Gas is not metered in this interpreter; `GAS` pushes a fixed large
/// placeholder so bytecode that merely forwards "all remaining gas" to a
/// nested call still sees a plausible value.
const GAS_STUB: u64 = u64::MAX;

pub fn op_gas(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(W256::from_u64(GAS_STUB));
    Ok(OpcodeResult::Continue)
}

/// The immediate was already decoded by `read_op` before dispatch; `PUSH`
/// itself just pushes it (a zero-length `PUSH0` immediate decodes to zero).
pub fn op_push(vm: &mut Vm, _n: u8, push_value: Option<W256>) -> Result<OpcodeResult, VMError> {
    vm.state.push(push_value.unwrap_or(W256::ZERO));
    Ok(OpcodeResult::Continue)
}

/// `DUPn` (1..=16): duplicate the `n`-th item from the top.
pub fn op_dup(vm: &mut Vm, n: u8) -> Result<OpcodeResult, VMError> {
    let value = vm.state.peek_from_top(n as usize)?;
    vm.state.push(value);
    Ok(OpcodeResult::Continue)
}

/// `SWAPn` (1..=16): exchange the top with the `(n+1)`-th item.
pub fn op_swap(vm: &mut Vm, n: u8) -> Result<OpcodeResult, VMError> {
    vm.state.swap_with_top(n as usize)?;
    Ok(OpcodeResult::Continue)
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
    fn checked_jump_rejects_push_immediate_byte() {
        // PUSH1 0x5b; JUMP
        let mut vm = vm_with_code(vec![0x60, 0x5b, 0x56]);
        vm.state.push(W256::from_u64(1));
        let err = check_jump(&vm, W256::from_u64(1)).unwrap_err();
        assert_eq!(err, VMError::BadJumpDestination);
    }

    #[test]
    fn checked_jump_accepts_real_jumpdest() {
        // JUMPDEST at pc 0
        let mut vm = vm_with_code(vec![0x5b]);
        vm.env.contracts.get_mut(&vm.state.contract).expect("seed contract").op_ix_map = vec![0];
        let dest = check_jump(&vm, W256::ZERO).expect("valid jumpdest");
        assert_eq!(dest, 0);
        vm.state.pc = dest;
    }

    #[test]
    fn dup_and_swap_reference_correct_depth() {
        let mut vm = vm_with_code(Vec::new());
        vm.state.push(W256::from_u64(1));
        vm.state.push(W256::from_u64(2));
        vm.state.push(W256::from_u64(3));
        op_dup(&mut vm, 3).expect("stack has 3 items"); // duplicate the bottom one
        assert_eq!(*vm.state.stack.last().expect("has result"), W256::from_u64(1));
        op_swap(&mut vm, 1).expect("stack has >=2 items");
        // top (the just-duplicated 1) swaps with the item below it (3)
        assert_eq!(vm.state.stack[vm.state.stack.len() - 2], W256::from_u64(1));
    }
}
