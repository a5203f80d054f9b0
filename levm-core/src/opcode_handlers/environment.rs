//! Environmental information (16) and block information (6):
//! ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD, CALLDATASIZE,
//! CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE, EXTCODECOPY,
//! RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH, BLOCKHASH, COINBASE,
//! TIMESTAMP, NUMBER, DIFFICULTY, GASLIMIT.

use crate::addr::{addr_to_w256, w256_to_addr};
use crate::errors::{OpcodeResult, VMError};
use crate::memory::{checked_offset, read_bytes_zero_extended};
use crate::vm::Vm;
use crate::w256::W256;

pub fn op_address(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(addr_to_w256(vm.state.contract));
    Ok(OpcodeResult::Continue)
}

pub fn op_balance(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let addr = w256_to_addr(vm.state.pop1()?);
    let balance = vm.env.touch_account(addr).balance;
    vm.state.push(balance);
    Ok(OpcodeResult::Continue)
}

pub fn op_origin(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(addr_to_w256(vm.env.origin));
    Ok(OpcodeResult::Continue)
}

pub fn op_caller(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(addr_to_w256(vm.state.caller));
    Ok(OpcodeResult::Continue)
}

pub fn op_callvalue(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(vm.state.callvalue);
    Ok(OpcodeResult::Continue)
}

pub fn op_calldataload(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let offset = checked_offset(vm.state.pop1()?)?;
    let word = read_bytes_zero_extended(&vm.state.calldata, offset, 32);
    vm.state.push(W256::from_big_endian(&word));
    Ok(OpcodeResult::Continue)
}

pub fn op_calldatasize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(W256::from_usize(vm.state.calldata.len()));
    Ok(OpcodeResult::Continue)
}

pub fn op_calldatacopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (dst_offset, src_offset, size) = vm.state.pop3()?;
    let dst_offset = checked_offset(dst_offset)?;
    let src_offset = checked_offset(src_offset)?;
    let size = checked_offset(size)?;
    let calldata = vm.state.calldata.clone();
    vm.state.memory.write_range(&calldata, size, src_offset, dst_offset);
    Ok(OpcodeResult::Continue)
}

pub fn op_codesize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(W256::from_usize(vm.state.code.len()));
    Ok(OpcodeResult::Continue)
}

pub fn op_codecopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (mem_offset, code_offset, size) = vm.state.pop3()?;
    let mem_offset = checked_offset(mem_offset)?;
    let code_offset = checked_offset(code_offset)?;
    let size = checked_offset(size)?;
    let code = vm.state.code.clone();
    vm.state.memory.write_range(&code, size, code_offset, mem_offset);
    Ok(OpcodeResult::Continue)
}

/// No transaction gas price is modeled (gas is unmetered in this
/// interpreter); `GASPRICE` pushes zero rather than a fabricated value.
pub fn op_gasprice(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(W256::ZERO);
    Ok(OpcodeResult::Continue)
}

pub fn op_extcodesize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let addr = w256_to_addr(vm.state.pop1()?);
    let size = vm.env.touch_account(addr).codesize();
    vm.state.push(W256::from_usize(size));
    Ok(OpcodeResult::Continue)
}

pub fn op_extcodecopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let args = vm.state.pop_n(4)?;
    let [addr, mem_offset, code_offset, size]: [W256; 4] =
        args.try_into().map_err(|_| VMError::Fatal("pop_n(4) returned wrong length".into()))?;
    let addr = w256_to_addr(addr);
    let mem_offset = checked_offset(mem_offset)?;
    let code_offset = checked_offset(code_offset)?;
    let size = checked_offset(size)?;
    let bytecode = vm.env.touch_account(addr).bytecode.clone();
    vm.state.memory.write_range(&bytecode, size, code_offset, mem_offset);
    Ok(OpcodeResult::Continue)
}

pub fn op_returndatasize(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(W256::from_usize(vm.last_returndata.len()));
    Ok(OpcodeResult::Continue)
}

pub fn op_returndatacopy(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (dst_offset, src_offset, size) = vm.state.pop3()?;
    let dst_offset = checked_offset(dst_offset)?;
    let src_offset = checked_offset(src_offset)?;
    let size = checked_offset(size)?;
    let returndata = vm.last_returndata.clone();
    vm.state.memory.write_range(&returndata, size, src_offset, dst_offset);
    Ok(OpcodeResult::Continue)
}

pub fn op_extcodehash(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let addr = w256_to_addr(vm.state.pop1()?);
    let hash = vm.env.touch_account(addr).codehash;
    vm.state.push(hash);
    Ok(OpcodeResult::Continue)
}

/// Block-hash lookup is out of scope; every `BLOCKHASH` query returns zero.
pub fn op_blockhash(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let _block_number = vm.state.pop1()?;
    vm.state.push(W256::ZERO);
    Ok(OpcodeResult::Continue)
}

pub fn op_coinbase(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(addr_to_w256(vm.block.coinbase));
    Ok(OpcodeResult::Continue)
}

pub fn op_timestamp(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(vm.block.timestamp);
    Ok(OpcodeResult::Continue)
}

pub fn op_number(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(vm.block.number);
    Ok(OpcodeResult::Continue)
}

pub fn op_difficulty(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(vm.block.difficulty);
    Ok(OpcodeResult::Continue)
}

pub fn op_gaslimit(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.state.push(vm.block.gaslimit);
    Ok(OpcodeResult::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr;
    use crate::vm::VMOpts;

    fn vm_with_calldata(calldata: Vec<u8>) -> Vm {
        Vm::new(VMOpts {
            code: Vec::new(),
            calldata,
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
    fn calldataload_zero_extends_past_end() {
        let mut vm = vm_with_calldata(vec![0xaa]);
        vm.state.push(W256::ZERO);
        op_calldataload(&mut vm).expect("stack has one value");
        let mut expected = [0u8; 32];
        expected[0] = 0xaa;
        assert_eq!(vm.state.stack.last().expect("has result").to_big_endian(), expected);
    }

    #[test]
    fn balance_of_untouched_account_is_zero() {
        let mut vm = vm_with_calldata(Vec::new());
        vm.state.push(addr_to_w256(Addr::from_low_u64_be(99)));
        op_balance(&mut vm).expect("stack has one value");
        assert_eq!(*vm.state.stack.last().expect("has result"), W256::ZERO);
        assert!(vm.env.contracts.contains_key(&Addr::from_low_u64_be(99)));
    }

    #[test]
    fn blockhash_is_always_zero() {
        let mut vm = vm_with_calldata(Vec::new());
        vm.state.push(W256::from_u64(1));
        op_blockhash(&mut vm).expect("stack has one value");
        assert_eq!(*vm.state.stack.last().expect("has result"), W256::ZERO);
    }
}
