//! Comparison and bitwise logic operations (14): LT, GT, SLT, SGT, EQ,
//! ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR.

use crate::errors::{OpcodeResult, VMError};
use crate::vm::Vm;
use crate::w256::W256;

pub fn op_lt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(W256::from_bool(a < b));
    Ok(OpcodeResult::Continue)
}

pub fn op_gt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(W256::from_bool(a > b));
    Ok(OpcodeResult::Continue)
}

pub fn op_slt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(W256::from_bool(signed_lt(a, b)));
    Ok(OpcodeResult::Continue)
}

pub fn op_sgt(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(W256::from_bool(signed_lt(b, a)));
    Ok(OpcodeResult::Continue)
}

pub fn op_eq(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(W256::from_bool(a == b));
    Ok(OpcodeResult::Continue)
}

pub fn op_iszero(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let a = vm.state.pop1()?;
    vm.state.push(W256::from_bool(a.is_zero()));
    Ok(OpcodeResult::Continue)
}

pub fn op_and(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(a.bitand(b));
    Ok(OpcodeResult::Continue)
}

pub fn op_or(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(a.bitor(b));
    Ok(OpcodeResult::Continue)
}

pub fn op_xor(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (a, b) = vm.state.pop2()?;
    vm.state.push(a.bitxor(b));
    Ok(OpcodeResult::Continue)
}

pub fn op_not(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let a = vm.state.pop1()?;
    vm.state.push(a.bitnot());
    Ok(OpcodeResult::Continue)
}

/// `BYTE(n, x)`: the byte of `x` at position `n`, counted from the most
/// significant end. `n >= 32` yields 0.
pub fn op_byte(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (index, value) = vm.state.pop2()?;
    vm.state.push(value.byte(index));
    Ok(OpcodeResult::Continue)
}

pub fn op_shl(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (shift, value) = vm.state.pop2()?;
    vm.state.push(value.shl(shift));
    Ok(OpcodeResult::Continue)
}

pub fn op_shr(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (shift, value) = vm.state.pop2()?;
    vm.state.push(value.shr(shift));
    Ok(OpcodeResult::Continue)
}

pub fn op_sar(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    let (shift, value) = vm.state.pop2()?;
    vm.state.push(value.sar(shift));
    Ok(OpcodeResult::Continue)
}

/// Two's-complement signed less-than: same-sign operands compare as raw
/// unsigned words (the bit pattern preserves order within a sign class); a
/// negative operand is only less than a non-negative one.
fn signed_lt(a: W256, b: W256) -> bool {
    match (a.is_negative(), b.is_negative()) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr;
    use crate::vm::VMOpts;

    fn vm_with_stack(values: &[u64]) -> Vm {
        let mut vm = Vm::new(VMOpts {
            code: Vec::new(),
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
        });
        for &v in values {
            vm.state.push(W256::from_u64(v));
        }
        vm
    }

    #[test]
    fn slt_treats_negative_as_less() {
        let neg_one = W256::ZERO.wrapping_sub(W256::from_u64(1));
        let mut vm = vm_with_stack(&[]);
        vm.state.push(W256::from_u64(1)); // b, pushed first -> popped second
        vm.state.push(neg_one); // a, top
        op_slt(&mut vm).expect("stack has two values");
        assert_eq!(*vm.state.stack.last().expect("has result"), W256::from_u64(1));
    }

    #[test]
    fn byte_out_of_range_is_zero() {
        let mut vm = vm_with_stack(&[0xff, 32]);
        op_byte(&mut vm).expect("stack has two values");
        assert_eq!(*vm.state.stack.last().expect("has result"), W256::ZERO);
    }

    #[test]
    fn shl_by_256_or_more_is_zero() {
        let mut vm = vm_with_stack(&[1, 256]);
        op_shl(&mut vm).expect("stack has two values");
        assert_eq!(*vm.state.stack.last().expect("has result"), W256::ZERO);
    }
}
