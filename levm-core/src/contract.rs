//! An account's bytecode, storage, and balances — the unit of state that
//! `env.contracts` maps addresses to.

use rustc_hash::FxHashMap;
use sha3::{Digest, Keccak256};

use crate::opcodes::{Op, mk_code_ops, mk_op_ix_map};
use crate::w256::W256;

#[derive(Debug, Clone, Default)]
pub struct Contract {
    pub bytecode: Vec<u8>,
    /// Zero-valued keys are absent rather than stored as zero, per
    /// `SSTORE`'s delete-on-zero rule.
    pub storage: FxHashMap<W256, W256>,
    pub balance: W256,
    pub nonce: W256,
    pub codehash: W256,
    pub op_ix_map: Vec<usize>,
    pub code_ops: Vec<Op>,
}

impl Contract {
    /// Build a contract record from its bytecode, deriving `codehash`,
    /// `opIxMap`, and `codeOps`. Empty code hashes to zero rather than
    /// `keccak("")`, matching an account with no code at all.
    pub fn new(bytecode: Vec<u8>, balance: W256, nonce: W256) -> Self {
        let codehash = keccak_or_zero(&bytecode);
        let op_ix_map = mk_op_ix_map(&bytecode);
        let code_ops = mk_code_ops(&bytecode);
        Self { bytecode, storage: FxHashMap::default(), balance, nonce, codehash, op_ix_map, code_ops }
    }

    /// An account record for an address that was merely touched (`BALANCE`,
    /// `EXTCODESIZE`, `EXTCODECOPY`, a selfdestruct beneficiary) and has no
    /// prior state: empty code, zero balance/nonce/storage.
    pub fn empty() -> Self {
        Self::new(Vec::new(), W256::ZERO, W256::ZERO)
    }

    pub fn codesize(&self) -> usize {
        self.bytecode.len()
    }

    /// Replace this account's code in place (used by `performCreation`),
    /// preserving its existing storage and balance.
    pub fn install_code(&mut self, bytecode: Vec<u8>) {
        self.codehash = keccak_or_zero(&bytecode);
        self.op_ix_map = mk_op_ix_map(&bytecode);
        self.code_ops = mk_code_ops(&bytecode);
        self.bytecode = bytecode;
    }

    pub fn storage_load(&self, key: W256) -> W256 {
        self.storage.get(&key).copied().unwrap_or(W256::ZERO)
    }

    /// `SSTORE`: a value of zero deletes the key, keeping the "zero keys are
    /// absent" invariant intact.
    pub fn storage_store(&mut self, key: W256, value: W256) {
        if value.is_zero() {
            self.storage.remove(&key);
        } else {
            self.storage.insert(key, value);
        }
    }
}

fn keccak_or_zero(bytecode: &[u8]) -> W256 {
    if bytecode.is_empty() {
        return W256::ZERO;
    }
    let mut hasher = Keccak256::new();
    hasher.update(bytecode);
    W256::from_big_endian(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_hashes_to_zero() {
        let c = Contract::new(Vec::new(), W256::ZERO, W256::ZERO);
        assert_eq!(c.codehash, W256::ZERO);
    }

    #[test]
    fn sstore_zero_removes_key() {
        let mut c = Contract::new(vec![0x00], W256::ZERO, W256::ZERO);
        c.storage_store(W256::from_u64(1), W256::from_u64(0x2a));
        assert_eq!(c.storage_load(W256::from_u64(1)), W256::from_u64(0x2a));
        c.storage_store(W256::from_u64(1), W256::ZERO);
        assert!(!c.storage.contains_key(&W256::from_u64(1)));
    }
}
