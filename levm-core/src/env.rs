//! World state and block context.

use rustc_hash::FxHashMap;

use crate::addr::Addr;
use crate::contract::Contract;
use crate::w256::W256;

/// The self-contained world: every account this VM knows about, plus the
/// Keccak pre-image cache `SHA3` populates.
#[derive(Debug, Clone, Default)]
pub struct Env {
    pub contracts: FxHashMap<Addr, Contract>,
    /// `hash -> pre-image`, populated by `SHA3`. Overwriting with an
    /// identical pre-image is idempotent; a genuine collision (practically
    /// impossible) would overwrite with the newer pre-image.
    pub sha3_crack: FxHashMap<W256, Vec<u8>>,
    pub origin: Addr,
}

impl Env {
    /// `touchAccount`: returns the account at `addr`, inserting an empty
    /// one first if it has no prior state.
    pub fn touch_account(&mut self, addr: Addr) -> &Contract {
        self.contracts.entry(addr).or_insert_with(Contract::empty)
    }

    pub fn touch_account_mut(&mut self, addr: Addr) -> &mut Contract {
        self.contracts.entry(addr).or_insert_with(Contract::empty)
    }
}

/// Block context. Gas limit is carried for completeness but never charged
/// against; block hash lookups are out of scope (`BLOCKHASH` returns zero).
#[derive(Debug, Clone, Copy, Default)]
pub struct Block {
    pub coinbase: Addr,
    pub timestamp: W256,
    pub number: W256,
    pub difficulty: W256,
    pub gaslimit: W256,
}
