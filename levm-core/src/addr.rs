//! 160-bit account identifier.

use ethereum_types::Address;

use crate::w256::W256;

/// Account identifier. A thin alias over `ethereum_types::Address` rather than
/// a new wrapper type, since the corpus already treats `Address` as the
/// canonical 160-bit identifier and we gain nothing by re-wrapping it.
pub type Addr = Address;

/// An address's numeric value, for `ADDRESS`/`CALLER`/`COINBASE`/... pushing
/// it to the stack as a 256-bit word.
pub fn addr_to_w256(addr: Addr) -> W256 {
    W256::from_big_endian(addr.as_bytes())
}

/// The low 20 bytes of a stack value, for `BALANCE`/`EXTCODESIZE`/`CALL`/...
/// reading an address argument back off the stack.
pub fn w256_to_addr(value: W256) -> Addr {
    let be = value.to_big_endian();
    Addr::from_slice(&be[12..32])
}
