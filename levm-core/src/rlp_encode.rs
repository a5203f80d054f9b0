//! A minimal RLP encoder, just enough to compute `CREATE`'s address.
//!
//! RLP itself is out of this crate's scope (an external collaborator per the
//! design this crate follows), but no pre-built RLP crate was available to
//! depend on, so this implements only the one encoding `CREATE` needs: a
//! two-element list of `[address, nonce]`.

use crate::addr::Addr;
use crate::w256::W256;

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(0x80u8.saturating_add(bytes.len() as u8));
    out.extend_from_slice(bytes);
    out
}

/// Minimal big-endian representation of an unsigned integer, with no
/// leading zero bytes; zero itself encodes as the empty string (RLP's
/// canonical integer-zero encoding).
fn minimal_be_bytes(value: W256) -> Vec<u8> {
    let full = value.to_big_endian();
    let first_nonzero = full.iter().position(|&b| b != 0);
    match first_nonzero {
        Some(idx) => full[idx..].to_vec(),
        None => Vec::new(),
    }
}

/// `rlp([address, nonce])`, for a payload that always fits the short-list
/// form (`address` is 20 bytes, `nonce` here is at most 32).
pub fn encode_address_and_nonce(address: Addr, nonce: W256) -> Vec<u8> {
    let addr_enc = encode_bytes(address.as_bytes());
    let nonce_enc = encode_bytes(&minimal_be_bytes(nonce));
    let mut payload = Vec::with_capacity(addr_enc.len() + nonce_enc.len());
    payload.extend_from_slice(&addr_enc);
    payload.extend_from_slice(&nonce_enc);
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(0xc0u8.saturating_add(payload.len() as u8));
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_zero_encodes_as_empty_string() {
        assert_eq!(minimal_be_bytes(W256::ZERO), Vec::<u8>::new());
    }

    #[test]
    fn nonce_one_encodes_as_single_nonzero_byte() {
        assert_eq!(minimal_be_bytes(W256::from_u64(1)), vec![1]);
    }
}
