//! Calldata construction and return decoding for the staking contract's
//! delegator getter.
//!
//! Pure byte-level codec with no I/O. The selector is fixed by the deployed
//! contract and is not derivable from a Solidity signature, so it is carried
//! as a constant rather than computed.

use crate::error::{ExporterError, MalformedResponse};
use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::SolValue,
};

/// Function selector of the staking contract's delegator getter.
pub const GET_DELEGATOR_SELECTOR: [u8; 4] = [0x57, 0x3c, 0x1c, 0xe0];

/// Encoded width of the return tuple: five `uint256` and two `uint64` words,
/// 32 bytes each.
pub const DELEGATOR_RESULT_LEN: usize = 7 * 32;

/// One delegator's staking position as returned by the contract.
///
/// The contract returns a seven-field tuple; the remaining two `uint256` and
/// two `uint64` fields are decoded for shape validation and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegatorRecord {
    /// Active stake in wei.
    pub stake: U256,
    /// Stake currently unlocking, in wei.
    pub unlocking: U256,
    /// Lifetime accumulated rewards in wei.
    pub total_rewards: U256,
}

/// Builds the calldata for a delegator query: the fixed 4-byte selector
/// followed by the ABI encoding of `(uint64 validatorId, address delegator)`.
pub fn encode_delegator_query(validator_id: u64, delegator: Address) -> Bytes {
    let args = (validator_id, delegator).abi_encode_params();
    let mut calldata = Vec::with_capacity(GET_DELEGATOR_SELECTOR.len() + args.len());
    calldata.extend_from_slice(&GET_DELEGATOR_SELECTOR);
    calldata.extend_from_slice(&args);
    calldata.into()
}

/// Decodes raw return bytes against the fixed delegator tuple schema.
///
/// All-or-nothing: any length or shape mismatch yields
/// [`MalformedResponse`] and no partial record.
pub fn decode_delegator_result(data: &[u8]) -> Result<DelegatorRecord, ExporterError> {
    if data.len() != DELEGATOR_RESULT_LEN {
        return Err(MalformedResponse::Length {
            expected: DELEGATOR_RESULT_LEN,
            actual: data.len(),
        }
        .into());
    }

    let (stake, unlocking, total_rewards, _, _, _, _) =
        <(U256, U256, U256, U256, U256, u64, u64)>::abi_decode_params(data)
            .map_err(MalformedResponse::Abi)?;

    Ok(DelegatorRecord { stake, unlocking, total_rewards })
}
