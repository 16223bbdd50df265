//! Delegator staking reads against the proof-of-stake contract.

mod calldata;
pub use calldata::{
    DELEGATOR_RESULT_LEN, DelegatorRecord, GET_DELEGATOR_SELECTOR, decode_delegator_result,
    encode_delegator_query,
};

use crate::{chain::ChainClient, error::ExporterError};
use alloy::primitives::Address;

/// Reads one delegator's staking record from the contract.
///
/// Carries the process-wide query parameters; the delegator address varies
/// per wallet. Does not retry: the next scheduled cycle is the retry
/// boundary.
#[derive(Debug, Clone, Copy)]
pub struct DelegatorReader {
    /// Staking contract address.
    pub contract: Address,
    /// Validator the delegators are staked with.
    pub validator_id: u64,
}

impl DelegatorReader {
    /// Creates a reader for the given contract and validator.
    pub const fn new(contract: Address, validator_id: u64) -> Self {
        Self { contract, validator_id }
    }

    /// Fetches and decodes the staking record for `delegator`.
    ///
    /// Fails with [`ExporterError::ChainCall`] if the call itself errors and
    /// with [`ExporterError::MalformedResponse`] if the return bytes do not
    /// decode.
    pub async fn fetch<C: ChainClient>(
        &self,
        chain: &C,
        delegator: Address,
    ) -> Result<DelegatorRecord, ExporterError> {
        let calldata = encode_delegator_query(self.validator_id, delegator);
        let raw = chain.call_contract(self.contract, calldata).await?;
        decode_delegator_result(&raw)
    }
}
