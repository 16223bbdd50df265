//! Read-only chain access used by the balance and staking cadences.

use crate::error::ExporterError;
use alloy::{
    primitives::{Address, Bytes, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
};
use std::future::Future;

/// Read-only chain access.
///
/// The seam between the scheduler and the RPC endpoint: production code goes
/// through an alloy provider, tests substitute an in-memory implementation.
pub trait ChainClient: Send + Sync {
    /// Performs a read-only contract call and returns the raw return bytes.
    fn call_contract(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, ExporterError>> + Send;

    /// Returns the native balance of `address` in wei.
    fn native_balance(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<U256, ExporterError>> + Send;
}

/// [`ChainClient`] backed by an alloy provider.
#[derive(Debug, Clone)]
pub struct RpcChainClient<P> {
    /// Chain endpoint.
    provider: P,
}

impl<P> RpcChainClient<P> {
    /// Creates a client around the given provider.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider> ChainClient for RpcChainClient<P> {
    async fn call_contract(&self, to: Address, calldata: Bytes) -> Result<Bytes, ExporterError> {
        let request = TransactionRequest::default().to(to).input(calldata.into());
        Ok(self.provider.call(request).await?)
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ExporterError> {
        Ok(self.provider.get_balance(address).await?)
    }
}
