use bytes::Bytes;
use ember_common::{Address, U256};

/// Facade over the host's native transaction representation. The engine only
/// ever reads these facts; it never learns the concrete type behind them.
///
/// Invariant the host must uphold: `to()` is `None` exactly when the
/// transaction is a contract creation.
pub trait Transaction {
    /// Recipient, or `None` for a contract creation.
    fn to(&self) -> Option<Address>;

    fn sender(&self) -> Address;

    fn nonce(&self) -> u64;

    fn value(&self) -> U256;

    fn data(&self) -> &Bytes;

    /// Deliberately 256-bit: hosts may describe internal calls whose limit
    /// exceeds 64 bits. Validation rejects those before execution.
    fn gas_limit(&self) -> U256;

    fn gas_price(&self) -> U256;

    fn is_create(&self) -> bool {
        self.to().is_none()
    }
}
