use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

/// Data record produced during the execution of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}
