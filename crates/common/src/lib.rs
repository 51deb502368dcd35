pub mod constants;
pub mod evm;
pub mod types;
pub mod utils;

pub use ethereum_types::{Address, H160, H256, U256, U512};
