mod account;
mod account_update;
mod log;

pub use account::{Account, AccountInfo};
pub use account_update::AccountUpdate;
pub use log::Log;
