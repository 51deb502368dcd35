//! # ember-vm
//!
//! An embeddable, account-based bytecode execution engine. A host node wraps
//! its native transaction in the [`transaction::Transaction`] facade, supplies
//! a read-only [`db::Database`] view of world state plus an
//! [`environment::Environment`] (block context and fee schedule), and receives
//! a deterministic [`errors::ExecutionReport`] together with the state delta
//! to merge.
//!
//! ## Core types
//!
//! - [`vm::VM`]: the execution engine: validation, the interpreter loop over
//!   an explicit call-frame stack, call/create dispatch and receipt assembly.
//! - [`call_frame::CallFrame`]: execution context of one call activation.
//! - [`db::JournaledState`]: working state cache with a reversible journal;
//!   every mutation is an entry that a frame revert undoes.
//! - [`precompiles`]: native contracts bound to fixed addresses.
//! - [`fee_schedule::FeeSchedule`]: protocol pricing and limit parameters.
//!
//! Execution is single-threaded and deterministic: identical inputs produce
//! byte-identical reports. The only resource bound is the gas limit.

pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod fee_schedule;
pub mod gas_cost;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod transaction;
pub mod utils;
pub mod vm;

pub use errors::{ExecutionReport, TxResult, VMError};
pub use vm::VM;
