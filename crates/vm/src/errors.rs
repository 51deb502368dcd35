use bytes::Bytes;
use ember_common::Address;
use ember_common::types::{AccountUpdate, Log};
use thiserror::Error;

/// Umbrella error for everything that can interrupt execution. Only
/// [`VMError::Internal`] and [`VMError::Database`] are defects that abort the
/// whole transaction; the rest are ordinary frame outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    #[error("Transaction validation error: {0}")]
    TxValidation(#[from] TxValidationError),
    #[error("Exceptional halt: {0}")]
    ExceptionalHalt(#[from] ExceptionalHalt),
    /// The REVERT opcode: a controlled abort that keeps unspent gas.
    #[error("Revert opcode")]
    RevertOpcode,
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
    #[error("{0}")]
    Database(#[from] DatabaseError),
}

impl VMError {
    /// True for errors that must propagate out of the execution loop without
    /// committing anything: invariant violations and state-view failures.
    pub fn should_propagate(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::Database(_))
    }
}

/// Rejection of a transaction before any state is touched. Rejected
/// transactions are never charged and produce no receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxValidationError {
    #[error("Transaction nonce {tx_nonce} does not match sender nonce {sender_nonce}")]
    NonceMismatch { sender_nonce: u64, tx_nonce: u64 },
    #[error("Sender nonce is at its maximum value")]
    NonceIsMax,
    #[error("Gas limit is lower than the transaction's intrinsic gas")]
    IntrinsicGasTooLow,
    #[error("Insufficient account funds for value plus upfront gas cost")]
    InsufficientAccountFunds,
    #[error("Gas limit * gas price overflows")]
    GasLimitPriceProductOverflow,
    #[error("Gas limit exceeds the block gas limit")]
    GasAllowanceExceeded,
    #[error("Gas limit does not fit in 64 bits")]
    GasLimitTooHigh,
    #[error("Creation init code exceeds the maximum size")]
    InitcodeSizeExceeded,
}

/// Unrecoverable failure of one call frame. The frame forfeits its remaining
/// gas; the parent frame observes an ordinary failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExceptionalHalt {
    #[error("Out of gas")]
    OutOfGas,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Jump to an invalid destination")]
    InvalidJump,
    #[error("Invalid opcode")]
    InvalidOpcode,
    #[error("Opcode not allowed in static context")]
    OpcodeNotAllowedInStaticContext,
    #[error("Call depth limit exceeded")]
    CallDepthExceeded,
    #[error("Insufficient balance for an inner value transfer")]
    OutOfFunds,
    #[error("Offset out of bounds")]
    OutOfBounds,
    #[error("Unexpectedly large number")]
    VeryLargeNumber,
    #[error("Deployed contract code exceeds the maximum size")]
    ContractOutputTooBig,
    #[error("Deployed contract code starts with the reserved prefix")]
    InvalidContractPrefix,
    #[error("Address already occupied by a contract")]
    AddressCollision,
}

/// Defects: conditions the engine considers impossible under its own
/// invariants. Never used for flow control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Arithmetic underflow")]
    Underflow,
    #[error("Type conversion error")]
    TypeConversion,
    #[error("Tried to slice out of bounds")]
    Slicing,
    #[error("Call frame stack unexpectedly empty")]
    EmptyCallFrameStack,
    #[error("{0}")]
    Custom(&'static str),
}

/// Failure reported by the host's world-state view. Treated as fatal: the
/// view is expected to be consistent for the duration of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Database access error: {0}")]
pub struct DatabaseError(pub String);

/// What the interpreter loop should do after executing one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue { pc_increment: usize },
    Halt,
}

/// Receipt-level outcome of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    /// Controlled abort: state discarded, unspent gas refunded.
    Revert,
    /// Exceptional halt of the outermost frame: the whole gas limit is
    /// forfeited.
    Halt(ExceptionalHalt),
}

/// Outcome of one finished call frame, handed back to the parent frame (or
/// turned into the receipt when the outermost frame finishes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_remaining: u64,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}

/// The receipt: everything the host needs to record the execution and merge
/// its effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// Present only for a successful creation transaction.
    pub created_address: Option<Address>,
    /// State delta for the host to merge. After a revert or an exceptional
    /// halt it carries only the gas accounting and the sender's nonce bump.
    pub state_updates: Vec<AccountUpdate>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}
