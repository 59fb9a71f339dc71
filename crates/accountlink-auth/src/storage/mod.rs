//! Storage traits the token core needs from its surroundings.
//!
//! - [`PrincipalStore`] - re-fetches the live principal after verification
//! - [`ConsumedTokenLedger`] - records used token ids for single-use tokens
//!
//! The only implementation shipped here is the in-memory ledger; principal
//! persistence belongs to the application.

pub mod ledger;
pub mod memory;
pub mod principal;

pub use ledger::ConsumedTokenLedger;
pub use memory::MemoryTokenLedger;
pub use principal::PrincipalStore;
