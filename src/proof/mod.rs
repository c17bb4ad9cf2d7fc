//! Fairness Proofs
//!
//! Everything a third party needs to check a game after the fact:
//! - Seed commitments over `(seed, player, boardSize)`
//! - A replayable journal of accepted transitions
//! - Decryption of stored ciphertexts into a verification report
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  commitment.rs   - keccak256 commit-reveal over ABI words   │
//! │  journal.rs      - Bincode transition log and replay        │
//! │  verify.rs       - Oracle decryption and audit reports      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod journal;
pub mod verify;

// Re-export key types
pub use commitment::{commit, verify_hex, CommitmentPreimage};
pub use journal::{replay, JournalEntry, JournalError, LedgerJournal, ReplayError, Transition};
pub use verify::{
    audit_commitment, CommitmentAudit, Verdict, VerificationFailure, VerificationPipeline,
    VerificationReport, VerificationTarget,
};
