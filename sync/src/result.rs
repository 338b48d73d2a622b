//! Results handed back to the caller of a synchronization attempt.

use std::fmt;

use nis_ledger::ValidationResult;
use nis_types::ChainScore;

use crate::comparison::ComparisonResult;

/// How an interaction with a peer went, for the caller's peer bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeInteractionResult {
    Success,
    Neutral,
    Failure,
}

impl NodeInteractionResult {
    pub fn from_comparison(result: ComparisonResult) -> Self {
        match result {
            ComparisonResult::RemoteIsNotSynced { .. } => Self::Success,
            ComparisonResult::RemoteIsSynced
            | ComparisonResult::RemoteReportedEqualChainScore
            | ComparisonResult::RemoteReportedLowerChainScore
            | ComparisonResult::RemoteForkNotBetter => Self::Neutral,
            ComparisonResult::RemoteHasNoBlocks
            | ComparisonResult::RemoteIsTooFarBehind
            | ComparisonResult::RemoteHasNonVerifiableBlock
            | ComparisonResult::RemoteReturnedTooManyHashes
            | ComparisonResult::RemoteReturnedInvalidHashes
            | ComparisonResult::RemoteLiedAboutChainScore => Self::Failure,
        }
    }

    pub fn from_validation(result: ValidationResult) -> Self {
        match result {
            ValidationResult::Success => Self::Success,
            ValidationResult::Neutral => Self::Neutral,
            _ => Self::Failure,
        }
    }
}

impl fmt::Display for NodeInteractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Neutral => f.write_str("neutral"),
            Self::Failure => f.write_str("failure"),
        }
    }
}

/// What one reorganization attempt concluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub validation_result: ValidationResult,
    /// Score of the local blocks the attempt rolled back.
    pub our_score: ChainScore,
    /// Score of the peer's blocks, zero unless they validated.
    pub peer_score: ChainScore,
}

impl UpdateOutcome {
    pub fn new(validation_result: ValidationResult, our_score: ChainScore, peer_score: ChainScore) -> Self {
        Self {
            validation_result,
            our_score,
            peer_score,
        }
    }

    /// The peer's chain validated but does not outscore what it would replace.
    pub fn is_score_inferior(&self) -> bool {
        self.validation_result == ValidationResult::Neutral
            && !self.peer_score.is_zero()
            && self.peer_score <= self.our_score
    }
}
