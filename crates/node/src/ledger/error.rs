use thiserror::Error;
use tonic::Code;

/// Ledger gateway error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No usable connection to the gateway peer
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// The proposal was rejected or the chaincode returned an error
    #[error("Endorsement failed: {0}")]
    EndorsementFailed(String),

    /// Ordering or validation of the transaction failed
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// The operation did not complete within its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The signing identity cannot be used
    #[error("Invalid credentials: {0}")]
    Credentials(String),
}

/// Transaction phase a gRPC failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Evaluate,
    Endorse,
    Submit,
    CommitStatus,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Evaluate => "evaluate",
            Phase::Endorse => "endorse",
            Phase::Submit => "submit",
            Phase::CommitStatus => "commit status",
        }
    }
}

impl LedgerError {
    /// Classify a gRPC status returned by the gateway during `phase`
    pub fn from_status(phase: Phase, status: &tonic::Status) -> Self {
        let msg = format!("{}: {}", phase.as_str(), status.message());
        match status.code() {
            Code::DeadlineExceeded => Self::Timeout(msg),
            Code::Unavailable => Self::ConnectFailed(msg),
            _ => match phase {
                Phase::Evaluate | Phase::Endorse => Self::EndorsementFailed(msg),
                Phase::Submit | Phase::CommitStatus => Self::CommitFailed(msg),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Status;

    use super::*;

    #[test]
    fn test_status_mapping() {
        let deadline = Status::deadline_exceeded("too slow");
        assert_eq!(
            LedgerError::from_status(Phase::Submit, &deadline),
            LedgerError::Timeout("submit: too slow".to_string())
        );

        let unavailable = Status::unavailable("connection refused");
        assert!(matches!(
            LedgerError::from_status(Phase::Evaluate, &unavailable),
            LedgerError::ConnectFailed(_)
        ));

        let aborted = Status::aborted("chaincode response 500, asset1 already exists");
        assert_eq!(
            LedgerError::from_status(Phase::Endorse, &aborted),
            LedgerError::EndorsementFailed(
                "endorse: chaincode response 500, asset1 already exists".to_string()
            )
        );
        assert!(matches!(
            LedgerError::from_status(Phase::CommitStatus, &aborted),
            LedgerError::CommitFailed(_)
        ));
    }
}
