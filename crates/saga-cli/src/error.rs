use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("scenario error")]
    Flow(#[from] saga_flows::FlowError),

    #[error("decision log error")]
    Report(#[from] saga_core::ReportError),

    #[error("failed to write decision log '{path}'")]
    DecisionLogWrite {
        path: PathBuf,
        #[source]
        source: saga_core::ReportError,
    },

    #[error("failed to encode output")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use saga_flows::FlowError;

    use super::CliError;

    #[test]
    fn flow_error_converts_via_from() {
        let err: CliError = FlowError::Scenario("missing [trade] table".to_string()).into();

        assert!(matches!(err, CliError::Flow(_)));
    }

    #[test]
    fn flow_error_has_source_chain() {
        let err: CliError = FlowError::UnknownSaga {
            name: "margin_call".to_string(),
            available: "trading_execution".to_string(),
        }
        .into();

        let source = std::error::Error::source(&err).expect("source");

        assert!(source.to_string().contains("margin_call"));
    }

    #[test]
    fn report_error_message() {
        let err: CliError = saga_core::ReportError::Unavailable("decision log".to_string()).into();

        assert_eq!(err.to_string(), "decision log error");
    }

    #[test]
    fn decision_log_write_names_path_and_cause() {
        let err = CliError::DecisionLogWrite {
            path: std::path::PathBuf::from("/var/log/decisions.jsonl"),
            source: saga_core::ReportError::Unavailable("disk".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "failed to write decision log '/var/log/decisions.jsonl'"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
