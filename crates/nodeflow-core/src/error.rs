use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeflowError {
    // Engine errors
    #[error("No start node found in the workflow")]
    NoStartNode,

    #[error("Node timed out after {timeout_secs}s")]
    NodeTimeout { node_id: String, timeout_secs: u64 },

    // Executor errors
    #[error("{provider} API key is not configured")]
    MissingCredential { provider: String },

    #[error("{0}")]
    HttpRequest(String),

    #[error("Request failed with status {0}")]
    HttpStatus(u16),

    #[error("{0}")]
    Transform(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NodeflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_result_contract() {
        assert_eq!(
            NodeflowError::NoStartNode.to_string(),
            "No start node found in the workflow"
        );
        assert_eq!(
            NodeflowError::HttpStatus(404).to_string(),
            "Request failed with status 404"
        );
        assert_eq!(
            NodeflowError::MissingCredential {
                provider: "Stripe".into()
            }
            .to_string(),
            "Stripe API key is not configured"
        );
        assert_eq!(
            NodeflowError::NodeTimeout {
                node_id: "n1".into(),
                timeout_secs: 5
            }
            .to_string(),
            "Node timed out after 5s"
        );
    }
}
