#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid user input: {0}")]
    UserInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Rule matcher error: {source}")]
    RuleMatch {
        #[from]
        source: console_rules::MatchError,
    },

    #[error("Directory resolver error: {source}")]
    Directory {
        #[from]
        source: console_directory::DirectoryError,
    },
}
