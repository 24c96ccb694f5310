use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("{0}")]
    UnsupportedExpression(String),

    #[error(
        "Entity with id '{id}' and name '{name}' was not found for type '{kind}'. Available: [{available}]"
    )]
    EntityNotFound {
        kind: String,
        id: String,
        name: String,
        available: String,
    },

    #[error("Could not find custom field with name '{name}' on the JIRA server.{}", scope_hint(.project))]
    CustomFieldNotFound {
        name: String,
        project: Option<String>,
    },

    #[error("Found {count} entries of type '{kind}' named '{name}', expected exactly one.")]
    AmbiguousEntity {
        kind: String,
        name: String,
        count: usize,
    },

    #[error("Local evaluation failed: {0}")]
    LocalEvaluation(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

fn scope_hint(project: &Option<String>) -> String {
    match project {
        Some(key) => format!(
            " The field was only searched for in the project with key '{}'. Make sure the custom field is available in the issue create screen for that project.",
            key
        ),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
