use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Stored value for column '{column}' is not a valid identifier: {value}")]
    InvalidIdentifier { column: &'static str, value: String },
    #[error("Subject identifier could not be created for sector '{sector_id}'")]
    SubjectNotCreated { sector_id: String },
    #[error("Consent session with challenge id '{0}' was not found")]
    ConsentSessionNotFound(Uuid),
    #[error("Consent session with challenge id '{0}' was already responded to")]
    ConsentSessionAlreadyResponded(Uuid),
}

#[derive(Debug, Error)]
pub enum ConsentError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("consent id value was present when it should be absent")]
    ConsentIdPresent,
    #[error("the consent id '{0}' is not a valid challenge identifier")]
    InvalidChallengeId(String),
    #[error("the consent subject is null for consent session with id '{0}' for anonymous user")]
    AnonymousSubject(i32),
    #[error(
        "the consent subject identifier '{consent_subject}' isn't owned by user '{username}' who has a subject identifier of '{subject}' with sector identifier '{sector_identifier}'"
    )]
    SubjectMismatch {
        consent_subject: Uuid,
        subject: Uuid,
        username: String,
        sector_identifier: String,
    },
    #[error("the consent session belongs to client '{consent_client_id}' not '{client_id}'")]
    ClientMismatch {
        consent_client_id: String,
        client_id: String,
    },
}

impl ConsentError {
    /// Whether the failure came from the storage boundary rather than the request itself.
    pub fn is_storage(&self) -> bool {
        matches!(self, ConsentError::Storage(_))
    }
}

/// An OAuth2 authorization error as handed to the error writer.
///
/// The description and hint are fixed strings so nothing internal (subjects,
/// usernames, row ids) can reach the client.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{error}: {description}")]
pub struct AuthorizeError {
    pub error: &'static str,
    pub description: &'static str,
    pub hint: Option<&'static str>,
}

impl AuthorizeError {
    const fn server_error(hint: &'static str) -> Self {
        Self {
            error: "server_error",
            description: "The authorization server encountered an unexpected condition that prevented it from fulfilling the request.",
            hint: Some(hint),
        }
    }

    pub const SUBJECT_COULD_NOT_LOOKUP: Self =
        Self::server_error("Could not lookup user subject.");
    pub const CONSENT_COULD_NOT_GENERATE: Self =
        Self::server_error("Could not generate the consent session.");
    pub const CONSENT_COULD_NOT_SAVE: Self =
        Self::server_error("Could not save the consent session.");
    pub const CONSENT_COULD_NOT_LOOKUP: Self =
        Self::server_error("Could not lookup the consent session.");
    pub const CONSENT_COULD_NOT_PERFORM: Self =
        Self::server_error("Could not perform consent.");

    pub const CONSENT_NOT_PROVIDED: Self = Self {
        error: "access_denied",
        description: "The resource owner or authorization server denied the request.",
        hint: Some("The user did not provide their consent."),
    };
    pub const CONSENT_REJECTED: Self = Self {
        error: "access_denied",
        description: "The resource owner or authorization server denied the request.",
        hint: Some("The user explicitly rejected this consent session."),
    };

    /// Full description including the hint, as written into `error_description`.
    pub fn description_with_hint(&self) -> String {
        match self.hint {
            Some(hint) => format!("{} {}", self.description, hint),
            None => self.description.to_string(),
        }
    }
}
