//! Ownership check between a consent session and the current user.

use crate::error::ConsentError;
use crate::oauth2::client::Client;
use crate::oauth2::consent_session::ConsentSession;
use crate::oauth2::subject::SubjectResolver;
use crate::oauth2::user_session::UserSession;
use crate::storage::ConsentStore;
use uuid::Uuid;

/// Ensure `consent` belongs to `user` for the sector of `client`.
///
/// An unbound session is bound to the user's subject exactly once; a bound
/// session must match it. `subject` may be passed when already resolved; a
/// nil or absent value triggers resolution. Returns the user's subject.
pub async fn verify_user_authorized_for_consent(
    store: &dyn ConsentStore,
    subjects: &SubjectResolver,
    client: &Client,
    user: &UserSession,
    consent: &mut ConsentSession,
    subject: Option<Uuid>,
) -> Result<Uuid, ConsentError> {
    let subject = match subject.filter(|s| !s.is_nil()) {
        Some(subject) => subject,
        None if user.is_anonymous() => return Err(ConsentError::AnonymousSubject(consent.id)),
        None => {
            subjects
                .resolve(&client.sector_identifier, &user.username)
                .await?
        }
    };

    if consent.subject.is_none() {
        consent.subject = Some(subject);
        consent.subject = store.save_consent_session_subject(consent).await?;
    }

    match consent.subject {
        Some(bound) if bound == subject => Ok(subject),
        bound => Err(ConsentError::SubjectMismatch {
            consent_subject: bound.unwrap_or_else(Uuid::nil),
            subject,
            username: user.username.clone(),
            sector_identifier: client.sector_identifier.clone(),
        }),
    }
}
