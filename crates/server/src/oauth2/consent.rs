//! Authorization consent decision engine.
//!
//! Decides, per authorization request, whether the user must be sent to the
//! login workflow or the consent UI, or whether issuance may proceed with a
//! resolved consent session. The engine keeps no shared mutable state; all
//! reads and writes go through the [`ConsentStore`].

use crate::error::{AuthorizeError, ConsentError};
use crate::oauth2::client::{Client, ConsentMode};
use crate::oauth2::consent_session::ConsentSession;
use crate::oauth2::guard::verify_user_authorized_for_consent;
use crate::oauth2::modes;
use crate::oauth2::redirect::RedirectBuilder;
use crate::oauth2::requester::AuthorizeRequester;
use crate::oauth2::subject::SubjectResolver;
use crate::oauth2::user_session::UserSession;
use crate::storage::ConsentStore;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// Result of a consent decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// Continue to issuance with this session.
    Proceed(ConsentSession),
    /// Send the user agent to `location` (302 Found).
    Redirect {
        location: Url,
        consent: Option<ConsentSession>,
    },
    /// Write this error through the authorization error writer.
    Rejected(AuthorizeError),
}

impl ConsentOutcome {
    /// Whether a response has been decided and the caller must not continue to issuance.
    pub fn handled(&self) -> bool {
        !matches!(self, ConsentOutcome::Proceed(_))
    }

    pub fn consent(&self) -> Option<&ConsentSession> {
        match self {
            ConsentOutcome::Proceed(consent) => Some(consent),
            ConsentOutcome::Redirect { consent, .. } => consent.as_ref(),
            ConsentOutcome::Rejected(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConsentOutcome::Proceed(_) => "proceed",
            ConsentOutcome::Redirect { .. } => "redirect",
            ConsentOutcome::Rejected(_) => "rejected",
        }
    }
}

/// Everything a strategy needs about the request being decided.
pub(crate) struct DecisionContext<'a> {
    pub client: &'a Client,
    pub user: &'a UserSession,
    pub requester: &'a dyn AuthorizeRequester,
    pub subject: Uuid,
    pub consent_id: Option<&'a str>,
}

#[derive(Clone)]
pub struct ConsentEngine {
    store: Arc<dyn ConsentStore>,
    subjects: SubjectResolver,
    redirects: RedirectBuilder,
}

impl ConsentEngine {
    pub fn new(store: Arc<dyn ConsentStore>, redirects: RedirectBuilder) -> Self {
        Self {
            subjects: SubjectResolver::new(store.clone()),
            store,
            redirects,
        }
    }

    pub fn store(&self) -> &dyn ConsentStore {
        self.store.as_ref()
    }

    pub fn subjects(&self) -> &SubjectResolver {
        &self.subjects
    }

    pub fn redirects(&self) -> &RedirectBuilder {
        &self.redirects
    }

    /// Decide how consent is obtained for `requester`.
    ///
    /// `consent_id` is the challenge id the user agent brought back from the
    /// consent UI, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            request_id = %requester.id(),
            client_id = %client.id,
            consent_mode = %client.consent_mode,
        )
    )]
    pub async fn decide(
        &self,
        user: &UserSession,
        client: &Client,
        requester: &dyn AuthorizeRequester,
        consent_id: Option<&str>,
    ) -> ConsentOutcome {
        if user.is_anonymous() {
            let location = self
                .redirects
                .workflow_url(None, Some(requester.request_form()));
            tracing::debug!(%location, "User is not authenticated, redirecting to login");
            return ConsentOutcome::Redirect {
                location,
                consent: None,
            };
        }

        let subject = match self
            .subjects
            .resolve(&client.sector_identifier, &user.username)
            .await
        {
            Ok(subject) => subject,
            Err(e) => {
                tracing::error!(
                    username = %user.username,
                    sector_identifier = %client.sector_identifier,
                    error = %e,
                    "Could not be processed: error occurred retrieving subject identifier"
                );
                return ConsentOutcome::Rejected(AuthorizeError::SUBJECT_COULD_NOT_LOOKUP);
            }
        };

        let ctx = DecisionContext {
            client,
            user,
            requester,
            subject,
            consent_id,
        };

        if !client.is_authentication_level_sufficient(user.authentication_level) {
            return self.generate(&ctx).await;
        }

        match client.consent_mode {
            ConsentMode::Explicit => modes::explicit(self, &ctx).await,
            ConsentMode::Implicit => modes::implicit(self, &ctx).await,
            ConsentMode::PreConfigured => modes::pre_configured(self, &ctx).await,
        }
    }

    /// Create and persist a fresh consent session, then redirect the user to act on it.
    pub(crate) async fn generate(&self, ctx: &DecisionContext<'_>) -> ConsentOutcome {
        tracing::debug!("Proceeding to generate a new consent session");

        if ctx.consent_id.is_some() {
            tracing::error!(
                error = %ConsentError::ConsentIdPresent,
                "Could not be processed: error occurred generating consent"
            );
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_GENERATE);
        }

        let mut consent = ConsentSession::new(Some(ctx.subject), ctx.requester);

        if let Err(e) = self.store.save_consent_session(&mut consent).await {
            tracing::error!(error = %e, "Could not be processed: error occurred saving consent");
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_SAVE);
        }

        self.consent_redirect(ctx, consent)
    }

    /// Redirect to the consent UI, or back to login if the user is (still) under-authenticated.
    fn consent_redirect(&self, ctx: &DecisionContext<'_>, consent: ConsentSession) -> ConsentOutcome {
        let sufficient = ctx
            .client
            .is_authentication_level_sufficient(ctx.user.authentication_level);

        let location = if sufficient {
            self.redirects.consent_url(consent.challenge_id)
        } else {
            self.redirects
                .workflow_url(Some(&consent), Some(ctx.requester.request_form()))
        };

        tracing::debug!(
            authentication_level = %ctx.user.authentication_level,
            policy = %ctx.client.policy,
            sufficient,
            challenge_id = %consent.challenge_id,
            %location,
            "Redirecting for consent"
        );

        ConsentOutcome::Redirect {
            location,
            consent: Some(consent),
        }
    }

    /// Continue a flow the user agent brought back with a consent challenge id.
    ///
    /// A granted session is redeemed at most once and only for the scope set
    /// it was requested with.
    pub(crate) async fn resume(&self, ctx: &DecisionContext<'_>, consent_id: &str) -> ConsentOutcome {
        let challenge_id = match Uuid::parse_str(consent_id) {
            Ok(id) if !id.is_nil() => id,
            _ => {
                tracing::error!(
                    error = %ConsentError::InvalidChallengeId(consent_id.to_string()),
                    "Could not be processed: error occurred parsing the consent id"
                );
                return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_LOOKUP);
            }
        };

        let mut consent = match self
            .store
            .load_consent_session_by_challenge_id(challenge_id)
            .await
        {
            Ok(consent) => consent,
            Err(e) => {
                tracing::error!(
                    %challenge_id,
                    error = %e,
                    "Could not be processed: error occurred while loading session"
                );
                return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_LOOKUP);
            }
        };

        if consent.client_id != ctx.client.id {
            let e = ConsentError::ClientMismatch {
                consent_client_id: consent.client_id.clone(),
                client_id: ctx.client.id.clone(),
            };
            tracing::error!(
                %challenge_id,
                error = %e,
                "Could not be processed: consent session belongs to another client"
            );
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_LOOKUP);
        }

        if let Err(e) = verify_user_authorized_for_consent(
            self.store.as_ref(),
            &self.subjects,
            ctx.client,
            ctx.user,
            &mut consent,
            Some(ctx.subject),
        )
        .await
        {
            tracing::error!(
                %challenge_id,
                error = %e,
                "Could not be processed: user is not authorized to consent for this session"
            );
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_LOOKUP);
        }

        if !consent.responded {
            tracing::error!(%challenge_id, "Could not be processed: the user did not provide their consent");
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_NOT_PROVIDED);
        }

        if !consent.granted {
            tracing::error!(%challenge_id, "Could not be processed: the user explicitly rejected this consent session");
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_REJECTED);
        }

        if !consent.matches_scopes(ctx.requester.requested_scopes()) {
            tracing::error!(
                %challenge_id,
                requested = %ctx.requester.requested_scopes().join(" "),
                consented = %consent.requested_scopes.join(" "),
                "Could not be processed: requested scopes differ from the consent session"
            );
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_PERFORM);
        }

        match self.store.save_consent_session_consumed(&consent).await {
            Ok(true) => consent.consumed = true,
            Ok(false) => {
                tracing::error!(%challenge_id, "Could not be processed: the consent has already been granted");
                return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_PERFORM);
            }
            Err(e) => {
                tracing::error!(%challenge_id, error = %e, "Could not be processed: error occurred redeeming consent");
                return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_SAVE);
            }
        }

        ConsentOutcome::Proceed(consent)
    }
}
