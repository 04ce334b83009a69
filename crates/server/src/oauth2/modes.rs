//! Per consent-mode decision strategies.
//!
//! Each function is reached only once the user is known to meet the client's
//! authentication policy.

use crate::error::AuthorizeError;
use crate::oauth2::consent::{ConsentEngine, ConsentOutcome, DecisionContext};
use crate::oauth2::consent_session::{ConsentSession, consent_signature};

/// The user always acts on the consent screen.
pub(crate) async fn explicit(engine: &ConsentEngine, ctx: &DecisionContext<'_>) -> ConsentOutcome {
    match ctx.consent_id {
        Some(consent_id) => engine.resume(ctx, consent_id).await,
        None => engine.generate(ctx).await,
    }
}

/// Everything requested is granted without user interaction.
pub(crate) async fn implicit(engine: &ConsentEngine, ctx: &DecisionContext<'_>) -> ConsentOutcome {
    if let Some(consent_id) = ctx.consent_id {
        return engine.resume(ctx, consent_id).await;
    }

    let mut consent = ConsentSession::new(Some(ctx.subject), ctx.requester);
    consent.grant();
    // redeemed by this request
    consent.consumed = true;

    if let Err(e) = engine.store().save_consent_session(&mut consent).await {
        tracing::error!(error = %e, "Could not be processed: error occurred saving implicit consent");
        return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_SAVE);
    }

    tracing::debug!(challenge_id = %consent.challenge_id, "Implicitly granted consent");

    ConsentOutcome::Proceed(consent)
}

/// Reuse a remembered decision when one matches, otherwise behave like [`explicit`].
pub(crate) async fn pre_configured(
    engine: &ConsentEngine,
    ctx: &DecisionContext<'_>,
) -> ConsentOutcome {
    if let Some(consent_id) = ctx.consent_id {
        return engine.resume(ctx, consent_id).await;
    }

    let scopes = ctx.requester.requested_scopes();
    let signature = consent_signature(&ctx.client.id, ctx.subject, scopes);

    tracing::debug!(
        subject = %ctx.subject,
        scopes = %scopes.join(" "),
        "Attempting to discover pre-configured consent"
    );

    let mut found = match engine
        .store()
        .load_pre_configured_consent_sessions(&signature)
        .await
    {
        Ok(found) => found,
        Err(e) => {
            tracing::error!(error = %e, "Had error looking up pre-configured consent sessions");
            return ConsentOutcome::Rejected(AuthorizeError::CONSENT_COULD_NOT_PERFORM);
        }
    };

    if found.is_empty() {
        tracing::debug!(subject = %ctx.subject, "No pre-configured consent matched");
        return engine.generate(ctx).await;
    }

    if found.len() > 1 {
        tracing::warn!(
            matches = found.len(),
            signature = %signature,
            "Multiple pre-configured consent sessions share a signature, using the most recent"
        );
    }

    // newest first
    let mut consent = found.swap_remove(0);
    consent.attach_audience(ctx.requester.requested_audience());

    tracing::debug!(
        challenge_id = %consent.challenge_id,
        "Successfully looked up and validated pre-configured consent"
    );

    ConsentOutcome::Proceed(consent)
}
