//! The access-gate chain: ordered preconditions checked before a protected
//! page handler runs. The first unmet gate decides the redirect.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::{
    baas::Backend,
    profile::{self, Profile, ProfileError},
    session::{self, ID_TOKEN},
    AppResult, AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Authenticated,
    EmailVerified,
    ContractSigned,
}

impl Gate {
    pub fn recovery_page(self) -> &'static str {
        match self {
            Gate::Authenticated => "/login",
            Gate::EmailVerified => "/email-verification",
            Gate::ContractSigned => "/contract",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GateChain(&'static [Gate]);

impl GateChain {
    /// Everything past registration.
    pub const MEMBER: GateChain =
        GateChain(&[Gate::Authenticated, Gate::EmailVerified, Gate::ContractSigned]);
    /// The contract page itself.
    pub const VERIFIED: GateChain = GateChain(&[Gate::Authenticated, Gate::EmailVerified]);
    /// The verification page.
    pub const SIGNED_IN: GateChain = GateChain(&[Gate::Authenticated]);

    fn requires(&self, gate: Gate) -> bool {
        self.0.contains(&gate)
    }
}

/// The signed-in caller, resolved once per request and handed to the page
/// handler through request extensions.
#[derive(Debug, Clone)]
pub struct Caller {
    pub token: String,
    pub profile: Profile,
}

#[derive(Debug)]
pub enum GateOutcome {
    Proceed(Caller),
    Redirect(Gate),
    /// The identity behind the session is gone or unusable.
    Logout(&'static str),
}

pub const LOOKUP_FAILED: &str =
    "An unexpected error has occurred. Please log back in and try again.";
pub const PROFILE_MISSING: &str =
    "We could not find a tutor or student profile for your account. Please contact the team.";

impl GateChain {
    pub async fn evaluate(&self, backend: &Backend, token: Option<String>) -> GateOutcome {
        let Some(token) = token else {
            return GateOutcome::Redirect(Gate::Authenticated);
        };

        let account = match backend.identity.lookup(&token).await {
            Ok(account) => account,
            Err(err) => {
                tracing::warn!(error = %err, "session token no longer resolves");
                return GateOutcome::Logout(LOOKUP_FAILED);
            }
        };

        if self.requires(Gate::EmailVerified) && !account.email_verified {
            return GateOutcome::Redirect(Gate::EmailVerified);
        }

        let profile = match profile::resolve_account(backend, &token, &account).await {
            Ok(profile) => profile,
            Err(ProfileError::NotFound(name)) => {
                tracing::warn!(%name, "signed-in account has no profile");
                return GateOutcome::Logout(PROFILE_MISSING);
            }
            Err(err) => {
                tracing::warn!(error = %err, "profile lookup failed");
                return GateOutcome::Logout(LOOKUP_FAILED);
            }
        };

        if self.requires(Gate::ContractSigned) && !profile.contract_signed {
            return GateOutcome::Redirect(Gate::ContractSigned);
        }

        GateOutcome::Proceed(Caller { token, profile })
    }
}

#[derive(Clone)]
pub struct Guard {
    backend: Backend,
    chain: GateChain,
}

impl Guard {
    pub fn new(state: &AppState, chain: GateChain) -> Guard {
        Guard { backend: state.backend.clone(), chain }
    }
}

pub async fn guard(
    State(Guard { backend, chain }): State<Guard>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    match run(&backend, chain, &session).await {
        Ok(GateOutcome::Proceed(caller)) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Ok(GateOutcome::Redirect(gate)) => Redirect::to(gate.recovery_page()).into_response(),
        Ok(GateOutcome::Logout(message)) => {
            if let Err(err) = logout(&session, message).await {
                return err.into_response();
            }
            Redirect::to(Gate::Authenticated.recovery_page()).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn run(backend: &Backend, chain: GateChain, session: &Session) -> AppResult<GateOutcome> {
    let token = session.get::<String>(ID_TOKEN).await?;
    Ok(chain.evaluate(backend, token).await)
}

async fn logout(session: &Session, message: &str) -> AppResult<()> {
    session.clear().await;
    session::flash(session, message).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baas::{memory::MemoryBackend, IdentityProvider};
    use serde_json::json;

    async fn member(mem: &MemoryBackend, verified: bool, signed: bool) -> String {
        let creds = mem.identity.sign_up("jane@example.com", "password123").await.unwrap();
        mem.identity.set_display_name(&creds.id_token, "Jane Doe").await.unwrap();
        if verified {
            mem.identity.verify_email("jane@example.com").await;
        }
        mem.records
            .write("users/tutors/Jane Doe", json!({ "contractSigned": signed }))
            .await;
        creds.id_token
    }

    #[tokio::test]
    async fn no_token_goes_to_login_for_every_chain() {
        let mem = MemoryBackend::default();
        for chain in [GateChain::MEMBER, GateChain::VERIFIED, GateChain::SIGNED_IN] {
            let outcome = chain.evaluate(&mem.backend(), None).await;
            assert!(matches!(outcome, GateOutcome::Redirect(Gate::Authenticated)));
        }
    }

    #[tokio::test]
    async fn unverified_email_is_checked_before_contract() {
        let mem = MemoryBackend::default();
        let token = member(&mem, false, false).await;
        let outcome = GateChain::MEMBER.evaluate(&mem.backend(), Some(token)).await;
        assert!(matches!(outcome, GateOutcome::Redirect(Gate::EmailVerified)));
    }

    #[tokio::test]
    async fn verification_page_admits_unverified_accounts() {
        let mem = MemoryBackend::default();
        let token = member(&mem, false, false).await;
        let outcome = GateChain::SIGNED_IN.evaluate(&mem.backend(), Some(token)).await;
        assert!(matches!(outcome, GateOutcome::Proceed(_)));
    }

    #[tokio::test]
    async fn unsigned_contract_redirects_members_only() {
        let mem = MemoryBackend::default();
        let token = member(&mem, true, false).await;
        let outcome = GateChain::MEMBER.evaluate(&mem.backend(), Some(token.clone())).await;
        assert!(matches!(outcome, GateOutcome::Redirect(Gate::ContractSigned)));

        let outcome = GateChain::VERIFIED.evaluate(&mem.backend(), Some(token)).await;
        assert!(matches!(outcome, GateOutcome::Proceed(_)));
    }

    #[tokio::test]
    async fn stale_token_logs_out() {
        let mem = MemoryBackend::default();
        let outcome = GateChain::SIGNED_IN
            .evaluate(&mem.backend(), Some("token-gone".to_owned()))
            .await;
        assert!(matches!(outcome, GateOutcome::Logout(LOOKUP_FAILED)));
    }

    #[tokio::test]
    async fn missing_profile_logs_out_with_its_own_message() {
        let mem = MemoryBackend::default();
        let creds = mem.identity.sign_up("ghost@example.com", "password123").await.unwrap();
        mem.identity.set_display_name(&creds.id_token, "Ghost").await.unwrap();
        mem.identity.verify_email("ghost@example.com").await;

        let outcome = GateChain::MEMBER.evaluate(&mem.backend(), Some(creds.id_token)).await;
        assert!(matches!(outcome, GateOutcome::Logout(PROFILE_MISSING)));
    }

    #[tokio::test]
    async fn signed_member_proceeds_with_profile() {
        let mem = MemoryBackend::default();
        let token = member(&mem, true, true).await;
        let GateOutcome::Proceed(caller) = GateChain::MEMBER.evaluate(&mem.backend(), Some(token)).await else {
            panic!("expected to proceed");
        };
        assert_eq!(caller.profile.name, "Jane Doe");
    }
}
