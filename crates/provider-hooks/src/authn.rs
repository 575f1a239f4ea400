//! Password + MFA authentication state machine.
//!
//! ```text
//! Unauthenticated ──SessionReused──────────────────────────► Success
//!        │ CredentialsSubmitted
//!        ▼
//! AuthnSubmitted ──Accepted──► Success
//!        │ MfaDemanded      └─Rejected──► Failed
//!        ▼
//!  MfaRequired ──FactorSubmitted──► FactorChallenged ──Accepted──► Success
//!                                     │   ▲          └─Rejected──► Failed
//!                                     └───┘ Waiting
//! ```

use crate::{Factor, ProviderError, ProviderResult};
use broker_http::RestResponse;
use rust_fsm::*;
use tracing::debug;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub authn_machine(Unauthenticated)

    Unauthenticated => {
        SessionReused => Success,
        CredentialsSubmitted => AuthnSubmitted
    },
    AuthnSubmitted => {
        Accepted => Success,
        MfaDemanded => MfaRequired,
        Rejected => Failed
    },
    MfaRequired => {
        FactorSubmitted => FactorChallenged
    },
    FactorChallenged => {
        // Push or frame factor still pending; poll again
        Waiting => FactorChallenged,
        Accepted => Success,
        Rejected => Failed
    },
    Success => {
        Reset => Unauthenticated
    },
    Failed => {
        Reset => Unauthenticated
    }
}

pub use authn_machine::Input as AuthnInput;
pub use authn_machine::State as AuthnState;
pub use authn_machine::StateMachine as AuthnMachine;

/// Tracks where a provider client is in its authentication attempt.
pub struct AuthnTracker {
    provider: String,
    machine: AuthnMachine,
}

impl std::fmt::Debug for AuthnTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthnTracker")
            .field("provider", &self.provider)
            .field("state", self.machine.state())
            .finish()
    }
}

impl AuthnTracker {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            machine: AuthnMachine::new(),
        }
    }

    pub fn state(&self) -> &AuthnState {
        self.machine.state()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.machine.state(), AuthnState::Success)
    }

    /// Apply `input`, failing if the current state does not accept it.
    pub fn transition(&mut self, input: AuthnInput) -> ProviderResult<()> {
        let old_state = self.machine.state().clone();

        self.machine.consume(&input).map_err(|_| {
            ProviderError::InvalidTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input, old_state
            ))
        })?;

        let new_state = self.machine.state();
        if &old_state != new_state {
            debug!(
                provider = %self.provider,
                old_state = ?old_state,
                new_state = ?new_state,
                "Authentication state transition"
            );
        }
        Ok(())
    }

    /// Start over. A finished attempt resets through the machine; an
    /// unfinished one (abandoned MFA prompt) is dropped.
    pub fn reset(&mut self) -> ProviderResult<()> {
        match self.machine.state() {
            AuthnState::Success | AuthnState::Failed => self.transition(AuthnInput::Reset),
            AuthnState::Unauthenticated => Ok(()),
            state => {
                debug!(provider = %self.provider, state = ?state, "Abandoning unfinished authentication");
                self.machine = AuthnMachine::new();
                Ok(())
            }
        }
    }
}

/// Result of submitting primary credentials.
#[derive(Debug)]
pub enum AuthnOutcome {
    /// Authenticated; carries the provider's final response.
    Success(RestResponse),
    /// A second factor is needed. The client that produced this stays usable
    /// and continues with the challenge without resubmitting credentials.
    MfaRequired(MfaChallenge),
}

impl AuthnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Factors offered for a pending authentication, with the provider
/// response the verification step resumes from.
#[derive(Debug, Clone)]
pub struct MfaChallenge {
    pub factors: Vec<Factor>,
    pub response: RestResponse,
}
