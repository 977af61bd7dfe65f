use super::error::MseError;
use super::policy::CryptoMethod;
use crate::crypto::Role;

/// Steps of the encryption handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    SentPublicKey,
    ReceivedPublicKey,
    SecretComputed,
    /// Initiator: selector hashes written.
    SelectorSent,
    /// Receiver: selector hashes matched to a torrent.
    SelectorMatched,
    PolicySent,
    PolicyReceived,
    Done(CryptoMethod),
}

/// Enforces the strict step order of one handshake attempt.
///
/// The initiator sends its key first and learns the outcome last; the
/// receiver reads first and decides the outcome:
///
/// ```text
/// initiator: Init → SentPublicKey → ReceivedPublicKey → SecretComputed
///            → SelectorSent → PolicySent → PolicyReceived → Done
/// receiver:  Init → ReceivedPublicKey → SentPublicKey → SecretComputed
///            → SelectorMatched → PolicyReceived → PolicySent → Done
/// ```
#[derive(Debug, Clone)]
pub struct HandshakeMachine {
    role: Role,
    state: HandshakeState,
}

impl HandshakeMachine {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: HandshakeState::Init,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Moves to `next`, failing if the role's script does not allow it.
    pub fn advance(&mut self, next: HandshakeState) -> Result<(), MseError> {
        if !permits(self.role, self.state, next) {
            return Err(MseError::InvalidState {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(role = ?self.role, "mse handshake {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }
}

fn permits(role: Role, from: HandshakeState, to: HandshakeState) -> bool {
    use HandshakeState::*;

    match role {
        Role::Initiator => matches!(
            (from, to),
            (Init, SentPublicKey)
                | (SentPublicKey, ReceivedPublicKey)
                | (ReceivedPublicKey, SecretComputed)
                | (SecretComputed, SelectorSent)
                | (SelectorSent, PolicySent)
                | (PolicySent, PolicyReceived)
                | (PolicyReceived, Done(_))
        ),
        Role::Receiver => matches!(
            (from, to),
            (Init, ReceivedPublicKey)
                | (ReceivedPublicKey, SentPublicKey)
                | (SentPublicKey, SecretComputed)
                | (SecretComputed, SelectorMatched)
                | (SelectorMatched, PolicyReceived)
                | (PolicyReceived, PolicySent)
                | (PolicySent, Done(_))
        ),
    }
}
