//! Hierarchy rule payloads.
//!
//! A stored rule payload is either:
//!
//! - a single cleartext decision byte, or
//! - a CBOR [`Envelope`] sealed for the user the rule names. The first byte of
//!   its opened plaintext is the decision byte.
//!
//! Group rules are always cleartext. User rules are sealed when the caller
//! supplies the user's public key.

use bytes::Bytes;

use strongroom_core::{Actor, Decision, NodeId};

use crate::crypto::{ActorCredential, ActorPublicKey};
use crate::envelope::{derivation_context, Envelope};
use crate::error::{PermsError, Result};

const RULE_LABEL: &[u8] = b"strongroom hierarchy rule";

fn rule_context(node_id: &NodeId, actor: &Actor) -> Vec<u8> {
    derivation_context(
        RULE_LABEL,
        &[
            node_id.as_bytes(),
            actor.kind().code().as_bytes(),
            actor.id().as_bytes(),
        ],
    )
}

fn decode_byte(byte: u8) -> Result<Option<Decision>> {
    Decision::from_byte(byte).map_err(|e| PermsError::Encoding(e.to_string()))
}

/// Encode a rule for storage.
///
/// `sealed_for` is only honoured for user rules.
pub fn encode_rule(
    node_id: &NodeId,
    actor: &Actor,
    decision: Decision,
    sealed_for: Option<&ActorPublicKey>,
) -> Result<Bytes> {
    let byte = decision.to_byte();
    match (actor, sealed_for) {
        (Actor::User(_), Some(recipient)) => {
            let envelope = Envelope::seal(&[byte], recipient, &rule_context(node_id, actor))?;
            Ok(Bytes::from(envelope.to_bytes()?))
        }
        _ => Ok(Bytes::copy_from_slice(&[byte])),
    }
}

/// Decode a stored rule payload.
///
/// `Ok(None)` means the rule holds no opinion. A sealed payload needs the
/// credential of the actor it names.
pub fn decode_rule(
    node_id: &NodeId,
    actor: &Actor,
    payload: &[u8],
    credential: Option<&ActorCredential>,
) -> Result<Option<Decision>> {
    match payload {
        [] => Err(PermsError::Encoding(format!(
            "empty rule payload for {} on {}",
            actor, node_id
        ))),
        [byte] => decode_byte(*byte),
        sealed => {
            let envelope = Envelope::from_bytes(sealed)?;
            let credential = credential.ok_or_else(|| {
                PermsError::Decryption(format!("sealed rule for {} needs a credential", actor))
            })?;
            let opened = envelope.open(credential, &rule_context(node_id, actor))?;
            match opened.first() {
                Some(byte) => decode_byte(*byte),
                None => Err(PermsError::Encoding("sealed rule opened to nothing".into())),
            }
        }
    }
}
