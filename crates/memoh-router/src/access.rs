//! `AccessMode` resolution ("Observed access"): decides whether a platform
//! `UserId` may read a conversation, and with what visibility.

use memoh_core::types::{AccessMode, ConversationId, UserId};
use memoh_db::PgPool;

use crate::error::Result;

/// Raised when a caller who only qualifies for `ChannelIdentityObserved`
/// asks for participant-only data (e.g. the participant roster itself).
#[derive(Debug, thiserror::Error)]
#[error("user is not a participant in this conversation")]
pub struct NotParticipant;

/// Resolves `user_id`'s access to `conversation_id`: `Participant` if any of
/// the user's linked channel identities is a participant row, else
/// `ChannelIdentityObserved` if any of them has ever sent a message into the
/// conversation, else `None` (no visibility at all).
pub async fn resolve(
    pool: &PgPool,
    user_id: UserId,
    conversation_id: ConversationId,
) -> Result<Option<AccessMode>> {
    let identities = memoh_db::identities::list_for_user(pool, user_id).await?;
    if identities.is_empty() {
        return Ok(None);
    }

    for identity in &identities {
        if memoh_db::conversations::is_participant(pool, conversation_id, identity.id).await? {
            return Ok(Some(AccessMode::Participant));
        }
    }
    for identity in &identities {
        if memoh_db::conversations::has_sent_in_conversation(pool, conversation_id, identity.id).await? {
            return Ok(Some(AccessMode::ChannelIdentityObserved));
        }
    }
    Ok(None)
}

/// Asserts `access` grants full participant rights, per a caller
/// who only resolved to `ChannelIdentityObserved` "receives message reads
/// but fails `GetParticipant` with `ErrNotParticipant`".
pub fn require_participant(access: AccessMode) -> std::result::Result<(), NotParticipant> {
    match access {
        AccessMode::Participant => Ok(()),
        AccessMode::ChannelIdentityObserved => Err(NotParticipant),
    }
}
