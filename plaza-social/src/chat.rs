//! Chat mutations.

use chrono::Utc;
use plaza_core::{
    remove_record, update_record, Endpoint, FormPart, Message, MessageReaction, Payload,
    ReactionType, RecordId, UserSummary,
};
use plaza_sync::MutationRequest;
use serde_json::json;

use crate::keys;
use crate::media::MediaFile;
use crate::snapshot::Snapshot;

/// Send a text message. The placeholder is appended to the conversation.
pub fn send_message(
    conversation_id: RecordId,
    content: &str,
    placeholder: RecordId,
    sender: &UserSummary,
) -> MutationRequest<Snapshot> {
    let optimistic = Message {
        id: placeholder,
        conversation_id,
        sender: sender.clone(),
        content: Some(content.to_string()),
        media_urls: Vec::new(),
        reactions: Vec::new(),
        created_at: Some(Utc::now().naive_utc()),
    };

    MutationRequest::new(
        "send_message",
        Endpoint::post("/chat/send"),
        Payload::Json(json!({
            "conversationId": conversation_id,
            "senderId": sender.id,
            "content": content,
        })),
    )
    .placeholder(placeholder)
    .predict(keys::conversation(conversation_id), move |snapshot: &Snapshot| {
        snapshot.with_messages(|messages| messages.push(optimistic.clone()))
    })
    .invalidate(keys::conversation(conversation_id))
    .invalidate(keys::my_conversations())
}

/// Send media files to a conversation.
pub fn send_message_media(
    conversation_id: RecordId,
    sender_id: RecordId,
    media: &[MediaFile],
) -> MutationRequest<Snapshot> {
    let mut parts = vec![
        FormPart::text("conversationId", conversation_id.to_string()),
        FormPart::text("senderId", sender_id.to_string()),
    ];
    parts.extend(media.iter().map(|file| file.form_part("mediaFiles")));

    MutationRequest::new(
        "send_message_media",
        Endpoint::post("/chat/send-media"),
        Payload::Multipart(parts),
    )
    .expect_data()
    .invalidate(keys::conversation(conversation_id))
    .invalidate(keys::my_conversations())
}

/// Delete a message. Every chat query is refreshed on success.
///
/// The server answers with a message and no `data`.
pub fn delete_message(conversation_id: RecordId, message_id: RecordId) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "delete_message",
        Endpoint::delete(format!("/chat/{message_id}")),
        Payload::Empty,
    )
    .predict(keys::conversation(conversation_id), move |snapshot: &Snapshot| {
        snapshot.with_messages(|messages| {
            remove_record(messages, message_id);
        })
    })
    .invalidate_prefix(keys::chat())
}

/// React to a message.
///
/// Reacting with the type the user already left removes it; any other type
/// replaces it. The optimistic reaction carries `reaction_id` until the
/// conversation is refetched.
pub fn react_message(
    conversation_id: RecordId,
    message_id: RecordId,
    reaction_type: ReactionType,
    reaction_id: RecordId,
    user: &UserSummary,
) -> MutationRequest<Snapshot> {
    let user_id = user.id;
    let reaction = MessageReaction {
        id: reaction_id,
        user_id,
        username: user.username.clone(),
        reaction_type,
    };

    MutationRequest::new(
        "react_message",
        Endpoint::post("/chat/react"),
        Payload::Json(json!({ "messageId": message_id, "type": reaction_type })),
    )
    .expect_data()
    .predict(keys::conversation(conversation_id), move |snapshot: &Snapshot| {
        snapshot.with_messages(|messages| {
            update_record(messages, message_id, |message| {
                let same = message
                    .reactions
                    .iter()
                    .any(|r| r.user_id == user_id && r.reaction_type == reaction_type);
                let next = (!same).then(|| reaction.clone());
                message.set_reaction(next, user_id);
            });
        })
    })
    .invalidate(keys::conversation(conversation_id))
}
