//! Post mutations.

use plaza_core::{update_record, Endpoint, FormPart, Payload, Post, RecordId, Visibility};
use plaza_sync::MutationRequest;

use crate::keys;
use crate::media::MediaFile;
use crate::snapshot::Snapshot;

/// Toggle the current user's reaction on a post in the feed. The server
/// acknowledges without `data`.
pub fn toggle_post_reaction(post_id: RecordId) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "toggle_post_reaction",
        Endpoint::post(format!("/posts/{post_id}/reaction")),
        Payload::Empty,
    )
    .predict(keys::feeds(), move |snapshot: &Snapshot| {
        snapshot.with_posts(|posts| {
            update_record(posts, post_id, Post::toggle_reaction);
        })
    })
    .invalidate(keys::feeds())
}

/// A post to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub content: String,
    pub visibility: Visibility,
    pub media: Vec<MediaFile>,
}

/// Publish a post. Nothing is predicted since media URLs are assigned by
/// the server.
pub fn create_post(input: &NewPost) -> MutationRequest<Snapshot> {
    let mut parts = vec![
        FormPart::text("content", input.content.clone()),
        FormPart::text("visibility", input.visibility.as_str()),
    ];
    parts.extend(input.media.iter().map(|file| file.form_part("mediaFiles")));

    MutationRequest::new("create_post", Endpoint::post("/posts"), Payload::Multipart(parts))
        .expect_data()
        .invalidate(keys::feeds())
        .invalidate(keys::own_posts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_test_utils::fixtures::post;

    #[test]
    fn test_toggle_post_reaction_prediction() {
        let mut liked = post(2);
        liked.reacted_by_current_user = true;
        liked.total_reactions = 5;
        let feed = Snapshot::Posts(vec![post(1), liked]);

        let request = toggle_post_reaction(RecordId::new(2));
        let after = request.predict_value(&keys::feeds(), &feed).unwrap();
        let posts = after.as_posts().unwrap();
        assert!(!posts[1].reacted_by_current_user);
        assert_eq!(posts[1].total_reactions, 4);
        assert_eq!(posts[0], post(1));
    }

    #[test]
    fn test_create_post_form() {
        let request = create_post(&NewPost {
            content: "sunset".to_string(),
            visibility: Visibility::Followers,
            media: vec![MediaFile::new("a.jpg", "image/jpeg", vec![1, 2])],
        });
        let Payload::Multipart(parts) = &request.input().payload else {
            panic!("expected multipart payload");
        };
        assert_eq!(parts[0], FormPart::text("content", "sunset"));
        assert_eq!(parts[1], FormPart::text("visibility", "FOLLOWERS"));
        assert!(matches!(&parts[2], FormPart::File { name, .. } if name == "mediaFiles"));
        assert_eq!(request.predicted_keys().count(), 0);
        assert_eq!(request.affected_keys(), vec![keys::feeds(), keys::own_posts()]);
    }
}
