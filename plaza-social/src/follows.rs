//! Follow graph mutations.
//!
//! The `id` passed to accept, decline and remove is the `id` of the profile
//! entry in the corresponding follow list.

use plaza_core::{remove_record, Endpoint, Payload, RecordId};
use plaza_sync::MutationRequest;

use crate::keys;
use crate::snapshot::Snapshot;

fn drop_profile(id: RecordId) -> impl Fn(&Snapshot) -> Snapshot + Send + Sync + 'static {
    move |snapshot: &Snapshot| {
        snapshot.with_profiles(|profiles| {
            remove_record(profiles, id);
        })
    }
}

pub fn send_follow_request(user_id: RecordId) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "send_follow_request",
        Endpoint::post(format!("/follows/{user_id}")),
        Payload::Empty,
    )
    .expect_data()
    .invalidate_prefix(keys::follow())
    .invalidate(keys::profile())
}

pub fn accept_follow_request(follow_id: RecordId) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "accept_follow_request",
        Endpoint::put(format!("/follows/accept/{follow_id}")),
        Payload::Empty,
    )
    .expect_data()
    .predict(keys::follow_requests(), drop_profile(follow_id))
    .invalidate_prefix(keys::follow())
    .invalidate(keys::profile())
}

pub fn decline_follow_request(follow_id: RecordId) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "decline_follow_request",
        Endpoint::put(format!("/follows/decline/{follow_id}")),
        Payload::Empty,
    )
    .expect_data()
    .predict(keys::follow_requests(), drop_profile(follow_id))
    .invalidate(keys::follow_requests())
}

/// Unfollow, or remove a follower.
pub fn remove_follow(follow_id: RecordId) -> MutationRequest<Snapshot> {
    MutationRequest::new(
        "remove_follow",
        Endpoint::delete(format!("/follows/{follow_id}")),
        Payload::Empty,
    )
    .expect_data()
    .predict(keys::followers(), drop_profile(follow_id))
    .predict(keys::following(), drop_profile(follow_id))
    .invalidate(keys::followers())
    .invalidate(keys::following())
    .invalidate(keys::profile())
}
