//! Like toggle behavior through the assembled services.

mod common;

use pawprint_core::messages::{DoLikeReq, GetLikedUsersReq, GetUserLikedReq};
use pawprint_core::{fields, Like, Record, TargetType};
use pawprint_server::storage::Filter;

use common::harness;

fn req(user: &str, target: &str, kind: i64) -> DoLikeReq {
    DoLikeReq {
        user_id: user.to_string(),
        target_id: target.to_string(),
        target_type: TargetType(kind),
        associated_id: "post-7".to_string(),
        liked_user_id: "owner".to_string(),
    }
}

fn tuple(user: &str, target: &str, kind: i64) -> Filter {
    Filter::all()
        .and(fields::USER_ID, user)
        .and(fields::TARGET_ID, target)
        .and(fields::TARGET_TYPE, kind)
}

#[tokio::test]
async fn toggle_on_then_off_tracks_record_existence() {
    let h = harness();
    let likes = &h.services.likes;

    let on = likes.do_like(&h.services.context(), req("U1", "T1", 1)).await.unwrap();
    assert!(on.liked);
    assert!(on.get_fish);
    assert_eq!(h.docs.count(Like::COLLECTION, &tuple("U1", "T1", 1)).await.unwrap(), 1);

    let off = likes.do_like(&h.services.context(), req("U1", "T1", 1)).await.unwrap();
    assert!(!off.liked);
    assert!(!off.get_fish);
    assert_eq!(h.docs.count(Like::COLLECTION, &tuple("U1", "T1", 1)).await.unwrap(), 0);
}

#[tokio::test]
async fn repeated_toggles_alternate() {
    let h = harness();
    let mut states = Vec::new();
    for _ in 0..5 {
        let resp = h
            .services
            .likes
            .do_like(&h.services.context(), req("U1", "T1", 1))
            .await
            .unwrap();
        let liked = h
            .services
            .likes
            .get_user_liked(
                &h.services.context(),
                GetUserLikedReq {
                    user_id: "U1".to_string(),
                    target_id: "T1".to_string(),
                    target_type: TargetType(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.liked, liked.liked);
        states.push(resp.liked);
    }
    assert_eq!(states, vec![true, false, true, false, true]);
}

#[tokio::test]
async fn tuples_differing_only_by_type_are_independent() {
    let h = harness();
    let likes = &h.services.likes;
    likes.do_like(&h.services.context(), req("U1", "T1", 1)).await.unwrap();
    likes.do_like(&h.services.context(), req("U1", "T1", 2)).await.unwrap();
    likes.do_like(&h.services.context(), req("U2", "T1", 1)).await.unwrap();

    let users = likes
        .get_liked_users(
            &h.services.context(),
            GetLikedUsersReq {
                target_id: "T1".to_string(),
                target_type: TargetType(1),
            },
        )
        .await
        .unwrap();
    let mut ids = users.user_ids;
    ids.sort();
    assert_eq!(ids, vec!["U1", "U2"]);
}

#[tokio::test]
async fn new_likes_notify_only_for_mapped_types() {
    let h = harness();
    let likes = &h.services.likes;
    likes.do_like(&h.services.context(), req("U1", "T1", 2)).await.unwrap();
    likes.do_like(&h.services.context(), req("U1", "T2", 5)).await.unwrap();
    // Removing a like never notifies.
    likes.do_like(&h.services.context(), req("U1", "T1", 2)).await.unwrap();
    h.services.shutdown().await;

    let sent = h.publisher.on_topic("notification");
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0],
        serde_json::json!({
            "targetUserId": "owner",
            "sourceUserId": "U1",
            "sourceContentId": "T1",
            "type": 3,
            "text": "",
            "isRead": false,
        })
    );
}
