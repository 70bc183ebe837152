//! Like operations: toggle with reward, liked check, and listings.

use std::sync::Arc;

use pawprint_core::messages::{
    DoLikeReq, DoLikeResp, GetLikedUsersReq, GetLikedUsersResp, GetTargetLikesReq,
    GetTargetLikesResp, GetUserLikedReq, GetUserLikedResp, GetUserLikesReq, GetUserLikesResp,
    LikePreview, Notification,
};
use pawprint_core::Like;
use tokio_util::sync::CancellationToken;

use crate::context::OperationContext;
use crate::error::ServiceError;
use crate::mapper::LikeMapper;
use crate::notify::{Notifier, OutboundMessage};
use crate::streak::StreakTracker;

pub struct LikeService {
    likes: LikeMapper,
    streaks: Arc<StreakTracker>,
    notifier: Arc<Notifier>,
    like_times: i64,
}

impl LikeService {
    pub fn new(
        likes: LikeMapper,
        streaks: Arc<StreakTracker>,
        notifier: Arc<Notifier>,
        like_times: i64,
    ) -> Self {
        Self {
            likes,
            streaks,
            notifier,
            like_times,
        }
    }

    /// Toggles the caller's like on a target.
    ///
    /// A new like notifies the content owner and runs the daily reward. Removing
    /// a like never rewards. Reward and notification failures do not fail the
    /// call.
    ///
    /// # Errors
    ///
    /// Store failures on the like collection, timeout, or cancellation.
    pub async fn do_like(
        &self,
        ctx: &OperationContext,
        req: DoLikeReq,
    ) -> Result<DoLikeResp, ServiceError> {
        ctx.run(self.toggle(req)).await
    }

    async fn toggle(&self, req: DoLikeReq) -> Result<DoLikeResp, ServiceError> {
        let existing = self
            .likes
            .get_id(&req.user_id, &req.target_id, req.target_type)
            .await?;

        if let Some(id) = existing {
            self.likes.delete(&id.to_hex()).await?;
            tracing::debug!(user_id = %req.user_id, target_id = %req.target_id, "like removed");
            return Ok(DoLikeResp::default());
        }

        let mut like = Like::new(
            req.user_id.as_str(),
            req.target_id.as_str(),
            req.target_type,
            req.associated_id.as_str(),
        );
        self.likes.insert(&mut like).await?;
        tracing::debug!(user_id = %req.user_id, target_id = %req.target_id, "like added");

        if let Some(notification) = Notification::for_like(&req) {
            self.notifier.send(OutboundMessage::Notification(notification));
        }

        let reward = self.streaks.like_reward(&req.user_id, self.like_times).await;
        Ok(DoLikeResp {
            liked: true,
            get_fish: reward.granted,
            get_fish_times: reward.count,
        })
    }

    /// # Errors
    ///
    /// Store failure, timeout, or cancellation.
    pub async fn get_user_liked(
        &self,
        ctx: &OperationContext,
        req: GetUserLikedReq,
    ) -> Result<GetUserLikedResp, ServiceError> {
        ctx.run(async {
            let liked = self
                .likes
                .get_user_like(&req.user_id, &req.target_id, req.target_type)
                .await?;
            Ok(GetUserLikedResp { liked })
        })
        .await
    }

    /// # Errors
    ///
    /// Store failure, timeout, or cancellation.
    pub async fn get_target_likes(
        &self,
        ctx: &OperationContext,
        req: GetTargetLikesReq,
    ) -> Result<GetTargetLikesResp, ServiceError> {
        ctx.run(async {
            let likes = self
                .likes
                .get_target_likes(&req.target_id, req.target_type)
                .await?;
            Ok(GetTargetLikesResp {
                count: saturating_i64(likes.len() as u64),
            })
        })
        .await
    }

    /// A page of the user's likes of one type, with their total.
    ///
    /// # Errors
    ///
    /// `InvalidToken`, store failure, timeout, or cancellation.
    pub async fn get_user_likes(
        &self,
        ctx: &OperationContext,
        req: GetUserLikesReq,
    ) -> Result<GetUserLikesResp, ServiceError> {
        ctx.run(self.user_likes(req, &ctx.cancel)).await
    }

    async fn user_likes(
        &self,
        req: GetUserLikesReq,
        cancel: &CancellationToken,
    ) -> Result<GetUserLikesResp, ServiceError> {
        let (page, total) = self
            .likes
            .get_user_likes(&req.user_id, req.target_type, &req.pagination, cancel)
            .await?;
        Ok(GetUserLikesResp {
            likes: page
                .items
                .into_iter()
                .map(|like| LikePreview {
                    target_id: like.target_id,
                    associated_id: like.associated_id,
                })
                .collect(),
            total: saturating_i64(total),
            token: page.next_token,
        })
    }

    /// # Errors
    ///
    /// Store failure, timeout, or cancellation.
    pub async fn get_liked_users(
        &self,
        ctx: &OperationContext,
        req: GetLikedUsersReq,
    ) -> Result<GetLikedUsersResp, ServiceError> {
        ctx.run(async {
            let likes = self
                .likes
                .get_target_likes(&req.target_id, req.target_type)
                .await?;
            Ok(GetLikedUsersResp {
                user_ids: likes.into_iter().map(|like| like.user_id).collect(),
            })
        })
        .await
    }
}

pub(crate) fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
