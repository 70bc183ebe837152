//! User profile operations and the weekly check-in.

use std::sync::Arc;

use pawprint_core::messages::{
    CheckInReq, CheckInResp, GetUserDetailReq, GetUserDetailResp, GetUserReq, GetUserResp,
    SearchUserReq, SearchUserResp, UpdateUserReq, UpdateUserResp, UserDetail, UserPreview,
};
use pawprint_core::{RecordId, User};

use crate::config::ServiceConfig;
use crate::context::OperationContext;
use crate::error::{ServiceError, StoreError};
use crate::mapper::UserMapper;
use crate::notify::{Notifier, OutboundMessage};
use crate::service::domain::like::saturating_i64;
use crate::streak::StreakTracker;

/// Characters of the hex id appended to a synthesized nickname.
const NICKNAME_ID_CHARS: usize = 6;

pub struct UserService {
    users: UserMapper,
    streaks: Arc<StreakTracker>,
    notifier: Arc<Notifier>,
    default_avatar_url: String,
    default_nickname_prefix: String,
}

impl UserService {
    pub fn new(
        users: UserMapper,
        streaks: Arc<StreakTracker>,
        notifier: Arc<Notifier>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            users,
            streaks,
            notifier,
            default_avatar_url: config.default_avatar_url.clone(),
            default_nickname_prefix: config.default_nickname_prefix.clone(),
        }
    }

    /// # Errors
    ///
    /// `InvalidIdentity`, `NotFound`, store failure, timeout, or cancellation.
    pub async fn get_user(
        &self,
        ctx: &OperationContext,
        req: GetUserReq,
    ) -> Result<GetUserResp, ServiceError> {
        ctx.run(async {
            let user = self.users.find_one(&req.user_id).await?;
            Ok(GetUserResp {
                user: preview(user),
            })
        })
        .await
    }

    /// Reads a profile, creating a default one on first read.
    ///
    /// A concurrent creation of the same profile is resolved by reading the
    /// winner's record.
    ///
    /// # Errors
    ///
    /// `InvalidIdentity`, store failure, timeout, or cancellation.
    pub async fn get_user_detail(
        &self,
        ctx: &OperationContext,
        req: GetUserDetailReq,
    ) -> Result<GetUserDetailResp, ServiceError> {
        ctx.run(self.detail(req)).await
    }

    async fn detail(&self, req: GetUserDetailReq) -> Result<GetUserDetailResp, ServiceError> {
        let user = match self.users.find_one(&req.user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => self.synthesize(&req.user_id).await?,
            Err(e) => return Err(e.into()),
        };
        Ok(GetUserDetailResp {
            user: detail(user),
        })
    }

    async fn synthesize(&self, user_id: &str) -> Result<User, StoreError> {
        let id = RecordId::parse_hex(user_id)?;
        let mut user = self.default_profile(id);
        match self.users.insert(&mut user).await {
            Ok(()) => {
                tracing::info!(%id, "created default profile");
                Ok(user)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                tracing::debug!(%id, "default profile created concurrently, re-reading");
                self.users.find_one(user_id).await
            }
            Err(e) => Err(e),
        }
    }

    fn default_profile(&self, id: RecordId) -> User {
        let hex = id.to_hex();
        let suffix = &hex[hex.len() - NICKNAME_ID_CHARS..];
        User {
            id: Some(id),
            avatar_url: self.default_avatar_url.clone(),
            nickname: format!("{}{suffix}", self.default_nickname_prefix),
            ..User::default()
        }
    }

    /// Merges the supplied non-empty fields into the profile, creating it if
    /// absent. A new avatar URL is reported as in use.
    ///
    /// # Errors
    ///
    /// `InvalidIdentity`, store failure, timeout, or cancellation.
    pub async fn update_user(
        &self,
        ctx: &OperationContext,
        req: UpdateUserReq,
    ) -> Result<UpdateUserResp, ServiceError> {
        ctx.run(self.upsert(req)).await
    }

    async fn upsert(&self, req: UpdateUserReq) -> Result<UpdateUserResp, ServiceError> {
        let id = RecordId::parse_hex(&req.user.id).map_err(StoreError::from)?;
        let avatar_url = req.user.avatar_url;
        let patch = User {
            id: Some(id),
            avatar_url: avatar_url.clone(),
            nickname: req.user.nickname,
            motto: req.user.motto,
            ..User::default()
        };
        self.users.upsert(&patch).await?;

        if !avatar_url.is_empty() {
            self.notifier.send(OutboundMessage::UsedUrls(vec![avatar_url]));
        }
        Ok(UpdateUserResp {})
    }

    /// Ranked nickname search.
    ///
    /// # Errors
    ///
    /// `InvalidToken`, index failure, timeout, or cancellation.
    pub async fn search_user(
        &self,
        ctx: &OperationContext,
        req: SearchUserReq,
    ) -> Result<SearchUserResp, ServiceError> {
        ctx.run(async {
            let page = self.users.search(&req.nickname, &req.pagination).await?;
            Ok(SearchUserResp {
                total: saturating_i64(page.total.unwrap_or_default()),
                users: page.items.into_iter().map(|s| preview(s.record)).collect(),
                token: page.next_token,
            })
        })
        .await
    }

    /// Weekly check-in. Counter failures report no reward.
    ///
    /// # Errors
    ///
    /// Timeout or cancellation.
    pub async fn check_in(
        &self,
        ctx: &OperationContext,
        req: CheckInReq,
    ) -> Result<CheckInResp, ServiceError> {
        ctx.run(async {
            let reward = self.streaks.check_in(&req.user_id).await;
            Ok(CheckInResp {
                get_fish: reward.granted,
                get_fish_times: reward.count,
            })
        })
        .await
    }
}

fn hex_id(user: &User) -> String {
    user.id.map(|id| id.to_hex()).unwrap_or_default()
}

fn preview(user: User) -> UserPreview {
    UserPreview {
        id: hex_id(&user),
        avatar_url: user.avatar_url,
        nickname: user.nickname,
    }
}

fn detail(user: User) -> UserDetail {
    UserDetail {
        id: hex_id(&user),
        avatar_url: user.avatar_url,
        nickname: user.nickname,
        motto: user.motto,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Offset, TimeZone, Utc};
    use pawprint_core::fields;

    use super::*;
    use crate::notify::LogPublisher;
    use crate::storage::engines::{
        LocalCache, MemoryCounterStore, MemoryDocumentStore, TantivySearchIndex,
    };
    use crate::streak::ManualClock;

    struct Fixture {
        svc: UserService,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let config = ServiceConfig::default();
        let users = UserMapper::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(LocalCache::new(64)),
            Arc::new(TantivySearchIndex::in_memory(&[fields::NICKNAME])),
            &config,
        );
        // Monday.
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap(),
        ));
        let streaks = Arc::new(StreakTracker::new(
            Arc::new(MemoryCounterStore::new()),
            Arc::clone(&clock) as Arc<dyn crate::streak::Clock>,
            Utc.fix(),
        ));
        let notifier = Arc::new(Notifier::start(Arc::new(LogPublisher), config.notify.clone()));
        Fixture {
            svc: UserService::new(users, streaks, notifier, &config),
            clock,
        }
    }

    fn ctx() -> OperationContext {
        OperationContext::new(5_000)
    }

    #[tokio::test]
    async fn detail_synthesizes_default_profile_once() {
        let f = fixture();
        let id = RecordId::new().to_hex();
        let first = f
            .svc
            .get_user_detail(&ctx(), GetUserDetailReq { user_id: id.clone() })
            .await
            .unwrap();
        assert_eq!(first.user.id, id);
        assert_eq!(first.user.nickname, format!("cat_{}", &id[18..]));
        assert_eq!(first.user.avatar_url, ServiceConfig::default().default_avatar_url);

        let second = f
            .svc
            .get_user_detail(&ctx(), GetUserDetailReq { user_id: id })
            .await
            .unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn get_user_does_not_synthesize() {
        let f = fixture();
        let err = f
            .svc
            .get_user(&ctx(), GetUserReq { user_id: RecordId::new().to_hex() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected() {
        let f = fixture();
        let err = f
            .svc
            .get_user_detail(&ctx(), GetUserDetailReq { user_id: "xyz".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidIdentity));

        let err = f
            .svc
            .update_user(
                &ctx(),
                UpdateUserReq {
                    user: UserDetail {
                        id: "xyz".to_string(),
                        avatar_url: String::new(),
                        nickname: "n".to_string(),
                        motto: String::new(),
                    },
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidIdentity));
    }

    #[tokio::test]
    async fn update_then_search_finds_new_nickname() {
        let f = fixture();
        let id = RecordId::new().to_hex();
        f.svc
            .update_user(
                &ctx(),
                UpdateUserReq {
                    user: UserDetail {
                        id: id.clone(),
                        avatar_url: "https://cdn/a.png".to_string(),
                        nickname: "Whisker".to_string(),
                        motto: "purr".to_string(),
                    },
                },
            )
            .await
            .unwrap();

        let found = f
            .svc
            .search_user(
                &ctx(),
                SearchUserReq {
                    nickname: "whisker".to_string(),
                    pagination: Default::default(),
                },
            )
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.users[0].id, id);
        assert_eq!(found.users[0].avatar_url, "https://cdn/a.png");
        assert!(found.token.is_some());
    }

    #[tokio::test]
    async fn check_in_counts_within_week() {
        let f = fixture();
        let req = || CheckInReq { user_id: "u1".to_string() };

        let first = f.svc.check_in(&ctx(), req()).await.unwrap();
        assert_eq!((first.get_fish, first.get_fish_times), (true, 1));

        let again = f.svc.check_in(&ctx(), req()).await.unwrap();
        assert_eq!((again.get_fish, again.get_fish_times), (false, 1));

        f.clock.advance(Duration::days(1));
        let tuesday = f.svc.check_in(&ctx(), req()).await.unwrap();
        assert_eq!((tuesday.get_fish, tuesday.get_fish_times), (true, 2));
    }
}
