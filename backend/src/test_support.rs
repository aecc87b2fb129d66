//! Shared test doubles for unit tests in `src/`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};

use crate::domain::ports::{
    EnrollmentDirectory, FeedbackRepository, FeedbackRepositoryError, FixtureUpstreamDirectory,
    IdentityDirectory, TrainingDirectory, UpstreamError, UserDirectory,
};
use crate::domain::{
    Feedback, FeedbackDraft, FeedbackId, RemoteCheckSettings, RemoteFactCheckers,
    TrainingSessionId, UpstreamDirectories, UserId, Username, ValidationPipeline,
};

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Pipeline over the given directories with default breaker settings.
pub fn pipeline_over(directories: UpstreamDirectories) -> ValidationPipeline {
    let checkers = RemoteFactCheckers::new(
        directories,
        RemoteCheckSettings::default(),
        Arc::new(DefaultClock),
    );
    ValidationPipeline::new(Arc::new(checkers))
}

/// Pipeline whose upstream directories confirm every fact.
pub fn permissive_pipeline() -> ValidationPipeline {
    let directory = Arc::new(FixtureUpstreamDirectory);
    pipeline_over(UpstreamDirectories {
        users: directory.clone(),
        trainings: directory.clone(),
        enrollments: directory.clone(),
        identities: directory,
    })
}

/// Upstream directory answering every remote fact from fixed sets.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDirectory {
    users: HashSet<UserId>,
    trainings: HashSet<TrainingSessionId>,
    enrollments: HashSet<(UserId, TrainingSessionId)>,
    identities: HashMap<String, UserId>,
}

impl ScriptedDirectory {
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.users.insert(UserId::new(user_id));
        self
    }

    pub fn with_training(mut self, training_session_id: i64) -> Self {
        self.trainings.insert(TrainingSessionId::new(training_session_id));
        self
    }

    pub fn with_enrollment(mut self, user_id: i64, training_session_id: i64) -> Self {
        self.enrollments.insert((
            UserId::new(user_id),
            TrainingSessionId::new(training_session_id),
        ));
        self
    }

    pub fn with_identity(mut self, username: &str, user_id: i64) -> Self {
        self.identities.insert(username.to_owned(), UserId::new(user_id));
        self
    }

    /// Share one directory across the four upstream slots.
    pub fn into_directories(self) -> UpstreamDirectories {
        let directory = Arc::new(self);
        UpstreamDirectories {
            users: directory.clone(),
            trainings: directory.clone(),
            enrollments: directory.clone(),
            identities: directory,
        }
    }
}

#[async_trait]
impl UserDirectory for ScriptedDirectory {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, UpstreamError> {
        Ok(self.users.contains(&user_id))
    }
}

#[async_trait]
impl TrainingDirectory for ScriptedDirectory {
    async fn training_exists(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError> {
        Ok(self.trainings.contains(&training_session_id))
    }
}

#[async_trait]
impl EnrollmentDirectory for ScriptedDirectory {
    async fn is_enrolled(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError> {
        Ok(self.enrollments.contains(&(user_id, training_session_id)))
    }
}

#[async_trait]
impl IdentityDirectory for ScriptedDirectory {
    async fn user_id_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserId>, UpstreamError> {
        Ok(self.identities.get(username.as_str()).copied())
    }
}

#[derive(Default)]
struct StoreState {
    rows: BTreeMap<(UserId, TrainingSessionId), Feedback>,
    next_id: i64,
    pending_conflicts: u32,
    upsert_calls: u32,
}

/// In-memory feedback store keyed by natural key.
#[derive(Default)]
pub struct InMemoryFeedbackRepository(Mutex<StoreState>);

impl InMemoryFeedbackRepository {
    /// Make the next `count` upserts fail with a conflict.
    pub fn fail_next_upserts_with_conflict(&self, count: u32) {
        self.lock_state().pending_conflicts = count;
    }

    pub fn upsert_calls(&self) -> u32 {
        self.lock_state().upsert_calls
    }

    pub fn row_count(&self) -> usize {
        self.lock_state().rows.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("store mutex"),
        }
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn upsert(&self, draft: &FeedbackDraft) -> Result<Feedback, FeedbackRepositoryError> {
        let mut state = self.lock_state();
        state.upsert_calls += 1;
        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            return Err(FeedbackRepositoryError::conflict("duplicate natural key"));
        }
        let key = (draft.user_id, draft.training_session_id);
        let id = match state.rows.get(&key) {
            Some(existing) => existing.id,
            None => {
                state.next_id += 1;
                FeedbackId::new(state.next_id)
            }
        };
        let stored = Feedback::from_draft(id, draft.clone());
        state.rows.insert(key, stored.clone());
        Ok(stored)
    }

    async fn find_by_natural_key(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<Option<Feedback>, FeedbackRepositoryError> {
        Ok(self
            .lock_state()
            .rows
            .get(&(user_id, training_session_id))
            .cloned())
    }

    async fn find_all_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Feedback>, FeedbackRepositoryError> {
        Ok(self
            .lock_state()
            .rows
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_all_by_training(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<Vec<Feedback>, FeedbackRepositoryError> {
        Ok(self
            .lock_state()
            .rows
            .values()
            .filter(|row| row.training_session_id == training_session_id)
            .cloned()
            .collect())
    }

    async fn delete_all_by_user(&self, user_id: UserId) -> Result<u64, FeedbackRepositoryError> {
        let mut state = self.lock_state();
        let before = state.rows.len();
        state.rows.retain(|(owner, _), _| *owner != user_id);
        Ok((before - state.rows.len()) as u64)
    }
}
