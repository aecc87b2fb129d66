//! Integration tests for the PostgreSQL user deletion inbox and the
//! consistency worker running over it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use feedback_service::domain::ports::{
    FeedbackRepository, SubscriptionError, UserDeletionPublisher, UserDeletionSubscription,
};
use feedback_service::domain::{
    Comment, ConsistencyWorker, ConsistencyWorkerConfig, FeedbackDraft, StarRating,
    TrainingSessionId, USER_DELETED_EVENT_TYPE, UserDeletedEvent, UserId, WorkerStep,
};
use feedback_service::outbound::persistence::{
    DbPool, DieselFeedbackRepository, DieselUserDeletionInbox, InboxConfig, PoolConfig,
};
use mockable::{Clock, DefaultClock};
use rstest::rstest;
use tokio::runtime::Runtime;

mod support;

use support::{MigratedDatabase, handle_cluster_setup_failure, migrated_database};

const LEASE: Duration = Duration::from_secs(60);

/// Clock the tests move by hand to expire inbox leases.
struct SteppedClock(Mutex<DateTime<Utc>>);

impl SteppedClock {
    fn starting_now() -> Self {
        Self(Mutex::new(Utc::now()))
    }

    fn advance(&self, delta: Duration) {
        let delta = TimeDelta::from_std(delta).expect("representable delta");
        *self.0.lock().expect("clock mutex") += delta;
    }
}

impl Clock for SteppedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex")
    }
}

struct TestContext {
    runtime: Runtime,
    pool: DbPool,
    inbox: Arc<DieselUserDeletionInbox>,
    _database: MigratedDatabase,
}

fn setup() -> Option<TestContext> {
    setup_with_clock(Arc::new(DefaultClock))
}

fn setup_with_clock(clock: Arc<dyn Clock>) -> Option<TestContext> {
    let database = match migrated_database() {
        Ok(database) => database,
        Err(reason) => return handle_cluster_setup_failure(reason),
    };
    let runtime = Runtime::new().expect("tokio runtime");
    let pool = runtime
        .block_on(DbPool::new(PoolConfig::new(&database.url).with_max_size(4)))
        .expect("pool should connect");
    let inbox = Arc::new(DieselUserDeletionInbox::new(
        pool.clone(),
        clock,
        InboxConfig {
            poll_interval: Duration::from_millis(20),
            lease: LEASE,
        },
    ));
    Some(TestContext {
        runtime,
        pool,
        inbox,
        _database: database,
    })
}

fn deletion(event_id: &str, user: i64) -> UserDeletedEvent {
    UserDeletedEvent {
        event_id: event_id.to_owned(),
        event_type: USER_DELETED_EVENT_TYPE.to_owned(),
        timestamp: Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
        user_id: UserId::new(user),
    }
}

#[rstest]
fn publish_deduplicates_on_event_id() {
    let Some(ctx) = setup() else { return };
    ctx.runtime.block_on(async {
        assert!(ctx.inbox.publish(&deletion("evt-1", 5)).await.expect("publish"));
        assert!(!ctx.inbox.publish(&deletion("evt-1", 5)).await.expect("republish"));

        let delivery = ctx.inbox.try_claim().await.expect("claim").expect("one row");
        assert_eq!(delivery.event, deletion("evt-1", 5));
        assert_eq!(delivery.attempts, 0);
        assert!(ctx.inbox.try_claim().await.expect("claim").is_none());
    });
}

#[rstest]
fn nack_releases_the_lease_and_counts_the_attempt() {
    let Some(ctx) = setup() else { return };
    ctx.runtime.block_on(async {
        ctx.inbox.publish(&deletion("evt-2", 6)).await.expect("publish");

        let first = ctx.inbox.next_delivery().await.expect("deliver").expect("row");
        assert!(ctx.inbox.try_claim().await.expect("claim").is_none());
        ctx.inbox.nack(&first.tag).await.expect("nack");

        let second = ctx.inbox.next_delivery().await.expect("redeliver").expect("row");
        assert_eq!(second.tag, first.tag);
        assert_eq!(second.attempts, 1);
    });
}

#[rstest]
fn unacknowledged_claim_is_redelivered_once_the_lease_expires() {
    let clock = Arc::new(SteppedClock::starting_now());
    let Some(ctx) = setup_with_clock(clock.clone()) else { return };
    ctx.runtime.block_on(async {
        ctx.inbox.publish(&deletion("evt-5", 8)).await.expect("publish");

        let first = ctx.inbox.try_claim().await.expect("claim").expect("row");
        assert!(ctx.inbox.try_claim().await.expect("claim").is_none());

        clock.advance(LEASE - Duration::from_secs(1));
        assert!(
            ctx.inbox.try_claim().await.expect("claim").is_none(),
            "row stays leased until the lease runs out"
        );

        clock.advance(Duration::from_secs(2));
        let second = ctx.inbox.try_claim().await.expect("claim").expect("row");
        assert_eq!(second.tag, first.tag);
        assert_eq!(second.event, deletion("evt-5", 8));
    });
}

#[rstest]
fn ack_removes_the_row_and_rejects_unknown_tags() {
    let Some(ctx) = setup() else { return };
    ctx.runtime.block_on(async {
        ctx.inbox.publish(&deletion("evt-3", 7)).await.expect("publish");
        let delivery = ctx.inbox.next_delivery().await.expect("deliver").expect("row");

        ctx.inbox.ack(&delivery.tag).await.expect("ack");
        assert!(ctx.inbox.try_claim().await.expect("claim").is_none());

        let err = ctx.inbox.ack(&delivery.tag).await.expect_err("second ack");
        assert!(matches!(err, SubscriptionError::UnknownDelivery { .. }));
    });
}

#[rstest]
fn worker_deletes_feedback_and_acknowledges_the_event() {
    let Some(ctx) = setup() else { return };
    ctx.runtime.block_on(async {
        let repository = Arc::new(DieselFeedbackRepository::new(ctx.pool.clone()));
        for training in [1, 2] {
            repository
                .upsert(&FeedbackDraft {
                    user_id: UserId::new(9),
                    training_session_id: TrainingSessionId::new(training),
                    comment: Comment::new("to be removed").expect("valid comment"),
                    star_rating: StarRating::new(4).expect("valid rating"),
                })
                .await
                .expect("seed feedback");
        }
        ctx.inbox.publish(&deletion("evt-4", 9)).await.expect("publish");

        let worker = ConsistencyWorker::new(
            repository.clone(),
            ctx.inbox.clone(),
            ConsistencyWorkerConfig::default(),
        );
        let step = worker.process_next().await.expect("process");
        assert_eq!(step, WorkerStep::Processed { deleted: 2 });

        let remaining = repository
            .find_all_by_user(UserId::new(9))
            .await
            .expect("list");
        assert!(remaining.is_empty());
        assert!(ctx.inbox.try_claim().await.expect("claim").is_none());
    });
}
