//! Feedback data model.
//!
//! A feedback record is keyed naturally by `(user_id, training_session_id)`;
//! the surrogate [`FeedbackId`] is assigned by the store on first insert and
//! never changes afterwards. User and training identifiers are foreign keys
//! owned by other services and are treated as opaque integers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum accepted comment length in characters.
pub const COMMENT_MAX: usize = 2000;
/// Lowest accepted star rating.
pub const STAR_RATING_MIN: i64 = 1;
/// Highest accepted star rating.
pub const STAR_RATING_MAX: i64 = 5;

/// Validation errors returned by the feedback value constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackValidationError {
    /// The comment was empty or whitespace.
    #[error("comment must not be blank")]
    BlankComment,
    /// The comment exceeded [`COMMENT_MAX`] characters.
    #[error("comment must be at most {max} characters")]
    CommentTooLong { max: usize },
    /// The rating fell outside `1..=5`.
    #[error("star rating must be between 1 and 5, got {value}")]
    RatingOutOfRange { value: i64 },
    /// The username was empty or whitespace.
    #[error("username must not be blank")]
    BlankUsername,
}

impl FeedbackValidationError {
    /// Request field the failure refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankComment | Self::CommentTooLong { .. } => "comment",
            Self::RatingOutOfRange { .. } => "starRating",
            Self::BlankUsername => "username",
        }
    }
}

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw identifier.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Access the raw identifier.
            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id!(
    /// Identifier of a user owned by the user service.
    UserId
);
integer_id!(
    /// Identifier of a training session owned by the training service.
    TrainingSessionId
);
integer_id!(
    /// Surrogate key of a stored feedback row.
    FeedbackId
);

/// Opaque login name of an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Validate and construct a [`Username`].
    pub fn new(raw: impl Into<String>) -> Result<Self, FeedbackValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FeedbackValidationError::BlankUsername);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the username as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-text feedback comment; never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Comment(String);

impl Comment {
    /// Validate and construct a [`Comment`].
    ///
    /// # Examples
    /// ```
    /// use feedback_service::domain::Comment;
    ///
    /// assert!(Comment::new("great session").is_ok());
    /// assert!(Comment::new("   ").is_err());
    /// ```
    pub fn new(raw: impl Into<String>) -> Result<Self, FeedbackValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(FeedbackValidationError::BlankComment);
        }
        if raw.chars().count() > COMMENT_MAX {
            return Err(FeedbackValidationError::CommentTooLong { max: COMMENT_MAX });
        }
        Ok(Self(raw))
    }

    /// Borrow the comment text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Comment {
    type Error = FeedbackValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Comment> for String {
    fn from(value: Comment) -> Self {
        value.0
    }
}

/// Star rating in the inclusive range `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct StarRating(u8);

impl StarRating {
    /// Validate and construct a [`StarRating`].
    ///
    /// # Examples
    /// ```
    /// use feedback_service::domain::StarRating;
    ///
    /// assert_eq!(StarRating::new(5).map(StarRating::value), Ok(5));
    /// assert!(StarRating::new(6).is_err());
    /// ```
    pub fn new(value: i64) -> Result<Self, FeedbackValidationError> {
        if !(STAR_RATING_MIN..=STAR_RATING_MAX).contains(&value) {
            return Err(FeedbackValidationError::RatingOutOfRange { value });
        }
        u8::try_from(value)
            .map(Self)
            .map_err(|_| FeedbackValidationError::RatingOutOfRange { value })
    }

    /// Numeric rating value.
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for StarRating {
    type Error = FeedbackValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StarRating> for i64 {
    fn from(value: StarRating) -> Self {
        i64::from(value.0)
    }
}

/// Validated content of a write, before it has a surrogate id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackDraft {
    pub user_id: UserId,
    pub training_session_id: TrainingSessionId,
    pub comment: Comment,
    pub star_rating: StarRating,
}

/// A stored feedback record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub id: FeedbackId,
    pub user_id: UserId,
    pub training_session_id: TrainingSessionId,
    pub comment: Comment,
    pub star_rating: StarRating,
}

impl Feedback {
    /// Attach a surrogate id to a draft.
    pub fn from_draft(id: FeedbackId, draft: FeedbackDraft) -> Self {
        let FeedbackDraft {
            user_id,
            training_session_id,
            comment,
            star_rating,
        } = draft;
        Self {
            id,
            user_id,
            training_session_id,
            comment,
            star_rating,
        }
    }

    /// Whether this record belongs to the natural key.
    pub fn matches(&self, user_id: UserId, training_session_id: TrainingSessionId) -> bool {
        self.user_id == user_id && self.training_session_id == training_session_id
    }
}
