use crate::model::{
    Body, Id,
    post::PostMarker,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub author: User,
    pub text: Body,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Comment {
    /// Only the author may edit or delete a comment.
    #[must_use]
    pub fn is_authored_by(&self, user: Id<UserMarker>) -> bool {
        self.author.id == user
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CommentForm {
    pub text: Body,
}

#[cfg(test)]
mod tests {
    use super::Comment;
    use crate::model::{
        Body, Id,
        user::{PersonalName, User, Username},
    };
    use time::macros::datetime;

    fn comment_by(author: u64) -> Comment {
        Comment {
            id: Id::from(20),
            post: Id::from(10),
            author: User {
                id: Id::from(author),
                username: Username::new("participant".into()).unwrap(),
                first_name: PersonalName::new(String::new()).unwrap(),
                last_name: PersonalName::new(String::new()).unwrap(),
                is_staff: false,
                joined_at: datetime!(2025-01-02 00:00 UTC),
            },
            text: Body::new("Will the slides be published?".into()).unwrap(),
            created_at: datetime!(2025-05-02 10:00 UTC),
        }
    }

    #[test]
    fn authorship() {
        let comment = comment_by(3);

        assert!(comment.is_authored_by(Id::from(3)));
        assert!(!comment.is_authored_by(Id::from(4)));
    }
}
