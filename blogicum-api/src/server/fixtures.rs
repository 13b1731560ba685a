use blogicum_common::model::{
    Body, Id, Title,
    category::{Category, CategorySlug},
    comment::Comment,
    post::{Post, PostMarker},
    user::{PersonalName, User, Username},
};
use time::macros::datetime;

pub fn user(id: u64, is_staff: bool) -> User {
    User {
        id: Id::from(id),
        username: Username::new(format!("member{id}")).unwrap(),
        first_name: PersonalName::new(String::new()).unwrap(),
        last_name: PersonalName::new(String::new()).unwrap(),
        is_staff,
        joined_at: datetime!(2025-01-02 00:00 UTC),
    }
}

pub fn post(id: u64, author: User) -> Post {
    Post {
        id: Id::from(id),
        title: Title::new("Programme announced".into()).unwrap(),
        text: Body::new("Sessions start at nine.".into()).unwrap(),
        pub_date: datetime!(2025-05-01 09:00 UTC),
        author,
        category: Some(Category {
            id: Id::from(500),
            title: Title::new("News".into()).unwrap(),
            description: String::new(),
            slug: CategorySlug::new("news".into()).unwrap(),
            is_published: true,
            created_at: datetime!(2025-01-03 00:00 UTC),
        }),
        location: None,
        image: None,
        is_published: true,
        created_at: datetime!(2025-04-01 09:00 UTC),
        comment_count: 0,
    }
}

pub fn comment(id: u64, post: Id<PostMarker>, author: User) -> Comment {
    Comment {
        id: Id::from(id),
        post,
        author,
        text: Body::new("Looking forward to it.".into()).unwrap(),
        created_at: datetime!(2025-05-02 10:00 UTC),
    }
}
