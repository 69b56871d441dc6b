use super::test_db;
use crate::types::Comment;
use chrono::{DateTime, Utc};

fn comment(id: i64, post_id: i64, likes: i64) -> Comment {
    Comment {
        id,
        post_id,
        author_id: 1000 + id,
        text: format!("comment {id}"),
        likes,
        posted_at: DateTime::<Utc>::from_timestamp(1_700_000_000 + id, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_upsert_and_get_comments() {
    let (db, _file) = test_db().await;

    db.upsert_comments(&[comment(1, 101, 3), comment(2, 101, 0), comment(3, 202, 1)])
        .await
        .unwrap();

    let rows = db.get_comments_for_post(101).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].comment_id, 1);
    assert_eq!(rows[0].author_id, 1001);
    assert_eq!(rows[0].likes, 3);

    assert_eq!(db.get_comments_for_post(202).await.unwrap().len(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_upsert_same_natural_key_converges_to_latest_values() {
    let (db, _file) = test_db().await;

    db.upsert_comments(&[comment(1, 101, 3)]).await.unwrap();

    let mut updated = comment(1, 101, 9);
    updated.text = "edited".to_string();
    db.upsert_comments(&[updated]).await.unwrap();

    let rows = db.get_comments_for_post(101).await.unwrap();
    assert_eq!(rows.len(), 1, "upsert must not duplicate the row");
    assert_eq!(rows[0].likes, 9);
    assert_eq!(rows[0].text, "edited");

    db.close().await;
}

#[tokio::test]
async fn test_same_comment_id_under_different_posts_is_distinct() {
    let (db, _file) = test_db().await;

    db.upsert_comments(&[comment(1, 101, 1), comment(1, 202, 2)])
        .await
        .unwrap();

    assert_eq!(db.get_comments_for_post(101).await.unwrap().len(), 1);
    assert_eq!(db.get_comments_for_post(202).await.unwrap().len(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_upsert_empty_list_is_noop() {
    let (db, _file) = test_db().await;

    db.upsert_comments(&[]).await.unwrap();
    assert!(db.get_comments_for_post(101).await.unwrap().is_empty());

    db.close().await;
}
