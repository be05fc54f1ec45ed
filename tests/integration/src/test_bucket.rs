//! Bucket lifecycle integration tests.

#[cfg(test)]
mod tests {
    use ssostore_storage::{CallContext, StorageError};

    use crate::{cleanup_bucket, create_test_bucket, s3_client, storage, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_bucket_once() {
        let storage = storage();
        let client = s3_client();
        let ctx = CallContext::new();
        let bucket = test_bucket_name("create");

        let first = storage.make_bucket(&ctx, &bucket).await.expect("make_bucket");
        assert!(first.created);
        assert!(first.message.contains(&bucket));

        let second = storage.make_bucket(&ctx, &bucket).await.expect("make_bucket");
        assert!(!second.created);

        let head = client.head_bucket().bucket(&bucket).send().await;
        assert!(head.is_ok(), "head_bucket should succeed");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_created_buckets() {
        let storage = storage();
        let client = s3_client();
        let b1 = create_test_bucket(&storage, "list1").await;
        let b2 = create_test_bucket(&storage, "list2").await;

        let buckets = storage
            .list_buckets(&CallContext::new())
            .await
            .expect("list_buckets");
        let names: Vec<&str> = buckets.iter().map(|b| b.name.as_str()).collect();

        assert!(names.contains(&b1.as_str()), "should contain {b1}");
        assert!(names.contains(&b2.as_str()), "should contain {b2}");
        assert!(names.windows(2).all(|w| w[0] <= w[1]), "should be sorted");

        cleanup_bucket(&client, &b1).await;
        cleanup_bucket(&client, &b2).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_remove_empty_bucket() {
        let storage = storage();
        let ctx = CallContext::new();
        let bucket = create_test_bucket(&storage, "remove").await;

        storage.remove_bucket(&ctx, &bucket).await.expect("remove_bucket");

        let err = storage.list_objects(&ctx, &bucket).await.err().expect("guard");
        assert!(matches!(err, StorageError::NoSuchBucket { .. }));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_refuse_to_remove_non_empty_bucket() {
        let storage = storage();
        let client = s3_client();
        let ctx = CallContext::new();
        let bucket = create_test_bucket(&storage, "nonempty").await;
        storage
            .put_object(&ctx, &bucket, "a.txt", "x")
            .await
            .expect("put_object");

        let err = storage.remove_bucket(&ctx, &bucket).await.unwrap_err();
        assert!(matches!(err, StorageError::BucketNotEmpty { .. }), "{err}");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_guard_missing_bucket() {
        let storage = storage();
        let ctx = CallContext::new();
        let bucket = test_bucket_name("ghost");

        let err = storage.remove_bucket(&ctx, &bucket).await.unwrap_err();
        assert!(matches!(err, StorageError::NoSuchBucket { .. }));
        let err = storage.put_object(&ctx, &bucket, "a.txt", "x").await.unwrap_err();
        assert!(matches!(err, StorageError::NoSuchBucket { .. }));
    }
}
