//! Cancellation and deadline integration tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ssostore_storage::{CallContext, StorageError};

    use crate::{cleanup_bucket, s3_client, storage, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_not_create_bucket_with_cancelled_context() {
        let storage = storage();
        let client = s3_client();
        let bucket = test_bucket_name("cancelled");
        let ctx = CallContext::new();
        ctx.cancel();

        let err = storage.make_bucket(&ctx, &bucket).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled { .. }));

        let head = client.head_bucket().bucket(&bucket).send().await;
        assert!(head.is_err(), "bucket must not have been created");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fail_with_elapsed_deadline() {
        let storage = storage();
        let ctx = CallContext::with_timeout(Duration::ZERO);

        let err = storage.list_buckets(&ctx).await.unwrap_err();
        assert!(matches!(err, StorageError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fail_reads_after_cancel() {
        let storage = storage();
        let client = s3_client();
        let ctx = CallContext::new();
        let bucket = test_bucket_name("readcancel");
        storage.make_bucket(&ctx, &bucket).await.expect("make_bucket");
        storage
            .put_object(&ctx, &bucket, "a.txt", "hello")
            .await
            .expect("put_object");

        let reader = storage
            .get_object(&ctx, &bucket, "a.txt")
            .await
            .expect("get_object");
        ctx.cancel();
        assert!(reader.read_to_vec().await.is_err());

        cleanup_bucket(&client, &bucket).await;
    }
}
