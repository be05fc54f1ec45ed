//! Object transfer integration tests.

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use ssostore_storage::{CallContext, DEFAULT_PART_SIZE, MIN_PART_SIZE, StorageError};

    use crate::{cleanup_bucket, create_test_bucket, s3_client, storage};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_put_get_and_remove_object() {
        let storage = storage();
        let client = s3_client();
        let ctx = CallContext::new();
        let bucket = create_test_bucket(&storage, "object").await;

        let info = storage
            .put_object(&ctx, &bucket, "a.txt", "hello")
            .await
            .expect("put_object");
        assert_eq!(info.size, 5);
        assert!(info.etag.is_some());

        let body = storage
            .get_object(&ctx, &bucket, "a.txt")
            .await
            .expect("get_object")
            .read_to_vec()
            .await
            .expect("read body");
        assert_eq!(body, b"hello");

        storage
            .remove_object(&ctx, &bucket, "a.txt")
            .await
            .expect("remove_object");
        let listing: Vec<_> = storage
            .list_objects(&ctx, &bucket)
            .await
            .expect("list_objects")
            .try_collect()
            .await
            .expect("listing");
        assert!(listing.is_empty());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_missing_key() {
        let storage = storage();
        let client = s3_client();
        let bucket = create_test_bucket(&storage, "nokey").await;

        let err = storage
            .get_object(&CallContext::new(), &bucket, "missing.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NoSuchKey { .. }), "{err}");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_large_payload_in_parts() {
        let storage = storage();
        let client = s3_client();
        let ctx = CallContext::new();
        let bucket = create_test_bucket(&storage, "multipart").await;

        let data: Vec<u8> = (0..DEFAULT_PART_SIZE * 2 + 1024)
            .map(|i| (i % 251) as u8)
            .collect();
        let info = storage
            .put_object(&ctx, &bucket, "big.bin", data.clone())
            .await
            .expect("put_object");
        assert_eq!(info.size, data.len() as u64);

        let body = storage
            .get_object(&ctx, &bucket, "big.bin")
            .await
            .expect("get_object")
            .read_to_vec()
            .await
            .expect("read body");
        assert_eq!(body, data);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_transfer_files() {
        let storage = storage();
        let client = s3_client();
        let ctx = CallContext::new();
        let bucket = create_test_bucket(&storage, "files").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("upload.txt");
        let dst = dir.path().join("download.txt");
        tokio::fs::write(&src, b"file body").await.expect("write src");

        storage
            .fput_object(&ctx, &bucket, "file.txt", &src)
            .await
            .expect("fput_object");
        storage
            .fget_object(&ctx, &bucket, "file.txt", &dst)
            .await
            .expect("fget_object");

        assert_eq!(tokio::fs::read(&dst).await.expect("read dst"), b"file body");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_large_file_in_parts() {
        let storage = storage().with_part_size(MIN_PART_SIZE);
        let client = s3_client();
        let ctx = CallContext::new();
        let bucket = create_test_bucket(&storage, "bigfile").await;
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("big.bin");
        let dst = dir.path().join("big.out");

        // Two full parts and a short trailing one.
        let data: Vec<u8> = (0..MIN_PART_SIZE * 2 + 4097)
            .map(|i| (i % 241) as u8)
            .collect();
        tokio::fs::write(&src, &data).await.expect("write src");

        let info = storage
            .fput_object(&ctx, &bucket, "big.bin", &src)
            .await
            .expect("fput_object");
        assert_eq!(info.size, data.len() as u64);
        assert!(
            info.etag.as_deref().is_some_and(|etag| etag.ends_with("-3")),
            "multipart etag should carry the part count: {:?}",
            info.etag
        );

        storage
            .fget_object(&ctx, &bucket, "big.bin", &dst)
            .await
            .expect("fget_object");
        assert_eq!(tokio::fs::read(&dst).await.expect("read dst"), data);

        cleanup_bucket(&client, &bucket).await;
    }
}
