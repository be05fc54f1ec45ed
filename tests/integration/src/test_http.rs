//! HTTP API integration tests against a running `ssostore-server`.

#[cfg(test)]
mod tests {
    use crate::{cleanup_bucket, s3_client, server_url, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_ping() {
        let resp = reqwest::get(format!("{}/", server_url()))
            .await
            .expect("ping");
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().contains_key("x-request-id"));

        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["stat_code"], 200);
        assert_eq!(body["stat_msg"], "Ping Server OK");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_object_over_http() {
        let http = reqwest::Client::new();
        let client = s3_client();
        let bucket = test_bucket_name("http");
        let base = format!("{}/api/v1/storage/buckets/{bucket}", server_url());

        let resp = http.put(&base).send().await.expect("make bucket");
        assert_eq!(resp.status(), 201);

        let resp = http
            .put(format!("{base}/objects/dir/a.txt"))
            .body("hello")
            .send()
            .await
            .expect("put object");
        assert_eq!(resp.status(), 201);

        let resp = http
            .get(format!("{base}/objects/dir/a.txt"))
            .send()
            .await
            .expect("get object");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.bytes().await.expect("body").as_ref(), b"hello");

        let resp = http.delete(&base).send().await.expect("remove bucket");
        assert_eq!(resp.status(), 409);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_not_found_for_missing_bucket() {
        let bucket = test_bucket_name("missing");
        let resp = reqwest::get(format!(
            "{}/api/v1/storage/buckets/{bucket}/objects",
            server_url()
        ))
        .await
        .expect("list objects");
        assert_eq!(resp.status(), 404);

        let body: serde_json::Value = resp.json().await.expect("json body");
        assert_eq!(body["stat_code"], 404);
        assert!(body.get("data").is_none());
    }
}
