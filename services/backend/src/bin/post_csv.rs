/// CSV解析 Lambdaエントリポイント
///
/// Base64エンコードされたCSVを受け取り、列名と行数を返す。
/// 外部サービスには接続しない。
use cms_backend::application::{handle_post_csv, respond};
use cms_backend::infrastructure::init_logging;
use lambda_http::{Body, Error, Request, Response, run, service_fn};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    info!("post_csv Lambda関数を初期化");

    run(service_fn(handler)).await
}

async fn handler(request: Request) -> Result<Response<Body>, Error> {
    Ok(respond(handle_post_csv(&request)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::Request as HttpRequest;

    /// ハンドラーがCORSヘッダー付きのJSONを返す
    #[tokio::test]
    async fn test_handler_returns_json_with_cors() {
        init_logging();

        // "a,b\n1,2\n"
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/csv")
            .body(Body::Text(r#"{"csvData": "YSxiCjEsMgo="}"#.to_string()))
            .unwrap();

        let response = handler(request).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        let body = match response.body() {
            Body::Text(text) => text.clone(),
            _ => panic!("予期しないBody型"),
        };
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["columns"], serde_json::json!(["a", "b"]));
        assert_eq!(parsed["row_count"], 1);
    }

    /// ボディがない場合は400
    #[tokio::test]
    async fn test_handler_rejects_empty_body() {
        init_logging();

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/csv")
            .body(Body::Empty)
            .unwrap();

        let response = handler(request).await.unwrap();

        assert_eq!(response.status(), 400);
    }
}
