use axum::{
    extract::rejection::JsonRejection,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ragkit::math::{evaluate, tool_catalog, CalculateRequest, ToolSpec};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const SERVICE_NAME: &str = "Math MCP Server";
const SERVICE_VERSION: &str = "1.0.0";

#[derive(Serialize)]
pub struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Serialize)]
pub struct ToolListResponse {
    tools: Vec<ToolSpec>,
}

fn error_response(status: StatusCode, code: &str, message: &str) -> axum::response::Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "status": "running",
        "version": SERVICE_VERSION,
        "endpoints": {
            "health": "/health",
            "mcp_tools": "/mcp/tools",
            "calculate": "/calculate"
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

async fn list_tools() -> impl IntoResponse {
    Json(ToolListResponse {
        tools: tool_catalog(),
    })
}

async fn calculate(
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                &rejection.body_text(),
            )
        },
    };

    match evaluate(&request) {
        Ok(result) => {
            tracing::info!(operation = %request.operation, "{}", result.message);
            Json(result).into_response()
        },
        Err(e) if e.is_client_error() => {
            tracing::debug!(operation = %request.operation, "Rejected calculation: {}", e);
            error_response(StatusCode::BAD_REQUEST, "bad_request", &e.to_string())
        },
        Err(e) => {
            tracing::error!(operation = %request.operation, "{}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                &e.to_string(),
            )
        },
    }
}

async fn sse_placeholder() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "MCP SSE transport not yet implemented",
        "alternative": "Use /mcp/tools to list tools and /calculate to execute operations"
    }))
}

pub fn build_router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/mcp/tools", get(list_tools))
        .route("/calculate", post(calculate))
        .route("/sse", get(sse_placeholder))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(path: &str) -> (StatusCode, Value) {
        send(Request::get(path).body(Body::empty()).unwrap()).await
    }

    async fn post_json(path: &str, body: &str) -> (StatusCode, Value) {
        send(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let (status, body) = get_json("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "Math MCP Server");
        assert_eq!(body["endpoints"]["calculate"], "/calculate");
    }

    #[tokio::test]
    async fn tools_use_mcp_schema_field() {
        let (status, body) = get_json("/mcp/tools").await;
        assert_eq!(status, StatusCode::OK);
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 8);
        assert_eq!(tools[3]["name"], "divide");
        assert_eq!(tools[3]["inputSchema"]["required"], json!(["a", "b"]));
    }

    mod calculate {
        use super::*;

        #[tokio::test]
        async fn adds() {
            let (status, body) =
                post_json("/calculate", r#"{"operation":"add","a":5,"b":3}"#).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"result": 8.0, "message": "5.0 + 3.0 = 8.0"}));
        }

        #[tokio::test]
        async fn divide_by_zero_is_bad_request_without_result() {
            let (status, body) =
                post_json("/calculate", r#"{"operation":"divide","a":5,"b":0}"#).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.get("result").is_none());
            assert_eq!(body["error"]["message"], "Division by zero is not allowed");
        }

        #[tokio::test]
        async fn negative_factorial_is_bad_request() {
            let (status, body) =
                post_json("/calculate", r#"{"operation":"factorial","n":-3}"#).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                body["error"]["message"],
                "Factorial is only defined for non-negative integers"
            );
        }

        #[tokio::test]
        async fn factorial_stays_integral() {
            let (status, body) =
                post_json("/calculate", r#"{"operation":"factorial","n":5}"#).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["result"], json!(120));
        }

        #[tokio::test]
        async fn missing_parameters_are_bad_request() {
            let (status, body) = post_json("/calculate", r#"{"operation":"sqrt"}"#).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["message"], "Parameter 'value' is required");
        }

        #[tokio::test]
        async fn malformed_json_is_bad_request() {
            let (status, body) = post_json("/calculate", "{not json").await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], "bad_request");
        }

        #[tokio::test]
        async fn overflow_is_internal_error() {
            let (status, body) =
                post_json("/calculate", r#"{"operation":"factorial","n":25}"#).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["error"]["code"], "internal_error");
        }
    }

    #[tokio::test]
    async fn sse_is_a_placeholder() {
        let (status, body) = get_json("/sse").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("not yet implemented"));
    }
}
