//! Request extractors that keep rejections on the JSON error contract.
//!
//! axum's own `Json` and `Query` reject malformed input with plain-text
//! bodies. These wrappers route the rejection through `ApiError`, so a bad
//! request body or query string produces the same `{"message": ...}` shape
//! as every other failure.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ApiError;

/// Drop-in replacement for `axum::Json` with JSON-bodied rejections.
#[derive(Debug)]
pub struct Json<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(ApiError::JsonParse(rejection.body_text())),
        }
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Drop-in replacement for `axum::extract::Query`; deserialization failures
/// come back as 400 with a JSON body.
#[derive(Debug)]
pub struct Query<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Query(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct MessageBody {
        to: Uuid,
        content: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PriceQuery {
        min_price: Option<f64>,
    }

    fn json_request(body: &str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_message(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_field_rejects_with_json_message() {
        let req = json_request(r#"{"content":"hi"}"#);
        let err = Json::<MessageBody>::from_request(req, &())
            .await
            .expect_err("body without \"to\" must be rejected");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );

        let body = body_message(response).await;
        assert!(body.get("message").and_then(|m| m.as_str()).is_some());
    }

    #[tokio::test]
    async fn malformed_json_rejects_with_json_message() {
        let req = json_request("{not json");
        let err = Json::<MessageBody>::from_request(req, &())
            .await
            .expect_err("malformed body must be rejected");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_message(response).await;
        assert!(body.get("message").and_then(|m| m.as_str()).is_some());
    }

    #[tokio::test]
    async fn well_formed_body_passes_through() {
        let id = Uuid::new_v4();
        let req = json_request(&format!(r#"{{"to":"{}","content":"hi"}}"#, id));
        let Json(parsed) = Json::<MessageBody>::from_request(req, &())
            .await
            .expect("valid body must parse");

        assert_eq!(parsed.to, id);
        assert_eq!(parsed.content, "hi");
    }

    #[tokio::test]
    async fn non_numeric_query_param_rejects_with_json_message() {
        let (mut parts, _) = HttpRequest::builder()
            .uri("/api/listings?minPrice=abc")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let err = Query::<PriceQuery>::from_request_parts(&mut parts, &())
            .await
            .expect_err("non-numeric minPrice must be rejected");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_message(response).await;
        assert!(body.get("message").and_then(|m| m.as_str()).is_some());
    }

    #[tokio::test]
    async fn valid_query_param_passes_through() {
        let (mut parts, _) = HttpRequest::builder()
            .uri("/api/listings?minPrice=10.5")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let Query(parsed) = Query::<PriceQuery>::from_request_parts(&mut parts, &())
            .await
            .expect("valid query must parse");

        assert_eq!(parsed.min_price, Some(10.5));
    }
}
