mod common;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        extract::{Request, State},
        http::{self, StatusCode},
        routing::get,
    };
    use common::*;
    use cookie_sessions::cookie::SameSite;
    use cookie_sessions::{CookieOptions, CookieStore, RequestContext, SessionLayer, Store};
    use http::header::{COOKIE, SET_COOKIE};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn insert_handler(
        State(store): State<Arc<CookieStore>>,
        ctx: RequestContext,
    ) -> Result<String, StatusCode> {
        let user = TestUser {
            id: 1,
            name: "Test".to_string(),
        };
        let session = store
            .get(&ctx, "test_sess")
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .into_session();
        session
            .insert("user", &user)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        Ok("Success".to_string())
    }

    async fn get_handler(
        State(store): State<Arc<CookieStore>>,
        ctx: RequestContext,
    ) -> Result<String, StatusCode> {
        let session = store
            .get(&ctx, "test_sess")
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .into_session();
        let user: Option<TestUser> = session
            .get("user")
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        Ok(user
            .map(|u| u.name)
            .unwrap_or_else(|| "Not found".to_string()))
    }

    async fn delete_handler(
        State(store): State<Arc<CookieStore>>,
        ctx: RequestContext,
    ) -> Result<String, StatusCode> {
        let session = store
            .get(&ctx, "test_sess")
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .into_session();
        session.set_max_age(-1);
        Ok("Deleted".to_string())
    }

    async fn untouched_handler(_ctx: RequestContext) -> &'static str {
        "Nothing to save"
    }

    fn create_test_app() -> Router {
        let store = cookie_store();
        store.set_options(
            CookieOptions::build()
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(true)
                .max_age(60)
                .path("/"),
        );

        Router::new()
            .route("/set", get(insert_handler))
            .route("/get", get(get_handler))
            .route("/delete", get(delete_handler))
            .route("/untouched", get(untouched_handler))
            .layer(SessionLayer::new())
            .with_state(store)
    }

    async fn body_string(response: http::Response<Body>) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn session_cookie(response: &http::Response<Body>) -> String {
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("Set-Cookie header should be present")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_session_extraction_new_session() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/set").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let cookie_header = response
            .headers()
            .get(SET_COOKIE)
            .expect("Set-Cookie header should be present");

        let cookie_str = cookie_header.to_str().unwrap();
        assert!(cookie_str.contains("test_sess="));
        assert!(cookie_str.contains("HttpOnly"));
        assert!(cookie_str.contains("Secure"));
        assert!(cookie_str.contains("SameSite=Lax"));
        assert!(cookie_str.contains("Max-Age=60"));
    }

    #[tokio::test]
    async fn test_session_extraction_with_existing_cookie() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/set").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = session_cookie(&response);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get")
                    .header(COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Test");
    }

    #[tokio::test]
    async fn test_delete_expires_the_cookie() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/set").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = session_cookie(&response);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/delete")
                    .header(COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("test_sess=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_untouched_request_sets_no_cookie() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/untouched")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_missing_session_layer() {
        let app = Router::new()
            .route("/set", get(insert_handler))
            .with_state(cookie_store());

        let response = app
            .oneshot(Request::builder().uri("/set").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_tampered_cookie() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get")
                    .header(COOKIE, "test_sess=invalid_session_value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "Not found");
    }
}
