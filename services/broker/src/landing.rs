//! Landing-page HTTP (§6): a minimal page naming the external web-UI
//! host:port, served with `axum` the way the teacher's `server`/`receiver`
//! binaries build their routers.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;

#[derive(Clone)]
pub struct LandingState {
    pub webgui_host: String,
    pub webgui_port: u16,
    pub template_root: String,
}

pub fn build_router(state: LandingState) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/logo.png", get(logo))
        .with_state(state)
}

async fn landing_page(State(state): State<LandingState>) -> Html<String> {
    Html(format!(
        "<html><head><title>pilight broker</title></head><body>\
         <p>Web UI is available at <a href=\"http://{host}:{port}/\">{host}:{port}</a></p>\
         </body></html>",
        host = state.webgui_host,
        port = state.webgui_port,
    ))
}

async fn logo(State(state): State<LandingState>) -> Response {
    let path = std::path::Path::new(&state.template_root).join("logo.png");
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "logo.png not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn landing_page_names_the_webgui_host_and_port() {
        let router = build_router(LandingState {
            webgui_host: "192.168.1.10".into(),
            webgui_port: 8080,
            template_root: "/tmp".into(),
        });
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
