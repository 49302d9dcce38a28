//! JSON HTTP API over a [`LivingScript`] session.
//!
//! Failures are reported in the body as `{"error": "..."}` with status 200,
//! the shape the scene editor front end expects.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use script_core::{GenerateRequest, LivingScript, ModulationParams, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

type AppState = Arc<LivingScript>;

pub fn router(session: AppState) -> Router {
    Router::new()
        .route("/api/scenes", get(list_scenes))
        .route("/api/scenes/{scene_id}", get(get_scene))
        .route("/api/generate", post(generate))
        .route("/api/versions/{scene_id}", get(list_versions))
        .route("/api/versions/{scene_id}/{version_id}", get(get_version))
        .route("/api/diff", post(diff))
        .route("/api/graph/{scene_id}", get(graph))
        .with_state(session)
}

pub async fn serve(session: LivingScript, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(Arc::new(session))).await?;
    Ok(())
}

fn error_body(err: &SessionError) -> Value {
    let message = match err {
        SessionError::SceneNotFound(_) => "Scene not found".to_string(),
        SessionError::VersionNotFound { .. } => "Version not found".to_string(),
        other => {
            tracing::warn!(error = %other, "request failed");
            other.to_string()
        }
    };
    json!({ "error": message })
}

fn rejected(rejection: &JsonRejection) -> Json<Value> {
    tracing::warn!(error = %rejection.body_text(), "rejected request body");
    Json(json!({ "error": rejection.body_text() }))
}

fn respond<T: Serialize>(result: Result<T, SessionError>) -> Json<Value> {
    let body = match result {
        Ok(value) => {
            serde_json::to_value(value).unwrap_or_else(|e| json!({ "error": e.to_string() }))
        }
        Err(err) => error_body(&err),
    };
    Json(body)
}

async fn list_scenes(State(session): State<AppState>) -> Json<Value> {
    respond(
        session
            .scenes()
            .await
            .map(|scenes| scenes.iter().cloned().collect::<Vec<_>>()),
    )
}

async fn get_scene(State(session): State<AppState>, Path(scene_id): Path<String>) -> Json<Value> {
    respond(session.scene(&scene_id).await)
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub scene_id: String,
    #[serde(default = "default_tension")]
    pub tension: f64,
    #[serde(default = "default_distance")]
    pub emotional_distance: f64,
    #[serde(default = "default_silence")]
    pub silence_density: f64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub parent_version_id: Option<String>,
}

fn default_tension() -> f64 {
    ModulationParams::default().tension
}

fn default_distance() -> f64 {
    ModulationParams::default().emotional_distance
}

fn default_silence() -> f64 {
    ModulationParams::default().silence_density
}

async fn generate(
    State(session): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Json<Value> {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&rejection),
    };
    let request = GenerateRequest::new(body.scene_id)
        .with_modulation(ModulationParams::new(
            body.tension,
            body.emotional_distance,
            body.silence_density,
        ))
        .with_dry_run(body.dry_run)
        .with_parent(body.parent_version_id);

    match session.generate(request).await {
        Ok(result) => respond(Ok(result)),
        Err(err @ SessionError::SceneNotFound(_)) => Json(error_body(&err)),
        Err(err) => {
            let mut body = error_body(&err);
            body["dialogue"] = json!("");
            Json(body)
        }
    }
}

async fn list_versions(
    State(session): State<AppState>,
    Path(scene_id): Path<String>,
) -> Json<Value> {
    respond(session.versions(&scene_id).await)
}

async fn get_version(
    State(session): State<AppState>,
    Path((scene_id, version_id)): Path<(String, String)>,
) -> Json<Value> {
    respond(session.version(&scene_id, &version_id).await)
}

#[derive(Debug, Deserialize)]
pub struct DiffBody {
    pub scene_id: String,
    pub old_version_id: String,
    pub new_version_id: String,
}

async fn diff(
    State(session): State<AppState>,
    body: Result<Json<DiffBody>, JsonRejection>,
) -> Json<Value> {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(&rejection),
    };
    respond(
        session
            .diff(&body.scene_id, &body.old_version_id, &body.new_version_id)
            .await,
    )
}

#[derive(Debug, Serialize)]
struct GraphView {
    next: Vec<script_core::NextScene>,
    paths: Vec<script_core::ScenePath>,
    warnings: Vec<String>,
}

async fn graph(State(session): State<AppState>, Path(scene_id): Path<String>) -> Json<Value> {
    let view = async {
        let next = session.next_scenes(&scene_id).await?;
        let paths = session.paths(&scene_id).await?;
        let warnings = session
            .transition_warnings()
            .await?
            .iter()
            .map(ToString::to_string)
            .collect();
        Ok::<_, SessionError>(GraphView {
            next,
            paths,
            warnings,
        })
    };
    respond(view.await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use script_core::testing::{write_fixture, ScriptedModel};
    use script_core::Scene;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(dir: &TempDir) -> AppState {
        let config = write_fixture(
            dir.path(),
            &[
                Scene::new("a").with_beat("hello").with_transition("b", "default"),
                Scene::new("b").with_transition("missing", "default"),
            ],
            &[],
        )
        .unwrap();
        let model = Arc::new(ScriptedModel::always("D: hello"));
        Arc::new(LivingScript::new(config).with_model(model))
    }

    #[tokio::test]
    async fn test_unknown_scene_is_error_body() {
        let dir = TempDir::new().unwrap();
        let Json(body) = get_scene(State(state(&dir)), Path("nope".into())).await;
        assert_eq!(body, json!({ "error": "Scene not found" }));
    }

    #[tokio::test]
    async fn test_generate_defaults_and_version_roundtrip() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let body: GenerateBody = serde_json::from_value(json!({ "scene_id": "a" })).unwrap();
        assert_eq!(body.tension, 0.5);
        assert_eq!(body.silence_density, 0.3);

        let Json(result) = generate(State(state.clone()), Ok(Json(body))).await;
        assert_eq!(result["dialogue"], "D: hello");
        assert_eq!(result["outcome"]["status"], "accepted");
        let version_id = result["version_id"].as_str().unwrap().to_string();

        let Json(listed) = list_versions(State(state.clone()), Path("a".into())).await;
        assert_eq!(listed[0]["version_id"], version_id.as_str());
        assert!(listed[0].get("text").is_none());

        let Json(missing) =
            get_version(State(state), Path(("a".into(), "a_19700101_000000".into()))).await;
        assert_eq!(missing, json!({ "error": "Version not found" }));
    }

    #[tokio::test]
    async fn test_graph_view() {
        let dir = TempDir::new().unwrap();
        let Json(view) = graph(State(state(&dir)), Path("a".into())).await;
        assert_eq!(view["next"], json!([{ "target": "b", "type": "default" }]));
        // The only branch runs into a missing scene and yields no path.
        assert_eq!(view["paths"], json!([]));
        assert_eq!(view["warnings"], json!(["b → missing: target scene not found"]));
    }

    #[tokio::test]
    async fn test_diff_missing_versions() {
        let dir = TempDir::new().unwrap();
        let body = DiffBody {
            scene_id: "a".into(),
            old_version_id: "x".into(),
            new_version_id: "y".into(),
        };
        let Json(result) = diff(State(state(&dir)), Ok(Json(body))).await;
        assert_eq!(result, json!({ "error": "Version not found" }));
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_incomplete_generate_body_is_error_body() {
        let dir = TempDir::new().unwrap();
        let (status, body) =
            post_json(router(state(&dir)), "/api/generate", r#"{"tension": 0.4}"#).await;
        assert_eq!(status, StatusCode::OK);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("scene_id"), "error was {message}");
    }

    #[tokio::test]
    async fn test_malformed_diff_body_is_error_body() {
        let dir = TempDir::new().unwrap();
        let (status, body) = post_json(router(state(&dir)), "/api/diff", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_router_generates_through_http() {
        let dir = TempDir::new().unwrap();
        let (status, body) =
            post_json(router(state(&dir)), "/api/generate", r#"{"scene_id": "a"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dialogue"], "D: hello");
    }
}
