
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::WebConfig;
use crate::context::RagContext;
use crate::query::{ErrorKind, QueryError, QueryResult};
use crate::{RagError, Result};

const MAX_BODY_SIZE: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    context: Arc<RagContext>,
    started_at: Instant,
}

#[derive(Debug, Default, Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    embedding_model: String,
    uptime_secs: u64,
}

/// Routes of the question form: `GET /`, `POST /` and `GET /health`
#[inline]
pub fn build_router(context: Arc<RagContext>) -> Router {
    let state = AppState {
        context,
        started_at: Instant::now(),
    };

    Router::new()
        .route("/", get(form_handler).post(ask_handler))
        .route("/health", get(health_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn form_handler() -> Html<String> {
    Html(render_page("", None))
}

async fn ask_handler(State(state): State<AppState>, Form(form): Form<AskForm>) -> Response {
    let question = form.question.trim();
    if question.is_empty() {
        return Html(render_page("", None)).into_response();
    }

    info!("Web question received ({} chars)", question.chars().count());
    let outcome = state.context.pipeline().ask(question).await;
    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!("Web question failed ({:?}): {}", e.kind(), e);
            match e.kind() {
                ErrorKind::Input => StatusCode::BAD_REQUEST,
                ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
                ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    };

    (status, Html(render_page(question, Some(&outcome)))).into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        embedding_model: state.context.manifest().embedding_model.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

fn render_page(
    question: &str,
    outcome: Option<&std::result::Result<QueryResult, QueryError>>,
) -> String {
    let mut body = String::new();

    match outcome {
        Some(Ok(result)) => {
            let _ = write!(
                body,
                "<p><strong>Resposta:</strong> {}</p>\n<h3>Fontes:</h3>\n<ul>\n",
                html_escape::encode_text(&result.answer)
            );
            for source in &result.sources {
                let _ = writeln!(body, "<li>{}</li>", html_escape::encode_text(&source.source));
            }
            body.push_str("</ul>\n");
        }
        Some(Err(e)) => {
            let _ = writeln!(
                body,
                "<p class=\"erro\">❌ Erro: {}</p>",
                html_escape::encode_text(&e.to_string())
            );
        }
        None => {}
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<title>ANTT RAG Assistant</title>
</head>
<body>
<h1>🛣️ ANTT RAG Assistant</h1>
<form method="post" action="/">
<label for="question">Digite sua pergunta:</label>
<input type="text" id="question" name="question" value="{}" size="80">
<button type="submit">Enviar</button>
</form>
{}</body>
</html>
"#,
        html_escape::encode_double_quoted_attribute(question),
        body
    )
}

/// HTTP server for the question form
pub struct WebServer {
    addr: SocketAddr,
    context: Arc<RagContext>,
}

impl WebServer {
    #[inline]
    pub fn new(config: &WebConfig, context: Arc<RagContext>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
            .parse()
            .map_err(|e| {
                RagError::Config(format!(
                    "Invalid web bind address {}:{}: {}",
                    config.bind, config.port, e
                ))
            })?;

        if config.bind == "0.0.0.0" {
            warn!("Web form is listening on all interfaces");
        }

        Ok(Self { addr, context })
    }

    #[inline]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until Ctrl-C
    #[inline]
    pub async fn serve(self) -> Result<()> {
        let router = build_router(self.context);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("Web form listening on http://{}", self.addr);
        println!("🌐 Acesse http://{}", self.addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Web form shutting down");
            })
            .await?;

        Ok(())
    }
}
