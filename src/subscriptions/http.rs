//! Local HTTP intake: `POST /notify` on 127.0.0.1.

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{Method, StatusCode},
    routing::post,
};
use nova_notifications_util::{IngestError, NotifyRequest, NotifyResponse};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::{net::TcpListener, sync::mpsc::Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    constants::{ACCEPTED_MESSAGE, MAX_BODY_BYTES},
    handlers::messages::Input,
};

type Reply = (StatusCode, Json<NotifyResponse>);

pub fn router(tx: Sender<Input>) -> Router {
    Router::new()
        .route("/notify", post(notify))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(tx)
}

/// Bind the endpoint. Failing here is fatal for the caller.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP endpoint on {addr}"))?;
    info!("HTTP endpoint listening on http://{addr}/notify");
    Ok(listener)
}

pub async fn serve(
    listener: TcpListener,
    tx: Sender<Input>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, router(tx))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("HTTP endpoint failed")
}

async fn notify(State(tx): State<Sender<Input>>, body: Result<Bytes, BytesRejection>) -> Reply {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Rejected HTTP body: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(NotifyResponse::rejected(rejection.body_text())),
            );
        }
    };

    let request = match NotifyRequest::from_json(&body).and_then(NotifyRequest::validate) {
        Ok(request) => request,
        Err(err) => return bad_request(&err),
    };
    debug!(title = %request.title, "notification request received");

    if let Err(err) = tx.send(Input::Notify(request)).await {
        error!("Failed to hand notification to the orchestrator: {err}");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(NotifyResponse::rejected("Service Unavailable")),
        );
    }

    (
        StatusCode::OK,
        Json(NotifyResponse::accepted(ACCEPTED_MESSAGE)),
    )
}

fn bad_request(err: &IngestError) -> Reply {
    warn!("Rejected notification request: {err}");
    (
        StatusCode::BAD_REQUEST,
        Json(NotifyResponse::rejected(err.client_message())),
    )
}

async fn method_not_allowed() -> Reply {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(NotifyResponse::rejected("Method Not Allowed")),
    )
}

// The method is checked before the path.
async fn fallback(method: Method) -> Reply {
    if method != Method::POST {
        return method_not_allowed().await;
    }
    (
        StatusCode::NOT_FOUND,
        Json(NotifyResponse::rejected("Not Found")),
    )
}
