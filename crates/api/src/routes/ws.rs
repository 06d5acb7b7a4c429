//! `GET /ws/progress?jobId={}&token={}`: the WebSocket upgrade that streams
//! a job's progress envelopes. Token is validated against the coordinator
//! at attach time; a terminal envelope is followed by a normal close.

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/progress", web::get().to(progress_ws));
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    #[serde(rename = "jobId")]
    job_id: Uuid,
    token: Uuid,
}

fn policy_close(reason: &str) -> Option<CloseReason> {
    Some(CloseReason {
        code: CloseCode::Policy,
        description: Some(reason.to_string()),
    })
}

async fn progress_ws(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<ProgressQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let Some(handle) = state.registry.get(query.job_id) else {
        let _ = session.close(policy_close("job not found")).await;
        return Ok(response);
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    if handle.attach_websocket(tx, query.token).await.is_err() {
        let _ = session.close(policy_close("invalid or expired token")).await;
        return Ok(response);
    }

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                incoming = msg_stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let msg_type = serde_json::from_str::<serde_json::Value>(&text)
                                .ok()
                                .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string));
                            match msg_type.as_deref() {
                                Some("ready") => {
                                    let _ = handle.client_ready().await;
                                }
                                Some("cancel") => {
                                    let _ = handle.cancel("canceled by client").await;
                                }
                                _ => {}
                            }
                        }
                        Some(Ok(Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(reason))) => {
                            let _ = session.close(reason).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                outgoing = rx.recv() => {
                    match outgoing {
                        Some(envelope) => {
                            let terminal = envelope.is_terminal();
                            let Ok(text) = serde_json::to_string(&envelope) else { continue };
                            if session.text(text).await.is_err() {
                                break;
                            }
                            if terminal {
                                let _ = session
                                    .close(Some(CloseReason::from(CloseCode::Normal)))
                                    .await;
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    Ok(response)
}
