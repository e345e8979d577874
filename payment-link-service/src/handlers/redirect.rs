//! Browser return URLs from the payOS checkout page.
//!
//! These never fail towards the browser: a missing or unknown order code is
//! logged and still answered with the usual response.

use crate::config::RedirectMode;
use crate::dtos::{RedirectEcho, RedirectQuery};
use crate::models::EventSource;
use crate::services::ingress::IngressOutcome;
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

pub async fn payment_success(
    State(state): State<AppState>,
    query: Option<Query<RedirectQuery>>,
) -> Response {
    settle_and_respond(&state, query, EventSource::SuccessRedirect).await
}

pub async fn payment_cancel(
    State(state): State<AppState>,
    query: Option<Query<RedirectQuery>>,
) -> Response {
    settle_and_respond(&state, query, EventSource::CancelRedirect).await
}

fn parse_order_code(query: Option<Query<RedirectQuery>>) -> Option<i64> {
    let raw = query.and_then(|Query(q)| q.order_code)?;
    match raw.trim().parse::<i64>() {
        Ok(code) => Some(code),
        Err(_) => {
            tracing::warn!(order_code = %raw, "Unparseable order code on redirect");
            None
        }
    }
}

async fn settle_and_respond(
    state: &AppState,
    query: Option<Query<RedirectQuery>>,
    source: EventSource,
) -> Response {
    let order_code = parse_order_code(query);

    let outcome = match order_code {
        Some(code) => {
            let result = match source {
                EventSource::CancelRedirect => state.ingress.cancel_redirect(code).await,
                _ => state.ingress.success_redirect(code).await,
            };
            match result {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::error!(order_code = code, source = %source, error = %e, "Redirect settlement failed");
                    None
                }
            }
        }
        None => {
            tracing::warn!(source = %source, "Redirect without a usable order code");
            None
        }
    };

    let callbacks = &state.config.callbacks;
    match callbacks.redirect_mode {
        RedirectMode::Redirect => {
            let location = match source {
                EventSource::CancelRedirect => callbacks.cancel_redirect_url.as_str(),
                _ => callbacks.success_redirect_url.as_str(),
            };
            (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
        }
        RedirectMode::Json => {
            let transaction = outcome.as_ref().and_then(IngressOutcome::transaction);
            Json(RedirectEcho {
                order_code,
                status_code: transaction.map(|tx| tx.status_code),
                status_label: transaction.map(|tx| tx.status_code.label()),
                applied: outcome.as_ref().is_some_and(IngressOutcome::is_applied),
            })
            .into_response()
        }
    }
}
