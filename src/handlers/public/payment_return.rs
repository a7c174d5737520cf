//! Synchronous shopper return from the hosted payment page.

use std::collections::HashMap;

use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, header},
    response::Redirect,
};

use crate::checkout::{
    order_received_url, payment_awaiting_reference_note, payment_completed_note,
    payment_failed_note, unpayable_order_note,
};
use crate::crypto::constant_time_eq;
use crate::db::AppState;
use crate::error::Result;
use crate::models::Order;
use crate::payments::SessionResult;
use crate::store::OrderStore;
use crate::util::append_query_params;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    De,
}

/// First supported language in `Accept-Language`, English otherwise.
pub fn preferred_language(headers: &HeaderMap) -> Lang {
    let Some(value) = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
    else {
        return Lang::En;
    };

    for tag in value.split(',') {
        let lang = tag.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if lang.starts_with("de") {
            return Lang::De;
        }
        if lang.starts_with("en") {
            return Lang::En;
        }
    }
    Lang::En
}

/// Why the shopper was sent back to checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    InvalidSession,
    Unverified,
    PaymentFailed,
    OrderClosed,
}

impl Notice {
    pub fn code(self) -> &'static str {
        match self {
            Notice::InvalidSession => "invalid_session",
            Notice::Unverified => "unverified",
            Notice::PaymentFailed => "payment_failed",
            Notice::OrderClosed => "order_closed",
        }
    }

    pub fn message(self, lang: Lang) -> &'static str {
        match (self, lang) {
            (Notice::InvalidSession, Lang::En) => "Payment session not found",
            (Notice::InvalidSession, Lang::De) => "Zahlungssitzung nicht gefunden",
            (Notice::Unverified, Lang::En) => {
                "Unable to verify payment status. Please contact support."
            }
            (Notice::Unverified, Lang::De) => {
                "Der Zahlungsstatus konnte nicht überprüft werden. Bitte kontaktieren Sie den Support."
            }
            (Notice::PaymentFailed, Lang::En) => "Payment was not successful. Please try again.",
            (Notice::PaymentFailed, Lang::De) => {
                "Die Zahlung war nicht erfolgreich. Bitte versuchen Sie es erneut."
            }
            (Notice::OrderClosed, Lang::En) => {
                "This order can no longer be paid. Please contact support."
            }
            (Notice::OrderClosed, Lang::De) => {
                "Diese Bestellung kann nicht mehr bezahlt werden. Bitte kontaktieren Sie den Support."
            }
        }
    }
}

fn checkout_redirect(state: &AppState, notice: Notice, lang: Lang) -> Redirect {
    Redirect::to(&append_query_params(
        &state.checkout_url,
        &[("notice", notice.code()), ("message", notice.message(lang))],
    ))
}

/// The four parameters the return URL must carry, all non-empty.
struct ReturnParams {
    session_id: String,
    session_result: String,
    order_id: String,
    key: String,
}

impl ReturnParams {
    fn parse(query: Option<&str>) -> Option<Self> {
        let params: HashMap<String, String> = url::form_urlencoded::parse(query?.as_bytes())
            .into_owned()
            .collect();
        let get = |name: &str| {
            params
                .get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Some(Self {
            session_id: get("sessionId")?,
            session_result: get("sessionResult")?,
            order_id: get("order_id")?,
            key: get("key")?,
        })
    }
}

/// Load the order the return claims, checking key, session binding and gateway.
fn verified_order<S: OrderStore + ?Sized>(
    store: &S,
    state: &AppState,
    params: &ReturnParams,
) -> Result<Option<Order>> {
    let Some(order) = store.find_by_id(&params.order_id)? else {
        tracing::warn!(order_id = %params.order_id, "Return for unknown order");
        return Ok(None);
    };

    let key_ok = store
        .get_security_key(&order.id)?
        .is_some_and(|expected| constant_time_eq(&expected, &params.key));
    if !key_ok {
        tracing::warn!(order_id = %order.id, "Return rejected - order key mismatch");
        return Ok(None);
    }

    let session_matches = store
        .find_by_session_id(&params.session_id)?
        .is_some_and(|bound| bound.id == order.id);
    if !session_matches {
        tracing::warn!(
            order_id = %order.id,
            session_id = %params.session_id,
            "Return rejected - session is not bound to this order"
        );
        return Ok(None);
    }

    if !order.belongs_to(&state.gateway.gateway_id) {
        tracing::warn!(
            order_id = %order.id,
            payment_method = %order.payment_method_id,
            "Return rejected - order was not placed with this gateway"
        );
        return Ok(None);
    }

    Ok(Some(order))
}

/// GET /adyen/return
pub async fn payment_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Redirect> {
    let lang = preferred_language(&headers);

    let Some(params) = ReturnParams::parse(query.as_deref()) else {
        tracing::warn!("Return is missing required parameters");
        return Ok(checkout_redirect(&state, Notice::InvalidSession, lang));
    };

    tracing::info!(
        order_id = %params.order_id,
        session_id = %params.session_id,
        "Shopper returned from hosted checkout"
    );

    let conn = state.db.get()?;

    let Some(order) = verified_order(&*conn, &state, &params)? else {
        return Ok(checkout_redirect(&state, Notice::InvalidSession, lang));
    };

    if order.is_paid() {
        tracing::info!(order_id = %order.id, "Order already paid - redirecting to success page");
        return Ok(Redirect::to(&order_received_url(&state, &order)));
    }

    let Some(result) = SessionResult::decode(&params.session_result) else {
        tracing::error!(order_id = %order.id, "Unable to decode sessionResult");
        return Ok(checkout_redirect(&state, Notice::Unverified, lang));
    };

    tracing::info!(
        order_id = %order.id,
        result_code = %result.result_code,
        psp_reference = result.psp_reference().unwrap_or_default(),
        "Session result decoded"
    );

    if result.is_success() {
        if conn.mark_paid(&order.id, result.psp_reference())? {
            let note = match result.psp_reference() {
                Some(psp) => payment_completed_note(psp, &result.result_code),
                None => payment_awaiting_reference_note(&result.result_code),
            };
            conn.append_note(&order.id, &note)?;

            if let Some(mut cart) = conn.cart_for(&order)? {
                cart.empty()?;
            }
            tracing::info!(order_id = %order.id, "Order paid on return");
        } else {
            let current = conn.find_by_id(&order.id)?.unwrap_or_else(|| order.clone());
            if !current.is_paid() {
                tracing::warn!(
                    order_id = %order.id,
                    status = current.status.as_ref(),
                    "Payment authorised for an order that can no longer be paid"
                );
                let known = result
                    .psp_reference()
                    .is_some_and(|psp| current.records_transaction(psp));
                if !known {
                    conn.append_note(
                        &order.id,
                        &unpayable_order_note(result.psp_reference(), current.status),
                    )?;
                }
                return Ok(checkout_redirect(&state, Notice::OrderClosed, lang));
            }
            tracing::info!(order_id = %order.id, "Order was claimed concurrently - no side effects");
        }
        return Ok(Redirect::to(&order_received_url(&state, &order)));
    }

    if conn.mark_failed(&order.id)? {
        conn.append_note(&order.id, &payment_failed_note(&result.result_code))?;
    }
    tracing::warn!(order_id = %order.id, result_code = %result.result_code, "Payment not successful");
    Ok(checkout_redirect(&state, Notice::PaymentFailed, lang))
}
