use axum::{
    extract::{Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use spintrack_types::{
    api::{SimBetRequest, SimBulkRequest},
    BetReceipt, BetRejection, BetRequest, JackpotSlots, PlanEntry, Round, SettlementResult,
    TrackSlot,
};

use crate::{sim, App};

/// Simple health response for basic liveness checks.
#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

/// Everything a client needs to draw the board and catch up mid-round.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateResponse {
    track: Vec<TrackSlot>,
    rows: u32,
    cols: u32,
    jackpot_slots: JackpotSlots,
    respin_slots: Vec<u32>,
    jackpot_pool: u64,
    current_round: Option<Round>,
    last_result: Option<SettlementResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BetAcceptedResponse {
    ok: bool,
    round_id: u64,
    accepted: Vec<PlanEntry>,
    reused: bool,
    jackpot_pool: u64,
}

/// Rejections travel as HTTP 200 with `ok: false` so that clients handle
/// them on the same path as acceptances. `current`/`required` are only
/// present on insufficient-points rejections.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BetRejectedResponse {
    ok: bool,
    reason: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<u64>,
}

#[derive(Serialize)]
struct SimDisabledResponse {
    ok: bool,
    reason: &'static str,
}

#[derive(Deserialize)]
pub(super) struct LeaderboardQuery {
    limit: Option<usize>,
}

fn accepted_payload(receipt: BetReceipt) -> BetAcceptedResponse {
    BetAcceptedResponse {
        ok: true,
        round_id: receipt.round_id,
        accepted: receipt.accepted,
        reused: receipt.reused,
        jackpot_pool: receipt.jackpot_pool,
    }
}

fn rejected_payload(rejection: BetRejection) -> BetRejectedResponse {
    let (current, required) = match &rejection {
        BetRejection::InsufficientPoints { current, required } => {
            (Some(*current), Some(*required))
        }
        _ => (None, None),
    };
    BetRejectedResponse {
        ok: false,
        reason: rejection.code(),
        message: rejection.to_string(),
        current,
        required,
    }
}

fn bet_response(result: Result<BetReceipt, BetRejection>) -> Response {
    match result {
        Ok(receipt) => Json(accepted_payload(receipt)).into_response(),
        Err(rejection) => Json(rejected_payload(rejection)).into_response(),
    }
}

fn simulator_disabled() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(SimDisabledResponse {
            ok: false,
            reason: "simulator_disabled",
        }),
    )
        .into_response()
}

/// Basic health check endpoint, always returns ok if the service can respond.
pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

/// Board layout plus the live round and last result, for clients joining
/// or reconnecting mid-round.
pub(super) async fn state(AxumState(app): AxumState<Arc<App>>) -> Response {
    let plan = app.plan();
    Json(StateResponse {
        track: plan.track.clone(),
        rows: plan.rows,
        cols: plan.cols,
        jackpot_slots: plan.jackpot,
        respin_slots: plan.respin_slots.clone(),
        jackpot_pool: app.jackpot_pool(),
        current_round: app.current_round(),
        last_result: app.last_result(),
    })
    .into_response()
}

pub(super) async fn current_round(AxumState(app): AxumState<Arc<App>>) -> Response {
    Json(app.current_round()).into_response()
}

pub(super) async fn latest_result(AxumState(app): AxumState<Arc<App>>) -> Response {
    Json(app.last_result()).into_response()
}

pub(super) async fn leaderboard(
    AxumState(app): AxumState<Arc<App>>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    Json(app.leaderboard(query.limit)).into_response()
}

/// Place a wager for the current round.
pub(super) async fn bet(
    AxumState(app): AxumState<Arc<App>>,
    Json(request): Json<BetRequest>,
) -> Response {
    bet_response(app.place_bet(request))
}

/// Single simulated wager; missing fields are filled with random values.
pub(super) async fn sim_bet(
    AxumState(app): AxumState<Arc<App>>,
    Json(request): Json<SimBetRequest>,
) -> Response {
    if !app.sim_enabled() {
        return simulator_disabled();
    }
    bet_response(sim::place_one(&app, request))
}

/// Burst of simulated wagers from distinct random users.
pub(super) async fn sim_bulk(
    AxumState(app): AxumState<Arc<App>>,
    Json(request): Json<SimBulkRequest>,
) -> Response {
    if !app.sim_enabled() {
        return simulator_disabled();
    }
    Json(sim::place_bulk(&app, request)).into_response()
}

pub(super) async fn metrics(AxumState(app): AxumState<Arc<App>>) -> Response {
    Json(app.metrics().snapshot()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_payload_keeps_the_receipt_fields() {
        let payload = accepted_payload(BetReceipt {
            round_id: 4,
            accepted: vec![PlanEntry {
                slot_id: 7,
                amount: 5,
            }],
            reused: true,
            jackpot_pool: 12,
        });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["roundId"], 4);
        assert_eq!(value["reused"], true);
        assert_eq!(value["jackpotPool"], 12);
        assert_eq!(value["accepted"][0]["slotId"], 7);
    }

    #[test]
    fn rejection_payload_carries_balance_context() {
        let payload = rejected_payload(BetRejection::InsufficientPoints {
            current: 10,
            required: 25,
        });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["reason"], "insufficient_points");
        assert_eq!(value["current"], 10);
        assert_eq!(value["required"], 25);
    }

    #[test]
    fn plain_rejections_omit_the_balance_fields() {
        let payload = rejected_payload(BetRejection::BetClosed);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["reason"], "bet_closed");
        assert!(value.get("current").is_none());
        assert!(value.get("required").is_none());
    }
}
