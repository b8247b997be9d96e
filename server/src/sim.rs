//! Local load generator. Fills in whatever the caller left blank so a bare
//! `POST /api/sim/bet` still produces a plausible wager.

use rand::Rng;

use spintrack_types::api::{SimBetRequest, SimBulkRequest, SimBulkResponse};
use spintrack_types::{BetReceipt, BetRejection, BetRequest};

use crate::{now_ms, App};

fn random_user(rng: &mut impl Rng) -> String {
    format!("u{}", rng.gen_range(1_000..=999_999))
}

pub fn place_one(app: &App, req: SimBetRequest) -> Result<BetReceipt, BetRejection> {
    let mut rng = rand::thread_rng();
    let track_len = i64::from(app.track_len().max(1));
    let user_id = req
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| random_user(&mut rng));
    let slot_id = req.slot_id.unwrap_or_else(|| rng.gen_range(0..track_len));
    let amount = req.amount.unwrap_or_else(|| rng.gen_range(1..=10));
    let source_msg_id = req
        .source_msg_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("{user_id}-{}", now_ms()));

    app.place_bet(BetRequest {
        user_id,
        slot_id: Some(slot_id),
        amount: Some(amount),
        source_msg_id: Some(source_msg_id),
        ..BetRequest::default()
    })
}

pub fn place_bulk(app: &App, req: SimBulkRequest) -> SimBulkResponse {
    let mut rng = rand::thread_rng();
    let track_len = i64::from(app.track_len().max(1));
    let requested = req.users.unwrap_or(100);
    let min_amount = req.min_amount.unwrap_or(1).max(1);
    let max_amount = req.max_amount.unwrap_or(10).max(min_amount);
    let stamp = now_ms();

    let mut accepted = 0;
    let mut rejected = 0;
    for index in 0..requested {
        let user_id = random_user(&mut rng);
        let result = app.place_bet(BetRequest {
            user_id,
            slot_id: Some(rng.gen_range(0..track_len)),
            amount: Some(rng.gen_range(min_amount..=max_amount) as i64),
            source_msg_id: Some(format!("sim-{stamp}-{index}")),
            ..BetRequest::default()
        });
        match result {
            Ok(_) => accepted += 1,
            Err(_) => rejected += 1,
        }
    }
    SimBulkResponse {
        requested,
        accepted,
        rejected,
    }
}
