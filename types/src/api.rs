use serde::{Deserialize, Serialize};

use crate::ledger::PlanEntry;

/// One line of an incoming bet plan. Signed so that nonsense amounts reach
/// the validator instead of failing deserialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetPlanEntry {
    pub slot_id: i64,
    pub amount: i64,
}

/// Wager submission, shared by the HTTP route and the websocket `bet`
/// message. Either `bet_plan` or the single `slot_id`/`amount` pair is
/// given; `reuse_last_bet` replays the caller's previous plan instead.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub slot_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub source_msg_id: Option<String>,
    #[serde(default)]
    pub reuse_last_bet: bool,
    #[serde(default)]
    pub bet_plan: Option<Vec<BetPlanEntry>>,
}

/// What a successful wager call hands back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetReceipt {
    pub round_id: u64,
    /// Entries actually applied, after duplicate lines were skipped.
    pub accepted: Vec<PlanEntry>,
    pub reused: bool,
    pub jackpot_pool: u64,
}

/// Single simulated wager; absent fields are randomized.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimBetRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub slot_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub source_msg_id: Option<String>,
}

/// Burst of simulated wagers from distinct users.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimBulkRequest {
    #[serde(default)]
    pub users: Option<u32>,
    #[serde(default)]
    pub min_amount: Option<u64>,
    #[serde(default)]
    pub max_amount: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimBulkResponse {
    pub requested: u32,
    pub accepted: u32,
    pub rejected: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plan_request() {
        let request: BetRequest = serde_json::from_str(
            r#"{"userId":"u1","sourceMsgId":"m1","betPlan":[{"slotId":4,"amount":10},{"slotId":9,"amount":5}]}"#,
        )
        .unwrap();
        assert_eq!(request.user_id, "u1");
        assert!(!request.reuse_last_bet);
        let plan = request.bet_plan.unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1], BetPlanEntry { slot_id: 9, amount: 5 });
    }

    #[test]
    fn parses_legacy_single_pair() {
        let request: BetRequest =
            serde_json::from_str(r#"{"userId":"u2","slotId":3,"amount":25}"#).unwrap();
        assert_eq!(request.slot_id, Some(3));
        assert_eq!(request.amount, Some(25));
        assert!(request.bet_plan.is_none());
    }

    #[test]
    fn receipt_serializes_camel_case() {
        let receipt = BetReceipt {
            round_id: 12,
            accepted: vec![PlanEntry { slot_id: 4, amount: 10 }],
            reused: true,
            jackpot_pool: 88,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["roundId"], 12);
        assert_eq!(json["reused"], true);
        assert_eq!(json["jackpotPool"], 88);
        assert_eq!(json["accepted"][0]["slotId"], 4);
    }
}
