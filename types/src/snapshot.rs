use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::UserAccount;
use crate::round::{Round, SettlementResult};

/// Bump when the on-disk layout changes shape.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full persisted state, written atomically after every mutation and read
/// back once at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub updated_at: u64,
    pub jackpot_pool: u64,
    #[serde(default)]
    pub last_result: Option<SettlementResult>,
    #[serde(default)]
    pub current_round: Option<Round>,
    #[serde(default)]
    pub users: BTreeMap<String, UserAccount>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            updated_at: 0,
            jackpot_pool: 0,
            last_result: None,
            current_round: None,
            users: BTreeMap::new(),
        }
    }
}
