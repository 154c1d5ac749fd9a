use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub height: u64,
    pub timestamp: u64,
    pub tx_count: u64,
    pub size: u64,
    pub weight: u64,
    #[serde(default)]
    pub difficulty: Option<f64>,
}

// 单位 sat/vB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: f64,
    pub half_hour_fee: f64,
    pub hour_fee: f64,
    pub economy_fee: f64,
    pub minimum_fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolSummary {
    pub count: u64,
    pub vsize: u64,
    pub total_fee: f64,
    // (费率, vsize)
    #[serde(default)]
    pub fee_histogram: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustment {
    pub progress_percent: f64,
    pub difficulty_change: f64,
    pub estimated_retarget_date: u64,
    pub remaining_blocks: u64,
    pub remaining_time: u64,
    #[serde(default)]
    pub previous_retarget: Option<f64>,
    #[serde(default)]
    pub next_retarget_height: Option<u64>,
}
