use super::ByteCount;
use serde::Serialize;

/// One snapper snapshot. Unique by `(config, id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub id:          String,
    pub config:      String,
    #[serde(rename = "type")]
    pub snap_type:   String,
    /// Number of the `pre` snapshot a `post` snapshot pairs with.
    pub pre_num:     Option<String>,
    pub description: String,
    /// Kept exactly as snapper printed it.
    pub date:        String,
    pub user_name:   String,
    pub used_space:  ByteCount,
}
