use popsicle_safe_math::safe_add;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    cli::CardanoCli,
    config::RetryPolicy,
    error::{RawTxError, Result},
    poller::{poll_until, Polled},
};

/// Output of `query tip`. Only the slot is relied upon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tip {
    pub slot: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_progress: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TipClient {
    cli: CardanoCli,
    policy: RetryPolicy,
}

impl TipClient {
    pub fn new(cli: CardanoCli, policy: RetryPolicy) -> Self {
        Self { cli, policy }
    }

    pub async fn query_tip(&self) -> Result<Tip> {
        self.cli.query_tip().await
    }

    /// Current slot plus `horizon`.
    pub async fn future_slot(&self, horizon: u64) -> Result<u64> {
        let tip = self.query_tip().await?;
        Ok(safe_add(tip.slot, horizon)?)
    }

    /// Blocks until the node answers `query tip`. Failures while the node is
    /// still starting are expected and only logged.
    pub async fn await_node_online(&self, cancel: &CancellationToken) -> Result<Tip> {
        let polled = poll_until(&self.policy, cancel, |attempt| async move {
            match self.cli.query_tip().await {
                Ok(tip) => Ok(Some(tip)),
                Err(err) => {
                    debug!(attempt, %err, "node not ready");
                    Ok(None)
                }
            }
        })
        .await?;

        match polled {
            Polled::Ready(tip) => {
                info!(slot = tip.slot, block = ?tip.block, era = ?tip.era, "node online");
                Ok(tip)
            }
            Polled::Exhausted { attempts } => Err(RawTxError::NodeUnreachable { attempts }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tip_tolerates_missing_fields() {
        let tip: Tip = serde_json::from_str(r#"{"slot": 42}"#).unwrap();
        assert_eq!(tip.slot, 42);
        assert_eq!(tip.era, None);

        let tip: Tip = serde_json::from_str(
            r#"{"block": 3012, "epoch": 170, "era": "Alonzo", "hash": "ab", "slot": 41000, "syncProgress": "100.00"}"#,
        )
        .unwrap();
        assert_eq!(tip.sync_progress.as_deref(), Some("100.00"));
        assert_eq!(tip.slot, 41_000);
    }

    #[test]
    fn tip_requires_slot() {
        assert!(serde_json::from_str::<Tip>(r#"{"block": 1}"#).is_err());
    }
}
