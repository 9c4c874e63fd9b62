use std::future::{pending, Future};

use popsicle_transactions::{AddressSnapshot, TxIn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cli::CardanoCli,
    config::RetryPolicy,
    error::{RawTxError, Result},
};

/// Outcome of a bounded wait.
pub(crate) enum Polled<T> {
    Ready(T),
    Exhausted { attempts: usize },
}

/// Calls `check` until it yields `Some`, sleeping per `policy` in between.
///
/// Stops after `max_attempts` checks or once `timeout` has elapsed, including
/// while a check is still running. Errors from `check` end the wait
/// immediately. Cancellation interrupts any check or sleep.
pub(crate) async fn poll_until<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<Polled<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now().checked_add(policy.timeout);
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => pending::<()>().await,
        }
    };
    tokio::pin!(expired);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RawTxError::Cancelled);
        }

        let checked = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RawTxError::Cancelled),
            _ = &mut expired => {
                debug!(attempt, "check still running at the deadline");
                return Ok(Polled::Exhausted { attempts: attempt + 1 });
            }
            checked = check(attempt) => checked?,
        };
        if let Some(value) = checked {
            return Ok(Polled::Ready(value));
        }

        attempt += 1;
        if attempt >= policy.max_attempts {
            return Ok(Polled::Exhausted { attempts: attempt });
        }

        let delay = policy.next_delay(attempt - 1);
        if deadline.is_some_and(|deadline| Instant::now() + delay > deadline) {
            return Ok(Polled::Exhausted { attempts: attempt });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RawTxError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Waits for a submitted transaction to show up on chain.
#[derive(Debug, Clone)]
pub struct ConfirmationPoller {
    cli: CardanoCli,
    policy: RetryPolicy,
}

impl ConfirmationPoller {
    pub fn new(cli: CardanoCli, policy: RetryPolicy) -> Self {
        Self { cli, policy }
    }

    /// Re-queries `address` until `spent` is no longer listed, which happens once
    /// the block carrying the transaction is adopted. Returns the new snapshot.
    ///
    /// A failing `query utxo` counts as "not yet": the transaction is already
    /// submitted, so only the attempt cap or the deadline ends the wait.
    pub async fn await_new_utxo(
        &self,
        address: &str,
        spent: &TxIn,
        cancel: &CancellationToken,
    ) -> Result<AddressSnapshot> {
        let polled = poll_until(&self.policy, cancel, |attempt| async move {
            let snapshot = match self.cli.query_utxo(address).await {
                Ok(snapshot) => snapshot,
                Err(err @ RawTxError::ProcessFailure { .. }) => {
                    warn!(attempt, %spent, %err, "utxo query failed while confirming");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            if snapshot.contains(spent) {
                debug!(attempt, %spent, "input still unspent");
                Ok(None)
            } else {
                Ok(Some(snapshot))
            }
        })
        .await?;

        match polled {
            Polled::Ready(snapshot) => {
                info!(
                    %spent,
                    address,
                    utxos = snapshot.utxos.len(),
                    lovelace = snapshot.total_lovelace().ok(),
                    "transaction confirmed"
                );
                Ok(snapshot)
            }
            Polled::Exhausted { attempts } => Err(RawTxError::ConfirmationTimeout {
                tx_in: spent.to_string(),
                attempts,
            }),
        }
    }
}
