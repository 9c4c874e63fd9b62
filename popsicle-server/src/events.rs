//! `{ event, data }` request routing.
//!
//! Every request produces exactly one reply: `{ event, ...payload }` on
//! success, `{ event: "error", error: { message, code } }` otherwise.

use std::sync::Arc;

use popsicle_error::{ErrorPayload, PopsicleErrorCode};
use popsicle_rawtx::RawTx;
use popsicle_wallet_client::WalletClient;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shared by every connection.
#[derive(Debug, Clone)]
pub struct AppState {
    pub wallet: WalletClient,
    pub faucet: Arc<RawTx>,
}

impl AppState {
    pub fn new(wallet: WalletClient, faucet: RawTx) -> Self {
        Self {
            wallet,
            faucet: Arc::new(faucet),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct WalletSecret {
    name: String,
    seed: String,
    passphrase: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletUpdate {
    id: String,
    name: Option<String>,
    old_passphrase: Option<String>,
    new_passphrase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WalletId {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct AddressQuery {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendCoin {
    amount: u64,
    receiver: String,
}

#[derive(Debug, Deserialize)]
struct SendToken {
    token: String,
    amount: u64,
    receiver: String,
}

#[derive(Debug, Deserialize)]
struct TokenAmount {
    token: String,
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct MintNft {
    receiver: String,
    token: String,
    #[serde(default)]
    metadata: Value,
}

/// The message pushed to every client right after the upgrade. The UI starts
/// polling `wallet_network` when it sees `network: null`.
pub fn connected() -> Value {
    json!({ "event": "wallet_connected", "network": null })
}

pub fn error_reply(error: impl Into<ErrorPayload>) -> Value {
    json!({ "event": "error", "error": error.into() })
}

/// Decodes `text` and runs the named event to completion.
pub async fn dispatch(state: &AppState, text: &str, cancel: &CancellationToken) -> Value {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(%err, "undecodable message");
            return error_reply(malformed(err));
        }
    };

    debug!(event = %envelope.event, "request");
    match handle(state, &envelope.event, envelope.data, cancel).await {
        Ok(payload) => reply(&envelope.event, payload),
        Err(error) => {
            warn!(event = %envelope.event, code = error.code, message = %error.message, "request failed");
            error_reply(error)
        }
    }
}

async fn handle(
    state: &AppState,
    event: &str,
    data: Value,
    cancel: &CancellationToken,
) -> Result<Value, ErrorPayload> {
    let faucet = &state.faucet;
    match event {
        "wallet_network" => {
            let network = state.wallet.network_information().await?;
            Ok(json!({ "network": network }))
        }
        "wallet_list" => wallets_reply(state).await,
        "wallet_create" | "wallet_recover" => {
            let secret: WalletSecret = args(data)?;
            state
                .wallet
                .create_or_restore(&secret.name, &secret.seed, &secret.passphrase)
                .await?;
            wallets_reply(state).await
        }
        "wallet_update" => {
            let update: WalletUpdate = args(data)?;
            let wallet = state.wallet.wallet(&update.id).await?;

            if let Some(name) = update.name.filter(|name| !name.is_empty() && *name != wallet.name) {
                state.wallet.rename(&wallet.id, &name).await?;
            }
            if let (Some(old), Some(new)) = (update.old_passphrase, update.new_passphrase) {
                if !old.is_empty() && !new.is_empty() && old != new {
                    state.wallet.update_passphrase(&wallet.id, &old, &new).await?;
                }
            }
            wallets_reply(state).await
        }
        "wallet_destroy" => {
            let WalletId { id } = args(data)?;
            let wallet = state.wallet.wallet(&id).await?;
            state.wallet.delete(&wallet.id).await?;
            wallets_reply(state).await
        }
        "faucet_utxo" => {
            let utxo = faucet.query_address(None).await?;
            Ok(json!({ "utxo": utxo }))
        }
        "faucet_query" => {
            let query: AddressQuery = optional_args(data)?;
            let snapshot = faucet.query_address(query.address.as_deref()).await?;
            Ok(json!({ "query": snapshot }))
        }
        "faucet_tip" => {
            let tip = faucet.tip_client().query_tip().await?;
            Ok(json!({ "tip": tip }))
        }
        "faucet_send_coin" => {
            let SendCoin { amount, receiver } = args(data)?;
            let outcome = faucet.send_coin(amount, &receiver, cancel).await?;
            Ok(json!({ "outcome": outcome }))
        }
        "faucet_send_token" => {
            let SendToken {
                token,
                amount,
                receiver,
            } = args(data)?;
            let outcome = faucet.send_token(&token, amount, &receiver, cancel).await?;
            Ok(json!({ "outcome": outcome }))
        }
        "faucet_mint_token" => {
            let TokenAmount { token, amount } = args(data)?;
            let outcome = faucet.mint_token(&token, amount, cancel).await?;
            Ok(json!({ "outcome": outcome }))
        }
        "faucet_mint_nft" => {
            let MintNft {
                receiver,
                token,
                metadata,
            } = args(data)?;
            let outcome = faucet.mint_nft(&receiver, &token, metadata, cancel).await?;
            Ok(json!({ "outcome": outcome }))
        }
        "faucet_burn_token" => {
            let TokenAmount { token, amount } = args(data)?;
            let outcome = faucet.burn_token(&token, amount, cancel).await?;
            Ok(json!({ "outcome": outcome }))
        }
        other => Err(ErrorPayload::new(
            format!("Unknown event `{other}`"),
            PopsicleErrorCode::UnknownEvent as u32,
        )),
    }
}

async fn wallets_reply(state: &AppState) -> Result<Value, ErrorPayload> {
    let (wallets, network) = futures::try_join!(
        state.wallet.wallet_summaries(),
        state.wallet.network_information(),
    )?;
    Ok(json!({ "wallets": wallets, "network": network }))
}

fn reply(event: &str, payload: Value) -> Value {
    let mut object = match payload {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    object.insert("event".to_string(), Value::String(event.to_string()));
    Value::Object(object)
}

fn args<T: DeserializeOwned>(data: Value) -> Result<T, ErrorPayload> {
    serde_json::from_value(data).map_err(malformed)
}

/// Like [`args`], but a missing `data` means "use the defaults".
fn optional_args<T: DeserializeOwned + Default>(data: Value) -> Result<T, ErrorPayload> {
    if data.is_null() {
        return Ok(T::default());
    }
    args(data)
}

fn malformed(err: serde_json::Error) -> ErrorPayload {
    ErrorPayload::new(
        format!("Malformed request: {err}"),
        PopsicleErrorCode::MalformedRequest as u32,
    )
}
