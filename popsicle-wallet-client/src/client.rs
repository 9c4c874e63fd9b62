use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::try_join_all;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::error::{Result, WalletError};
use crate::types::{
    AddressState, ApiErrorBody, CreateWallet, NetworkInformation, UpdatePassphrase,
    UtxoStatistics, Wallet, WalletAddress, WalletSummary, WalletTransaction,
};

/// Where `cardano-wallet` listens inside the compose network.
pub const DEFAULT_WALLET_URL: &str = "http://cardano-wallet:8090/v2";

/// 2021-01-01T00:00:00Z, the start of the transaction history shown per wallet.
const HISTORY_START_TIMESTAMP: i64 = 1_609_459_200;

pub fn history_start() -> DateTime<Utc> {
    DateTime::from_timestamp(HISTORY_START_TIMESTAMP, 0).unwrap_or_default()
}

/// WalletClient wraps the Shelley endpoints of the `cardano-wallet` v2 API.
#[derive(Debug, Clone)]
pub struct WalletClient {
    url: String,
    client: reqwest::Client,
}

impl WalletClient {
    /// Create a client for the API rooted at `url` (e.g. `http://host:8090/v2`).
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn network_information(&self) -> Result<NetworkInformation> {
        self.fetch(self.get("/network/information")).await
    }

    pub async fn wallets(&self) -> Result<Vec<Wallet>> {
        self.fetch(self.get("/wallets")).await
    }

    pub async fn wallet(&self, id: &str) -> Result<Wallet> {
        self.fetch(self.get(&format!("/wallets/{id}"))).await
    }

    /// Creates a wallet from `mnemonic`, or restores it if the phrase belongs
    /// to an existing one.
    pub async fn create_or_restore(
        &self,
        name: &str,
        mnemonic: &str,
        passphrase: &str,
    ) -> Result<Wallet> {
        let mnemonic_sentence: Vec<&str> = mnemonic.split_whitespace().collect();
        if name.trim().is_empty() {
            return Err(WalletError::InvalidRequest("wallet name is empty".into()));
        }
        if mnemonic_sentence.is_empty() {
            return Err(WalletError::InvalidRequest("recovery phrase is empty".into()));
        }

        let body = CreateWallet {
            name,
            mnemonic_sentence,
            passphrase,
        };
        self.fetch(self.client.post(self.endpoint("/wallets")).json(&body))
            .await
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<Wallet> {
        let request = self
            .client
            .put(self.endpoint(&format!("/wallets/{id}")))
            .json(&json!({ "name": name }));
        self.fetch(request).await
    }

    /// The API answers 204 on success, so the wallet is fetched again.
    pub async fn update_passphrase(&self, id: &str, old: &str, new: &str) -> Result<Wallet> {
        let request = self
            .client
            .put(self.endpoint(&format!("/wallets/{id}/passphrase")))
            .json(&UpdatePassphrase {
                old_passphrase: old,
                new_passphrase: new,
            });
        self.execute(request).await?;
        self.wallet(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.endpoint(&format!("/wallets/{id}")));
        self.execute(request).await.map(|_| ())
    }

    pub async fn utxo_statistics(&self, id: &str) -> Result<UtxoStatistics> {
        self.fetch(self.get(&format!("/wallets/{id}/statistics/utxos")))
            .await
    }

    pub async fn addresses(&self, id: &str, state: AddressState) -> Result<Vec<WalletAddress>> {
        let request = self
            .get(&format!("/wallets/{id}/addresses"))
            .query(&[("state", state.as_str())]);
        self.fetch(request).await
    }

    pub async fn transactions(
        &self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WalletTransaction>> {
        let request = self.get(&format!("/wallets/{id}/transactions")).query(&[
            ("start", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ]);
        self.fetch(request).await
    }

    /// Assembles the UI view of `wallet`: balances, both address pools, UTxO
    /// statistics and the transaction history since [`history_start`].
    pub async fn wallet_summary(&self, wallet: &Wallet) -> Result<WalletSummary> {
        let (statistics, used_addresses, unused_addresses, transactions) = futures::try_join!(
            self.utxo_statistics(&wallet.id),
            self.addresses(&wallet.id, AddressState::Used),
            self.addresses(&wallet.id, AddressState::Unused),
            self.transactions(&wallet.id, history_start(), Utc::now()),
        )?;

        Ok(WalletSummary {
            id: wallet.id.clone(),
            name: wallet.name.clone(),
            assets: wallet.assets.clone(),
            statistics,
            used_addresses,
            unused_addresses,
            available_balance: wallet.balance.available.quantity,
            reward_balance: wallet.balance.reward.quantity,
            total_balance: wallet.balance.total.quantity,
            delegation: wallet.delegation.clone(),
            transactions,
        })
    }

    /// Summaries for every wallet the server knows, in listing order.
    pub async fn wallet_summaries(&self) -> Result<Vec<WalletSummary>> {
        let wallets = self.wallets().await?;
        try_join_all(wallets.iter().map(|wallet| self.wallet_summary(wallet))).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.endpoint(path))
    }

    async fn fetch<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Sends `request` and returns the body of a 2xx response. Anything else
    /// becomes [`WalletError::Api`], using the server's error body when it has one.
    async fn execute(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;
        debug!(%status, url, "wallet api response");

        if status.is_success() {
            return Ok(body);
        }

        let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => (err.code, err.message),
            Err(_) => (
                status
                    .canonical_reason()
                    .unwrap_or("unknown")
                    .to_lowercase()
                    .replace(' ', "_"),
                body,
            ),
        };
        Err(WalletError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

impl Default for WalletClient {
    fn default() -> Self {
        Self::new(DEFAULT_WALLET_URL)
    }
}

/// True when the error is the API's 404 for an unknown wallet.
pub fn is_not_found(err: &WalletError) -> bool {
    matches!(err, WalletError::Api { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
}
