//! インスクリプション ID から UTXO を解決するインデクサ API クライアント。

use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::{ApiKey, IndexerConfig, RawUtxo},
    error::AppError,
};

/// インスクリプション ID を UTXO レコードへ解決するデータソース。
pub trait InscriptionSource {
    fn fetch_inscription_utxo(&self, inscription_id: &str) -> Result<RawUtxo, AppError>;
}

#[derive(Deserialize, Debug)]
struct InscriptionInfoResponse {
    data: InscriptionInfo,
}

#[derive(Deserialize, Debug)]
struct InscriptionInfo {
    utxo: IndexerUtxo,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct IndexerUtxo {
    txid: String,
    vout: u32,
    satoshi: u64,
    script_pk: String,
    #[serde(default)]
    inscriptions: Vec<Value>,
}

impl From<IndexerUtxo> for RawUtxo {
    fn from(ut: IndexerUtxo) -> Self {
        RawUtxo {
            txid: Some(ut.txid),
            vout: Some(ut.vout),
            value: Some(ut.satoshi),
            satoshi: None,
            script_pubkey: Some(ut.script_pk),
            script_pk: None,
            inscriptions: ut.inscriptions,
        }
    }
}

/// HTTP 経由のクライアント。リトライとタイムアウトはこの層では行わない。
#[derive(Debug, Clone)]
pub struct IndexerClient {
    base_url: String,
    api_key: ApiKey,
}

impl IndexerClient {
    /// API キーが未設定の場合は設定エラー。
    pub fn from_config(config: &IndexerConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose().is_empty())
            .ok_or(AppError::MissingIndexerKey)?;
        Ok(Self {
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

impl InscriptionSource for IndexerClient {
    fn fetch_inscription_utxo(&self, inscription_id: &str) -> Result<RawUtxo, AppError> {
        let url = format!("{}{}", self.base_url, inscription_id);
        log::info!("インデクサへ問い合わせ: {}", url);

        let response = minreq::get(&url)
            .with_header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .send()?;

        if !(200..300).contains(&response.status_code) {
            return Err(AppError::Indexer(format!(
                "HTTP {}: {}",
                response.status_code, response.reason_phrase
            )));
        }

        let info: InscriptionInfoResponse = response
            .json()
            .map_err(|e| AppError::Indexer(format!("unexpected response body: {}", e)))?;
        log::debug!("インデクサ応答: {:?}", info);
        Ok(info.data.utxo.into())
    }
}
