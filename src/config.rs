use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use bitcoin::Network as BitcoinNetwork;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_INDEXER_BASE: &str = "https://open-api.unisat.io/v1/indexer/inscription/info/";
pub const DEFAULT_MIN_UTXO_VALUE: u64 = 330;
pub const DEFAULT_FLAT_FEE: u64 = 200;

/// プロセス起動時に一度だけ構築し、参照でエンジンへ渡すポリシー設定。
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub network: BitcoinNetwork,
    pub min_utxo_value: u64,
    pub default_flat_fee: u64,
    pub skip_inscriptions: bool,
    pub skip_546: bool,
    pub indexer: IndexerConfig,
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub api_key: Option<ApiKey>,
    pub base_url: String,
}

/// インデクサの認証キー。Debug 出力では値を伏せる。
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApiKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ApiKey(s.to_string()))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            network: BitcoinNetwork::Bitcoin,
            min_utxo_value: DEFAULT_MIN_UTXO_VALUE,
            default_flat_fee: DEFAULT_FLAT_FEE,
            skip_inscriptions: false,
            skip_546: false,
            indexer: IndexerConfig {
                api_key: None,
                base_url: DEFAULT_INDEXER_BASE.to_string(),
            },
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct PsbtRequest {
    #[serde(default)]
    pub utxos: Option<Vec<RawUtxo>>,
    #[serde(default)]
    pub outputs: Option<Vec<OutputDef>>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub fee_rate: Option<f64>,
    #[serde(default, rename = "inscriptionId")]
    pub inscription_id: Option<String>,
}

/// 呼び出し元やインデクサから受け取る UTXO レコード。
/// 形の異なる入力を許容するため、全フィールドを任意とし別名フィールドも受け付ける。
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RawUtxo {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default)]
    pub satoshi: Option<u64>,
    #[serde(default, rename = "scriptPubKey")]
    pub script_pubkey: Option<String>,
    #[serde(default, rename = "scriptPk")]
    pub script_pk: Option<String>,
    #[serde(default)]
    pub inscriptions: Vec<Value>,
}

impl RawUtxo {
    /// value を優先し、無ければ satoshi、どちらも無ければ 0
    pub fn value_sats(&self) -> u64 {
        self.value.or(self.satoshi).unwrap_or(0)
    }

    pub fn script_hex(&self) -> Option<&str> {
        self.script_pubkey
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.script_pk.as_deref())
    }

    pub fn txid_hex(&self) -> Option<&str> {
        self.txid.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputDef {
    pub address: String,
    pub amount: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PsbtResponse {
    pub psbt: String,
    pub fee: u64,
    pub change: i64,
    pub inputs_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vsize: Option<u64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
