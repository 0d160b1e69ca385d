use clap::{ArgAction, Parser};
use std::path::PathBuf;
use bitcoin::Network as BitcoinNetwork;
use crate::config::{ApiKey, IndexerConfig, PolicyConfig, DEFAULT_FLAT_FEE, DEFAULT_INDEXER_BASE, DEFAULT_MIN_UTXO_VALUE};
use crate::error::AppError;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// リクエスト JSON ファイルへのパス (省略時は標準入力)
    #[clap(short, long, value_parser)]
    pub input_file: Option<PathBuf>,

    /// レスポンス JSON を保存するファイルへのパス
    #[clap(short, long, value_parser)]
    pub output_file: Option<PathBuf>,

    /// 支払い先アドレスのネットワーク ("bitcoin", "testnet", "signet", "regtest")
    #[clap(short, long, env = "BITCOIN_NETWORK", default_value = "bitcoin")]
    pub network: String,

    #[clap(long, env = "INDEXER_API_KEY", hide_env_values = true)]
    pub indexer_api_key: Option<ApiKey>,

    #[clap(long, env = "INDEXER_BASE", default_value = DEFAULT_INDEXER_BASE)]
    pub indexer_base: String,

    /// この値未満の UTXO は使わない (おつりの最小値も兼ねる)
    #[clap(long, env = "MIN_UTXO_VALUE", default_value_t = DEFAULT_MIN_UTXO_VALUE)]
    pub min_utxo_value: u64,

    #[clap(long, env = "DEFAULT_FLAT_FEE", default_value_t = DEFAULT_FLAT_FEE)]
    pub default_flat_fee: u64,

    #[clap(long, env = "SKIP_INSCRIPTIONS", default_value = "false", num_args = 0..=1,
        default_missing_value = "true", action = ArgAction::Set, value_parser = parse_flag)]
    pub skip_inscriptions: bool,

    #[clap(long = "skip-546", env = "SKIP_546_UTXOS", default_value = "false", num_args = 0..=1,
        default_missing_value = "true", action = ArgAction::Set, value_parser = parse_flag)]
    pub skip_546: bool,
}

impl CliArgs {
    pub fn policy(&self) -> Result<PolicyConfig, AppError> {
        Ok(PolicyConfig {
            network: parse_network(&self.network)?,
            min_utxo_value: self.min_utxo_value,
            default_flat_fee: self.default_flat_fee,
            skip_inscriptions: self.skip_inscriptions,
            skip_546: self.skip_546,
            indexer: IndexerConfig {
                api_key: self.indexer_api_key.clone(),
                base_url: self.indexer_base.clone(),
            },
        })
    }
}

/// "true" (大文字小文字は無視) のときだけ有効とみなす
fn parse_flag(s: &str) -> Result<bool, String> {
    Ok(s.trim().eq_ignore_ascii_case("true"))
}

pub fn parse_network(network_str: &str) -> Result<BitcoinNetwork, AppError> {
    match network_str.to_lowercase().as_str() {
        "bitcoin" | "mainnet" => Ok(BitcoinNetwork::Bitcoin),
        "testnet" => Ok(BitcoinNetwork::Testnet),
        "signet" => Ok(BitcoinNetwork::Signet),
        "regtest" => Ok(BitcoinNetwork::Regtest),
        s => Err(AppError::InputValidation(format!("invalid network: {}", s))),
    }
}
