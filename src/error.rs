use std::path::PathBuf;
use bitcoin::address::ParseError as BitcoinAddressError;
use bitcoin::psbt::Error as BitcoinPsbtError;
use thiserror::Error;

/// エラーの分類。レスポンスの種類と終了コードはこれで決まる。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Upstream,
    Validation,
    NoCandidates,
    InsufficientFunds,
    Internal,
}

impl ErrorCategory {
    /// 呼び出し側で修正可能なエラーかどうか
    pub fn is_caller_correctable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Validation | ErrorCategory::NoCandidates | ErrorCategory::InsufficientFunds
        )
    }

    pub fn exit_code(self) -> i32 {
        if self.is_caller_correctable() { 2 } else { 1 }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request JSON (file: {file_path:?}): {source}")]
    JsonParse {
        file_path: Option<PathBuf>,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing INDEXER_API_KEY env var")]
    MissingIndexerKey,

    #[error("Indexer fetch failed: {0}")]
    Indexer(String),

    #[error("Indexer fetch failed: {0}")]
    IndexerHttp(#[from] minreq::Error),

    #[error("utxos and outputs are required")]
    MissingRequiredFields,

    #[error("Invalid output address ({address}): {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: BitcoinAddressError,
    },

    #[error("{0}")]
    InputValidation(String),

    #[error("No UTXOs meet filter requirements")]
    NoCandidates,

    #[error("Insufficient funds: selected {available} sats, required {required} sats")]
    InsufficientFunds {
        available: u64,
        required: u64,
    },

    #[error("Internal server error: {0}")]
    Psbt(#[from] BitcoinPsbtError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::MissingIndexerKey => ErrorCategory::Configuration,
            AppError::Indexer(_) | AppError::IndexerHttp(_) => ErrorCategory::Upstream,
            AppError::JsonParse { .. }
            | AppError::MissingRequiredFields
            | AppError::InvalidAddress { .. }
            | AppError::InputValidation(_) => ErrorCategory::Validation,
            AppError::NoCandidates => ErrorCategory::NoCandidates,
            AppError::InsufficientFunds { .. } => ErrorCategory::InsufficientFunds,
            AppError::Io(_) | AppError::Psbt(_) | AppError::Internal(_) => ErrorCategory::Internal,
        }
    }
}
