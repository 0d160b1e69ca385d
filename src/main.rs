use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;
use clap::Parser;

mod cli;
mod config;
mod engine;
mod error;
mod fee;
mod filter;
mod indexer;
mod selection;
mod transaction;
mod types;

use cli::CliArgs;
use config::{ErrorResponse, PsbtRequest, PsbtResponse};
use error::{AppError, ErrorCategory};

fn main() -> ExitCode {
    env_logger::init();

    let args = CliArgs::parse();
    log::info!("アプリケーションを開始します。引数: {:?}", args);

    // ポリシーは起動時に一度だけ読む
    let policy = match args.policy() {
        Ok(policy) => policy,
        Err(e) => {
            log::error!("設定の読み込みに失敗しました: {}", e);
            return ExitCode::from(1);
        }
    };
    log::debug!("ポリシー設定: {:?}", policy);

    let result = read_request(&args).and_then(|req| engine::handle_request(req, &policy));
    let (body, code) = match render_outcome(result) {
        Ok(rendered) => rendered,
        Err(e) => {
            log::error!("レスポンスのシリアライズに失敗しました: {}", e);
            return ExitCode::from(1);
        }
    };
    if let Err(e) = write_response(args.output_file.as_deref(), &body) {
        log::error!("レスポンスの出力に失敗しました: {}", e);
        return ExitCode::from(1);
    }

    log::info!("処理が完了しました。");
    ExitCode::from(code as u8)
}

/// 成功時はレスポンス、失敗時は `{error}` の JSON 本文と終了コードを返す。
fn render_outcome(result: Result<PsbtResponse, AppError>) -> Result<(String, i32), serde_json::Error> {
    match result {
        Ok(response) => {
            log::info!("PSBTの作成に成功しました (入力 {} 件, 手数料 {} sats)", response.inputs_used, response.fee);
            Ok((serde_json::to_string(&response)?, 0))
        }
        Err(e) => {
            let category = e.category();
            if category == ErrorCategory::Internal {
                log::error!("Error creating PSBT: {:?}", e);
            } else {
                log::warn!("リクエストを拒否しました ({:?}): {}", category, e);
            }
            Ok((serde_json::to_string(&ErrorResponse { error: e.to_string() })?, category.exit_code()))
        }
    }
}

fn read_request(args: &CliArgs) -> Result<PsbtRequest, AppError> {
    let content = match &args.input_file {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            log::error!("入力ファイルの読み込みに失敗しました: {:?}", path);
            AppError::Io(e)
        })?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    parse_request(&content, args.input_file.as_deref())
}

fn parse_request(content: &str, file_path: Option<&Path>) -> Result<PsbtRequest, AppError> {
    // 空の本文は空のリクエストとして扱う
    if content.trim().is_empty() {
        return Ok(PsbtRequest::default());
    }
    let request: PsbtRequest = serde_json::from_str(content).map_err(|e| {
        log::error!("リクエストJSONのパースに失敗しました。");
        AppError::JsonParse {
            file_path: file_path.map(Path::to_path_buf),
            source: e,
        }
    })?;
    log::debug!("リクエストのパース成功: {:?}", request);
    Ok(request)
}

fn write_response(output_file: Option<&Path>, body: &str) -> Result<(), AppError> {
    println!("{}", body);

    if let Some(path) = output_file {
        let mut output_file = File::create(path).map_err(|e| {
            log::error!("出力ファイルの作成に失敗しました: {:?}", path);
            AppError::Io(e)
        })?;
        output_file.write_all(body.as_bytes())?;
        log::info!("レスポンスを {:?} に保存しました。", path);
    }
    Ok(())
}
