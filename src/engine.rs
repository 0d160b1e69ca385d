use crate::{
    config::{PolicyConfig, PsbtRequest, PsbtResponse},
    error::AppError,
    fee,
    filter,
    indexer::{IndexerClient, InscriptionSource},
    selection,
    transaction,
    types::FeeMode,
};

/// 1リクエスト分の処理。必要ならインデクサで UTXO を解決してから PSBT を作る。
pub fn handle_request(
    mut request: PsbtRequest,
    policy: &PolicyConfig,
) -> Result<PsbtResponse, AppError> {
    if needs_inscription_lookup(&request) {
        let client = IndexerClient::from_config(&policy.indexer)?;
        prepend_inscription_utxo(&mut request, &client)?;
    }
    create_psbt(&request, policy)
}

/// inscriptionId があり、utxos が未指定か空の場合のみ問い合わせる。
pub fn needs_inscription_lookup(request: &PsbtRequest) -> bool {
    let has_id = request.inscription_id.as_deref().is_some_and(|id| !id.is_empty());
    let has_utxos = request.utxos.as_ref().is_some_and(|u| !u.is_empty());
    has_id && !has_utxos
}

pub fn prepend_inscription_utxo(
    request: &mut PsbtRequest,
    source: &impl InscriptionSource,
) -> Result<(), AppError> {
    let Some(inscription_id) = request.inscription_id.as_deref() else {
        return Ok(());
    };
    let utxo = source.fetch_inscription_utxo(inscription_id)?;
    log::info!("インスクリプション {} の UTXO を先頭に追加します", inscription_id);
    request.utxos.get_or_insert_with(Vec::new).insert(0, utxo);
    Ok(())
}

/// フィルタ → 選択 → 手数料計算 → 組み立ての順に処理する。I/O は行わない。
pub fn create_psbt(request: &PsbtRequest, policy: &PolicyConfig) -> Result<PsbtResponse, AppError> {
    let utxos = request.utxos.as_deref().unwrap_or_default();
    let outputs = request.outputs.as_deref().unwrap_or_default();
    if utxos.is_empty() || outputs.is_empty() {
        return Err(AppError::MissingRequiredFields);
    }
    if let Some(rate) = request.fee_rate {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AppError::InputValidation(format!("invalid fee_rate: {}", rate)));
        }
    }

    let targets = transaction::decode_targets(outputs, policy.network)?;
    let total_payment = targets
        .iter()
        .try_fold(0u64, |acc, t| acc.checked_add(t.amount.to_sat()))
        .ok_or_else(|| AppError::InputValidation("output amounts overflow".to_string()))?;
    log::info!("PSBT作成開始: UTXO {} 件, 出力 {} 件, 支払い合計 {} sats", utxos.len(), targets.len(), total_payment);

    let candidates = filter::filter_candidates(utxos, policy)?;
    let selection = selection::select_coins(candidates, total_payment)?;

    let mode = FeeMode::from_request(request.fee, request.fee_rate);
    let plan = fee::plan_fee(&selection, &targets, mode, policy)?;
    log::info!("手数料 {} sats, おつり {} sats", plan.fee_sats, plan.change_sats);

    let psbt = transaction::assemble(&selection, &targets, &plan)?;

    Ok(PsbtResponse {
        psbt: psbt.to_string(),
        fee: plan.fee_sats,
        change: plan.change_sats,
        inputs_used: selection.selected.len(),
        fee_rate: plan.effective_fee_rate,
        vsize: plan.estimated_vsize,
    })
}
