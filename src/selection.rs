use crate::{
    error::AppError,
    types::{SelectionResult, UtxoDescriptor},
};

/// 金額の大きい順に UTXO を積み上げ、目標額に達した時点で止める貪欲法。
/// 同額の場合は元の順序を保つ (安定ソート)。
pub fn select_coins(
    candidates: Vec<UtxoDescriptor>,
    target_sats: u64,
) -> Result<SelectionResult, AppError> {
    let mut sorted = candidates;
    sorted.sort_by(|a, b| b.value_sats().cmp(&a.value_sats()));

    let mut selected = Vec::new();
    let mut accumulated: u64 = 0;
    for utxo in sorted {
        accumulated = accumulated.checked_add(utxo.value_sats()).ok_or_else(|| {
            AppError::InputValidation("selected UTXO values overflow".to_string())
        })?;
        log::debug!(
            "UTXO選択: {}:{} value={} inscriptions={} (累計 {} / 目標 {})",
            utxo.out_point.txid, utxo.out_point.vout, utxo.value_sats(), utxo.inscriptions.len(),
            accumulated, target_sats
        );
        selected.push(utxo);
        if accumulated >= target_sats {
            break;
        }
    }

    if accumulated < target_sats {
        return Err(AppError::InsufficientFunds {
            available: accumulated,
            required: target_sats,
        });
    }

    log::info!("{} 個の UTXO を選択しました (合計 {} sats)", selected.len(), accumulated);
    Ok(SelectionResult {
        selected,
        total_selected_sats: accumulated,
    })
}
