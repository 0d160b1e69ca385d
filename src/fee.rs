use bitcoin::Amount;

use crate::{
    config::PolicyConfig,
    error::AppError,
    types::{FeeMode, FeePlan, PaymentTarget, SelectionResult},
};

// vsize 推定用の固定値 (vbytes)
const TX_OVERHEAD_VBYTES: u64 = 10; // version / locktime / varints
const P2WPKH_INPUT_VBYTES: u64 = 68; // 入力は全て P2WPKH とみなす
const P2WPKH_OUTPUT_VBYTES: u64 = 31;
const P2TR_OUTPUT_VBYTES: u64 = 43;
const CHANGE_OUTPUT_VBYTES: u64 = P2WPKH_OUTPUT_VBYTES;

/// おつり出力を含まない状態の推定 vsize。
/// Taproot 以外の出力は全て P2WPKH の大きさで近似する。
pub fn estimate_vsize(input_count: usize, targets: &[PaymentTarget]) -> u64 {
    let outputs: u64 = targets
        .iter()
        .map(|t| if t.is_taproot() { P2TR_OUTPUT_VBYTES } else { P2WPKH_OUTPUT_VBYTES })
        .sum();
    TX_OVERHEAD_VBYTES + input_count as u64 * P2WPKH_INPUT_VBYTES + outputs
}

/// 手数料が MAX_MONEY を超える場合は検証エラー
fn check_fee(fee: u64) -> Result<u64, AppError> {
    if fee > Amount::MAX_MONEY.to_sat() {
        return Err(AppError::InputValidation(format!("fee {} sats exceeds the maximum amount", fee)));
    }
    Ok(fee)
}

fn fee_for(rate: f64, vsize: u64) -> Result<u64, AppError> {
    let fee = (rate * vsize as f64).ceil();
    if !fee.is_finite() || fee < 0.0 || fee > Amount::MAX_MONEY.to_sat() as f64 {
        return Err(AppError::InputValidation(format!(
            "fee rate {} sat/vB gives an out-of-range fee for {} vB",
            rate, vsize
        )));
    }
    Ok(fee as u64)
}

fn change_after(total_selected: u64, total_payment: u64, fee: u64) -> Result<i64, AppError> {
    let change = i128::from(total_selected) - i128::from(total_payment) - i128::from(fee);
    i64::try_from(change).map_err(|_| AppError::InputValidation(format!("change {} sats is out of range", change)))
}

pub fn plan_fee(
    selection: &SelectionResult,
    targets: &[PaymentTarget],
    mode: FeeMode,
    policy: &PolicyConfig,
) -> Result<FeePlan, AppError> {
    let total_payment = targets
        .iter()
        .try_fold(0u64, |acc, t| acc.checked_add(t.amount.to_sat()))
        .ok_or_else(|| AppError::InputValidation("output amounts overflow".to_string()))?;
    let total_selected = selection.total_selected_sats;

    match mode {
        FeeMode::Flat(flat_fee) => {
            let fee = check_fee(flat_fee.unwrap_or(policy.default_flat_fee))?;
            let change = change_after(total_selected, total_payment, fee)?;
            if change < 0 {
                // 不足分はおつり無しとして扱われ、そのままマイナーの手数料になる
                log::warn!("固定手数料 {} sats に対しておつりが負です ({} sats)", fee, change);
            }
            log::debug!("固定手数料: fee={} change={}", fee, change);
            Ok(FeePlan {
                fee_sats: fee,
                change_sats: change,
                estimated_vsize: None,
                effective_fee_rate: None,
            })
        }
        FeeMode::Rate(rate) => {
            let mut vsize = estimate_vsize(selection.selected.len(), targets);
            let mut fee = fee_for(rate, vsize)?;
            let mut change = change_after(total_selected, total_payment, fee)?;
            log::debug!("手数料率 {} sat/vB: vsize={} fee={} change={} (おつり出力なし)", rate, vsize, fee, change);

            let min_change = i64::try_from(policy.min_utxo_value).unwrap_or(i64::MAX);
            if change >= min_change {
                vsize += CHANGE_OUTPUT_VBYTES;
                fee = fee_for(rate, vsize)?;
                change = change_after(total_selected, total_payment, fee)?;
                log::debug!("おつり出力を追加: vsize={} fee={} change={}", vsize, fee, change);

                if change < min_change {
                    // 出力追加で手数料が増えダストになったので元に戻す
                    vsize -= CHANGE_OUTPUT_VBYTES;
                    let size_fee = fee_for(rate, vsize)?;
                    // 出力にしない残額は手数料として報告する (size_fee 以上であることは保証済み)
                    fee = total_selected - total_payment;
                    change = 0;
                    log::debug!(
                        "おつりがダストのため削除: vsize={} 推定手数料={} 実手数料={}",
                        vsize, size_fee, fee
                    );
                }
            } else if change > 0 {
                log::warn!(
                    "おつり {} sats は最小値 {} sats 未満ですが、推定サイズに含めずに出力されます",
                    change, policy.min_utxo_value
                );
            }

            Ok(FeePlan {
                fee_sats: fee,
                change_sats: change,
                estimated_vsize: Some(vsize),
                effective_fee_rate: Some(rate),
            })
        }
    }
}
