use bitcoin::{Amount, OutPoint, ScriptBuf, TxOut, Txid};
use std::str::FromStr;

use crate::{
    config::{PolicyConfig, RawUtxo},
    error::AppError,
    types::UtxoDescriptor,
};

// インスクリプション付き UTXO によく使われる金額
const INSCRIPTION_POSTAGE_SATS: u64 = 546;

/// 生の UTXO レコードを正規化し、ポリシーに合わないものを黙って除外する。
/// 1件も残らなければ `NoCandidates` を返す。
pub fn filter_candidates(
    raw_utxos: &[RawUtxo],
    policy: &PolicyConfig,
) -> Result<Vec<UtxoDescriptor>, AppError> {
    let candidates: Vec<UtxoDescriptor> = raw_utxos
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let descriptor = accept(raw, policy);
            if descriptor.is_none() {
                log::debug!("UTXO #{} を候補から除外しました: {:?}", index, raw);
            }
            descriptor
        })
        .collect();

    if candidates.is_empty() {
        log::warn!("フィルタ後に候補となる UTXO がありません (入力 {} 件)", raw_utxos.len());
        return Err(AppError::NoCandidates);
    }
    log::info!("候補 UTXO: {} / {} 件", candidates.len(), raw_utxos.len());
    Ok(candidates)
}

fn accept(raw: &RawUtxo, policy: &PolicyConfig) -> Option<UtxoDescriptor> {
    let txid_hex = raw.txid_hex()?;
    let script_hex = raw.script_hex()?;
    let value = raw.value_sats();

    if policy.skip_inscriptions && !raw.inscriptions.is_empty() {
        return None;
    }
    if policy.skip_546 && value == INSCRIPTION_POSTAGE_SATS {
        return None;
    }
    if value < policy.min_utxo_value || value > Amount::MAX_MONEY.to_sat() {
        return None;
    }

    // 形式不正なレコードもここで落とす
    let vout = raw.vout?;
    let txid = Txid::from_str(txid_hex).ok()?;
    let script_pubkey = ScriptBuf::from_bytes(hex::decode(script_hex).ok()?);

    Some(UtxoDescriptor {
        out_point: OutPoint::new(txid, vout),
        tx_out: TxOut {
            value: Amount::from_sat(value),
            script_pubkey,
        },
        inscriptions: raw.inscriptions.clone(),
    })
}
