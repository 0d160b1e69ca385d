use bitcoin::{
    absolute::LockTime, network::Network as BitcoinNetwork, transaction::Version, Address, Amount,
    Psbt, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};
use std::str::FromStr;

use crate::{
    config::OutputDef,
    error::AppError,
    types::{FeePlan, PaymentTarget, SelectionResult},
};

/// 支払い先アドレスを locking script へデコードする。
/// 指定ネットワーク以外のアドレスや金額 0 の出力は検証エラー。
pub fn decode_targets(
    outputs: &[OutputDef],
    network: BitcoinNetwork,
) -> Result<Vec<PaymentTarget>, AppError> {
    outputs
        .iter()
        .map(|output_def| {
            if output_def.amount == 0 || output_def.amount > Amount::MAX_MONEY.to_sat() {
                return Err(AppError::InputValidation(format!(
                    "output amount {} is out of range ({})",
                    output_def.amount, output_def.address
                )));
            }
            let address = Address::from_str(&output_def.address)
                .and_then(|addr| addr.require_network(network))
                .map_err(|e| AppError::InvalidAddress {
                    address: output_def.address.clone(),
                    source: e,
                })?;
            Ok(PaymentTarget {
                address: output_def.address.clone(),
                script_pubkey: address.script_pubkey(),
                amount: Amount::from_sat(output_def.amount),
            })
        })
        .collect()
}

/// 未署名トランザクションを組み立てる。
/// おつりは最初に選択した入力と同じ script へ戻す。
pub fn build_unsigned_transaction(
    selection: &SelectionResult,
    targets: &[PaymentTarget],
    plan: &FeePlan,
) -> Result<Transaction, AppError> {
    let input: Vec<TxIn> = selection
        .selected
        .iter()
        .map(|utxo| TxIn {
            previous_output: utxo.out_point,
            script_sig: ScriptBuf::new(), // 署名前は空
            sequence: Sequence::MAX,
            witness: Witness::new(),
        })
        .collect();

    let mut output: Vec<TxOut> = targets
        .iter()
        .map(|target| {
            log::debug!("出力追加: {} -> {} sats", target.address, target.amount.to_sat());
            TxOut {
                value: target.amount,
                script_pubkey: target.script_pubkey.clone(),
            }
        })
        .collect();

    if let Some(change_value) = plan.change_output_value() {
        let first = selection
            .selected
            .first()
            .ok_or_else(|| AppError::Internal("selection is empty".to_string()))?;
        log::debug!("おつり出力: {} sats -> {}", change_value.to_sat(), first.script_pubkey().to_hex_string());
        output.push(TxOut {
            value: change_value,
            script_pubkey: first.script_pubkey().clone(),
        });
    }

    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    })
}

/// トランザクションを PSBT に包み、各入力に witness_utxo を設定する。
pub fn wrap_psbt(tx: Transaction, selection: &SelectionResult) -> Result<Psbt, AppError> {
    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    for (input, utxo) in psbt.inputs.iter_mut().zip(selection.selected.iter()) {
        input.witness_utxo = Some(utxo.tx_out.clone());
    }
    Ok(psbt)
}

pub fn assemble(
    selection: &SelectionResult,
    targets: &[PaymentTarget],
    plan: &FeePlan,
) -> Result<Psbt, AppError> {
    let tx = build_unsigned_transaction(selection, targets, plan)?;
    log::info!(
        "未署名トランザクションを構築しました: 入力 {} / 出力 {}",
        tx.input.len(),
        tx.output.len()
    );
    wrap_psbt(tx, selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UtxoDescriptor;
    use bitcoin::{OutPoint, Txid};

    const TXID: &str = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";
    const P2WPKH_ADDR: &str = "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh";
    const P2TR_ADDR: &str = "bc1pxwww0ct9ue7e8tdnlmug5m2tamfn7q06sahstg39ys4c9f3340qqxrdu9k";

    fn utxo(vout: u32, value: u64, spk_byte: u8) -> UtxoDescriptor {
        let mut script = vec![0x00, 0x14];
        script.extend([spk_byte; 20]);
        UtxoDescriptor {
            out_point: OutPoint::new(Txid::from_str(TXID).unwrap(), vout),
            tx_out: TxOut {
                value: Amount::from_sat(value),
                script_pubkey: ScriptBuf::from_bytes(script),
            },
            inscriptions: Vec::new(),
        }
    }

    fn output(address: &str, amount: u64) -> OutputDef {
        OutputDef { address: address.to_string(), amount }
    }

    fn plan(fee: u64, change: i64) -> FeePlan {
        FeePlan { fee_sats: fee, change_sats: change, estimated_vsize: None, effective_fee_rate: None }
    }

    #[test]
    fn decodes_segwit_and_taproot_addresses() {
        let targets = decode_targets(
            &[output(P2WPKH_ADDR, 9_000), output(P2TR_ADDR, 1_000)],
            BitcoinNetwork::Bitcoin,
        )
        .unwrap();
        assert!(targets[0].script_pubkey.is_p2wpkh());
        assert!(!targets[0].is_taproot());
        assert!(targets[1].is_taproot());
    }

    #[test]
    fn rejects_wrong_network_and_zero_amount() {
        let err = decode_targets(&[output(P2WPKH_ADDR, 9_000)], BitcoinNetwork::Testnet).unwrap_err();
        assert!(matches!(err, AppError::InvalidAddress { .. }));

        let err = decode_targets(&[output("not-an-address", 9_000)], BitcoinNetwork::Bitcoin).unwrap_err();
        assert!(matches!(err, AppError::InvalidAddress { .. }));

        let err = decode_targets(&[output(P2WPKH_ADDR, 0)], BitcoinNetwork::Bitcoin).unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));

        let too_much = Amount::MAX_MONEY.to_sat() + 1;
        let err = decode_targets(&[output(P2WPKH_ADDR, too_much)], BitcoinNetwork::Bitcoin).unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
    }

    #[test]
    fn change_goes_to_first_input_script() {
        let selection = SelectionResult {
            selected: vec![utxo(0, 6_000, 0x11), utxo(1, 5_000, 0x22)],
            total_selected_sats: 11_000,
        };
        let targets = decode_targets(
            &[output(P2TR_ADDR, 1_000), output(P2WPKH_ADDR, 9_000)],
            BitcoinNetwork::Bitcoin,
        )
        .unwrap();
        let tx = build_unsigned_transaction(&selection, &targets, &plan(200, 800)).unwrap();

        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.input[0].previous_output.vout, 0);
        assert_eq!(tx.input[1].previous_output.vout, 1);
        assert_eq!(tx.output.len(), 3);
        assert_eq!(tx.output[0].value, Amount::from_sat(1_000));
        assert_eq!(tx.output[1].value, Amount::from_sat(9_000));
        assert_eq!(tx.output[2].value, Amount::from_sat(800));
        assert_eq!(tx.output[2].script_pubkey, selection.selected[0].tx_out.script_pubkey);
    }

    #[test]
    fn no_change_output_when_change_not_positive() {
        let selection = SelectionResult { selected: vec![utxo(0, 9_100, 0x11)], total_selected_sats: 9_100 };
        let targets = decode_targets(&[output(P2WPKH_ADDR, 9_000)], BitcoinNetwork::Bitcoin).unwrap();
        for change in [0, -100] {
            let tx = build_unsigned_transaction(&selection, &targets, &plan(200, change)).unwrap();
            assert_eq!(tx.output.len(), 1);
        }
    }

    #[test]
    fn psbt_carries_witness_utxos() {
        let selection = SelectionResult {
            selected: vec![utxo(3, 6_000, 0x11), utxo(7, 5_000, 0x22)],
            total_selected_sats: 11_000,
        };
        let targets = decode_targets(&[output(P2WPKH_ADDR, 10_000)], BitcoinNetwork::Bitcoin).unwrap();
        let psbt = assemble(&selection, &targets, &plan(200, 800)).unwrap();

        assert_eq!(psbt.inputs.len(), 2);
        for (input, utxo) in psbt.inputs.iter().zip(&selection.selected) {
            assert_eq!(input.witness_utxo.as_ref(), Some(&utxo.tx_out));
        }
        assert_eq!(psbt.unsigned_tx.input[1].previous_output.vout, 7);

        let encoded = psbt.to_string();
        assert!(encoded.starts_with("cHNidP8"));
        let decoded = Psbt::from_str(&encoded).unwrap();
        assert_eq!(decoded.unsigned_tx, psbt.unsigned_tx);
    }
}
