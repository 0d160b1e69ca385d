use bitcoin::{Amount, OutPoint, ScriptBuf, TxOut};
use serde_json::Value;

/// フィルタを通過した UTXO。リクエスト内でのみ使われ、構築後は変更しない。
#[derive(Debug, Clone, PartialEq)]
pub struct UtxoDescriptor {
    pub out_point: OutPoint,
    pub tx_out: TxOut, // value と script_pubkey
    pub inscriptions: Vec<Value>,
}

impl UtxoDescriptor {
    pub fn value_sats(&self) -> u64 {
        self.tx_out.value.to_sat()
    }

    pub fn script_pubkey(&self) -> &ScriptBuf {
        &self.tx_out.script_pubkey
    }
}

/// アドレスをデコード済みの支払い先。順序はリクエストのまま保持する。
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTarget {
    pub address: String,
    pub script_pubkey: ScriptBuf,
    pub amount: Amount,
}

impl PaymentTarget {
    pub fn is_taproot(&self) -> bool {
        self.script_pubkey.is_p2tr()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    pub selected: Vec<UtxoDescriptor>,
    pub total_selected_sats: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeeMode {
    /// None の場合はポリシーのデフォルト手数料を使う
    Flat(Option<u64>),
    Rate(f64),
}

impl FeeMode {
    /// fee_rate が指定されていれば flat fee より常に優先する。
    pub fn from_request(flat_fee: Option<u64>, fee_rate: Option<f64>) -> Self {
        match fee_rate {
            Some(rate) => FeeMode::Rate(rate),
            None => FeeMode::Flat(flat_fee),
        }
    }
}

/// total_selected == 支払い合計 + fee + change が常に成り立つ。
/// flat モードでは change が負になり得るため符号付きで持つ。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeePlan {
    pub fee_sats: u64,
    pub change_sats: i64,
    pub estimated_vsize: Option<u64>,
    pub effective_fee_rate: Option<f64>,
}

impl FeePlan {
    /// おつり出力を追加する場合はその金額を返す。
    pub fn change_output_value(&self) -> Option<Amount> {
        (self.change_sats > 0).then(|| Amount::from_sat(self.change_sats as u64))
    }
}
