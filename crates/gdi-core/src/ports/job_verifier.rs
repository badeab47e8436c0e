//! JobVerifier port - ジョブ投入前の検証/書き換え
//!
//! 検証器はジョブを丸ごと別のオブジェクトに置き換えることがあります。
//! そのため呼び出し側は 1 件ずつリストから外してから渡し、戻ってきた
//! オブジェクトを挿し直します。

use crate::domain::{AnswerList, Object};

pub trait JobVerifier: Send + Sync {
    /// Verify one job. Returns the (possibly replaced) job and whether it was
    /// accepted; reasons go into `answers`.
    fn verify(&self, job: Object, answers: &mut AnswerList) -> (Object, bool);
}
