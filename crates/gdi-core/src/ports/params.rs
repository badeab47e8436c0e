//! ParameterSource port - 実行時に変わりうる key/value パラメータ
//!
//! 設定の再読込で値が変わることがあるので、呼び出し側は毎回読み直します。

pub const GDI_RETRIES: &str = "gdi_retries";
pub const GDI_TIMEOUT: &str = "gdi_timeout";
pub const CL_PING: &str = "cl_ping";

pub trait ParameterSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}
