//! 引擎指标：操作次数、错误次数、存储耗时
//!
//! 只通过 `metrics` 宏记录，未安装 Recorder 时为空操作。

const COUNTER_OPS_TOTAL: &str = "participant_engine_ops_total";
const COUNTER_ERRORS_TOTAL: &str = "participant_engine_errors_total";
const HISTOGRAM_STORAGE_DURATION: &str = "participant_engine_storage_duration_seconds";
const COUNTER_DISPATCH_TOTAL: &str = "participant_engine_dispatch_total";

/// 记录一次引擎操作
pub fn record_op(op: &'static str) {
    metrics::counter!(COUNTER_OPS_TOTAL, "op" => op).increment(1);
}

/// 记录一次操作失败
pub fn record_error(op: &'static str, kind: &'static str) {
    metrics::counter!(COUNTER_ERRORS_TOTAL, "op" => op, "kind" => kind).increment(1);
}

/// 记录存储调用耗时
pub fn record_storage(call: &'static str, duration_secs: f64) {
    metrics::histogram!(HISTOGRAM_STORAGE_DURATION, "call" => call).record(duration_secs);
}

/// 记录分发的入站命令
pub fn record_dispatch(route: &'static str) {
    metrics::counter!(COUNTER_DISPATCH_TOTAL, "route" => route).increment(1);
}
