/// Per-client yes/no request gate consulted by the ingress filter. The
/// windowing algorithm behind it is not the engine's concern.
pub trait RateGate: Send + Sync {
    fn allow(&self, client: &str, now_ms: i64) -> bool;
}
