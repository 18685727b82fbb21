//! Per-pass policy carried by every Context.

/// Policy options a pass run is configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Keep `debug_value` users alive: a producer whose only other user
    /// is a debug instruction is not treated as single-use, and erasures
    /// that would drop debug users are refused.
    pub preserve_debug_info: bool,
    /// Configuration of escape walks run by cached analyses.
    pub escape: EscapeConfig,
}

/// Escape walk configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscapeConfig {
    /// Follow values loaded from tracked memory (and values stored into
    /// it). When off, storing a tracked value counts as an escape.
    pub follow_loads: bool,
    /// Treat values of trivial, non-address types as never escaping.
    pub ignore_trivial: bool,
    /// Walk steps before giving up and answering "escapes".
    pub complexity_budget: usize,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        EscapeConfig {
            follow_loads: true,
            ignore_trivial: true,
            complexity_budget: 256,
        }
    }
}
