//! Runtime configuration.

use ember_core::ExecutionContext;

/// Host-side knobs for an [`Assembly`](crate::Assembly).
///
/// # Example
///
/// ```
/// use ember::RuntimeConfig;
///
/// let config = RuntimeConfig::new()
///     .with_max_call_depth(256)
///     .with_frame_tracing(true);
/// assert_eq!(config.max_call_depth(), Some(256));
/// assert!(config.check_return_types());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    max_call_depth: Option<usize>,
    check_return_types: bool,
    trace_frames: bool,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            max_call_depth: None,
            check_return_types: true,
            trace_frames: false,
        }
    }

    /// Ceiling on simultaneously active call frames.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = Some(depth);
        self
    }

    /// Check function results against their declared return type.
    pub fn with_return_type_checks(mut self, enabled: bool) -> Self {
        self.check_return_types = enabled;
        self
    }

    /// Log every pushed and popped frame at `trace` level.
    pub fn with_frame_tracing(mut self, enabled: bool) -> Self {
        self.trace_frames = enabled;
        self
    }

    pub fn max_call_depth(&self) -> Option<usize> {
        self.max_call_depth
    }

    pub fn check_return_types(&self) -> bool {
        self.check_return_types
    }

    pub fn trace_frames(&self) -> bool {
        self.trace_frames
    }

    /// A fresh execution context honoring these settings.
    pub fn new_context(&self) -> ExecutionContext {
        ExecutionContext::new()
            .with_max_depth(self.max_call_depth)
            .with_frame_tracing(self.trace_frames)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::StackFrame;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_call_depth(), None);
        assert!(config.check_return_types());
        assert!(!config.trace_frames());
    }

    #[test]
    fn context_honors_depth() {
        let ctx = RuntimeConfig::new().with_max_call_depth(1).new_context();
        let _a = ctx.push(StackFrame::function("a")).unwrap();
        assert!(ctx.push(StackFrame::function("b")).is_err());
    }
}
