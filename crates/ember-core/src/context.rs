//! Diagnostic call stack.
//!
//! An [`ExecutionContext`] records one [`StackFrame`] per active function
//! call or constructor invocation. Frames are pushed through
//! [`ExecutionContext::push`], which hands back a [`FrameGuard`]; dropping
//! the guard pops the frame, so an error propagating with `?` never leaves
//! stale frames behind.
//!
//! The context is a cheap clonable handle. Clones share the same stack,
//! which is how a calling context is reused across nested constructions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::RuntimeError;

/// What pushed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A script or native function call.
    Function,
    /// A constructor invocation.
    Constructor,
    /// A frame with no callee, kept only so traces stay non-empty.
    Synthetic,
}

/// One entry of the diagnostic call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub label: String,
    pub kind: FrameKind,
}

impl StackFrame {
    pub fn function(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: FrameKind::Function,
        }
    }

    pub fn constructor(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: FrameKind::Constructor,
        }
    }

    pub fn synthetic(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: FrameKind::Synthetic,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FrameKind::Function => write!(f, "at {}", self.label),
            FrameKind::Constructor => write!(f, "at new {}", self.label),
            FrameKind::Synthetic => write!(f, "at <{}>", self.label),
        }
    }
}

#[derive(Debug, Default)]
struct ContextState {
    frames: Vec<StackFrame>,
    max_depth: Option<usize>,
    trace_frames: bool,
}

/// Shared handle to a diagnostic call stack.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    state: Rc<RefCell<ContextState>>,
}

impl ExecutionContext {
    /// Create an empty context with no depth limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of simultaneously active frames.
    pub fn with_max_depth(self, max_depth: Option<usize>) -> Self {
        self.state.borrow_mut().max_depth = max_depth;
        self
    }

    /// Log every push and pop at `trace` level.
    pub fn with_frame_tracing(self, enabled: bool) -> Self {
        self.state.borrow_mut().trace_frames = enabled;
        self
    }

    /// Push a frame. The frame is popped when the returned guard drops.
    pub fn push(&self, frame: StackFrame) -> Result<FrameGuard, RuntimeError> {
        let mut state = self.state.borrow_mut();
        if let Some(limit) = state.max_depth
            && state.frames.len() >= limit
        {
            return Err(RuntimeError::StackOverflow { limit });
        }
        if state.trace_frames {
            tracing::trace!(depth = state.frames.len(), frame = %frame, "push frame");
        }
        state.frames.push(frame);
        let depth = state.frames.len();
        Ok(FrameGuard {
            context: self.clone(),
            depth,
        })
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// Snapshot of the active frames, outermost first.
    pub fn frames(&self) -> Vec<StackFrame> {
        self.state.borrow().frames.clone()
    }

    /// Render the active frames, innermost first, one per line.
    pub fn stack_trace(&self) -> String {
        let state = self.state.borrow();
        let mut out = String::new();
        for frame in state.frames.iter().rev() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&frame.to_string());
        }
        out
    }

    /// Whether two handles share one stack.
    pub fn same_as(&self, other: &ExecutionContext) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    fn pop_to(&self, depth: usize) {
        let mut state = self.state.borrow_mut();
        if state.trace_frames
            && let Some(frame) = state.frames.last()
        {
            tracing::trace!(depth, frame = %frame, "pop frame");
        }
        state.frames.truncate(depth);
    }
}

/// Pops its frame (and anything pushed after it) on drop.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FrameGuard {
    context: ExecutionContext,
    depth: usize,
}

impl FrameGuard {
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.context.pop_to(self.depth.saturating_sub(1));
    }
}
