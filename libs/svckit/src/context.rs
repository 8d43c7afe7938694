use tokio_util::sync::CancellationToken;

/// Shared execution context handed to every subsystem lifecycle call.
///
/// Created once per [`Manager::init`](crate::Manager::init); the same
/// instance is passed to every subsystem, and its cancellation token is
/// cancelled exactly once, during [`Manager::close`](crate::Manager::close).
/// Long-lived background work (batch reporters, serve loops) should watch
/// the token and wind down when it fires.
#[derive(Clone, Debug)]
pub struct ServiceCtx {
    cancel: CancellationToken,
}

impl ServiceCtx {
    /// Create a context with a fresh cancellation token.
    ///
    /// Normally the manager does this; tests and standalone subsystem
    /// drivers may build their own.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// The process-wide cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Child token for work that may be cancelled independently but must
    /// also stop when the whole service shuts down.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// True once shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Default for ServiceCtx {
    fn default() -> Self {
        Self::new()
    }
}
