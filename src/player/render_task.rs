use crate::audio::{Completion, OutputBackend, SharedGraph};
use crate::player::PLAYER_LOG_TARGET;
use std::io;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

/// Called once with the reason the graph stopped being mixed.
pub type OnCompleteCallback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// Starts the render thread for one graph: it attaches the graph to the backend,
/// waits for its completion and reports it through `on_complete`.
///
/// The thread receives only `(id, graph)`, captured while the session lock was
/// held; it never reads session fields.
pub(crate) fn spawn_render_thread(
    id: u64,
    graph: SharedGraph,
    backend: Arc<OutputBackend>,
    on_complete: OnCompleteCallback,
) -> io::Result<()> {
    thread::Builder::new()
        .name(format!("render-{}", id))
        .spawn(move || {
            trace!(target: PLAYER_LOG_TARGET, id, "Render thread attaching graph");
            let completion_rx = backend.attach(id, graph);
            // Holding the backend while waiting would keep it alive past its owner.
            drop(backend);
            let completion = completion_rx.recv().unwrap_or(Completion::Detached);
            debug!(target: PLAYER_LOG_TARGET, id, ?completion, "Render thread finished");
            on_complete(completion);
        })
        .map(|_| ())
}
