/// Lifecycle hooks a skill host invokes.
///
/// Hooks may be called from different threads (the remote session, a signal
/// handler), never concurrently with themselves for the same peer.
pub trait Skill: Send + Sync {
    /// The host has loaded the skill.
    fn on_start(&self);

    /// A remote peer attached. Acquire hardware here.
    fn on_connect(&self);

    /// The remote peer went away.
    fn on_disconnect(&self);

    /// The host is shutting down. Release hardware here.
    fn on_close(&self);

    /// A text message arrived from the remote peer.
    fn on_recv_string(&self, data: &str);
}
