/// Breaks the `Rc` cycle between an engine and the channel closure that owns
/// a handle to it. Call before dropping the last outside reference.
pub trait Destroyable {
    fn destroy(&mut self);
}
