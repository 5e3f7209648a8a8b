/// Describes Vulkan resources which can be destroyed
///
/// Implementations null their handles once destroyed, so calling [`Destructible::destroy`]
/// more than once (or letting `Drop` run after an explicit destroy) is a no-op.
pub trait Destructible {
    /// Destroy the resource
    fn destroy(&mut self);
}
