//! Host-defined capability contracts.
//!
//! The set of contracts is fixed at compile time. A plugin entry satisfies a
//! contract when the matching function slot is present; contracts are
//! independent of each other.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use modhost_sdk::{ActivateFn, STATUS_OK};

use super::activation::ActivationFailure;
use super::loader::LoadedModule;
use super::registry::{CapabilityRegistry, Registries};

/// Capability contracts, in activation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Capability {
    /// Lifecycle initialization.
    Initializer,
    /// Provides a mount handler.
    MountProvider,
    /// Provides a bind handler.
    BindProvider,
}

impl Capability {
    /// All contracts in declaration order.
    pub const ALL: [Capability; 3] = [
        Capability::Initializer,
        Capability::MountProvider,
        Capability::BindProvider,
    ];

    /// Contract name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Initializer => "Initializer",
            Self::MountProvider => "MountProvider",
            Self::BindProvider => "BindProvider",
        }
    }

    /// Name of the contract's single operation.
    pub fn operation(self) -> &'static str {
        match self {
            Self::Initializer => "init",
            Self::MountProvider => "mount",
            Self::BindProvider => "bind",
        }
    }

    /// Flag of this contract in a [`CapabilitySet`].
    pub fn flag(self) -> CapabilitySet {
        match self {
            Self::Initializer => CapabilitySet::INITIALIZER,
            Self::MountProvider => CapabilitySet::MOUNT_PROVIDER,
            Self::BindProvider => CapabilitySet::BIND_PROVIDER,
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags::bitflags! {
    /// Contracts satisfied by one plugin entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CapabilitySet: u8 {
        const INITIALIZER = 1 << 0;
        const MOUNT_PROVIDER = 1 << 1;
        const BIND_PROVIDER = 1 << 2;
    }
}

impl CapabilitySet {
    /// Iterate the contracts in the set, in declaration order.
    pub fn capabilities(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(capability.flag()))
    }
}

/// Untyped capability handle: one function slot of a loaded module.
///
/// Keeps the module alive so the function pointer stays valid.
#[derive(Debug, Clone)]
pub struct RawHandle {
    capability: Capability,
    module: Arc<LoadedModule>,
    func: ActivateFn,
}

impl RawHandle {
    pub(crate) fn new(capability: Capability, module: Arc<LoadedModule>, func: ActivateFn) -> Self {
        Self {
            capability,
            module,
            func,
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Absolute path of the module providing this handle.
    pub fn path(&self) -> &Path {
        self.module.path()
    }

    pub fn plugin_name(&self) -> &str {
        self.module.name()
    }

    /// Call the capability's operation on the current thread.
    pub fn invoke(&self) -> Result<(), ActivationFailure> {
        // SAFETY: the slot comes from a validated entry and the module that
        // owns the code is kept alive by `self.module`.
        let status = unsafe { (self.func)() };
        if status == STATUS_OK {
            Ok(())
        } else {
            Err(ActivationFailure::Status(status))
        }
    }
}

/// Common surface of the typed handles.
pub trait CapabilityHandle: Clone + Send + Sync + 'static {
    fn raw(&self) -> &RawHandle;

    fn path(&self) -> &Path {
        self.raw().path()
    }
}

/// Handle of a plugin satisfying [`Initializer`].
#[derive(Debug, Clone)]
pub struct InitializerHandle(RawHandle);

impl InitializerHandle {
    /// Run the plugin's lifecycle initialization.
    pub fn init(&self) -> Result<(), ActivationFailure> {
        self.0.invoke()
    }
}

/// Handle of a plugin satisfying [`MountProvider`].
#[derive(Debug, Clone)]
pub struct MountHandle(RawHandle);

impl MountHandle {
    /// Install the plugin's mount handler.
    pub fn mount(&self) -> Result<(), ActivationFailure> {
        self.0.invoke()
    }
}

/// Handle of a plugin satisfying [`BindProvider`].
#[derive(Debug, Clone)]
pub struct BindHandle(RawHandle);

impl BindHandle {
    /// Install the plugin's bind handler.
    pub fn bind(&self) -> Result<(), ActivationFailure> {
        self.0.invoke()
    }
}

impl CapabilityHandle for InitializerHandle {
    fn raw(&self) -> &RawHandle {
        &self.0
    }
}

impl CapabilityHandle for MountHandle {
    fn raw(&self) -> &RawHandle {
        &self.0
    }
}

impl CapabilityHandle for BindHandle {
    fn raw(&self) -> &RawHandle {
        &self.0
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Compile-time selector of one capability contract.
///
/// Used to query registries with a handle typed to the contract:
///
/// ```rust,ignore
/// let mount = host.get_by_name::<MountProvider>("echo.so")?;
/// mount.mount()?;
/// ```
pub trait Contract: sealed::Sealed + Send + Sync + 'static {
    const CAPABILITY: Capability;

    type Handle: CapabilityHandle;

    #[doc(hidden)]
    fn wrap(raw: RawHandle) -> Self::Handle;

    #[doc(hidden)]
    fn registry(registries: &Registries) -> &CapabilityRegistry<Self::Handle>;
}

/// Marker for the lifecycle initialization contract.
#[derive(Debug, Clone, Copy)]
pub struct Initializer;

/// Marker for the mount handler contract.
#[derive(Debug, Clone, Copy)]
pub struct MountProvider;

/// Marker for the bind handler contract.
#[derive(Debug, Clone, Copy)]
pub struct BindProvider;

impl sealed::Sealed for Initializer {}
impl sealed::Sealed for MountProvider {}
impl sealed::Sealed for BindProvider {}

impl Contract for Initializer {
    const CAPABILITY: Capability = Capability::Initializer;
    type Handle = InitializerHandle;

    fn wrap(raw: RawHandle) -> InitializerHandle {
        InitializerHandle(raw)
    }

    fn registry(registries: &Registries) -> &CapabilityRegistry<InitializerHandle> {
        &registries.initializers
    }
}

impl Contract for MountProvider {
    const CAPABILITY: Capability = Capability::MountProvider;
    type Handle = MountHandle;

    fn wrap(raw: RawHandle) -> MountHandle {
        MountHandle(raw)
    }

    fn registry(registries: &Registries) -> &CapabilityRegistry<MountHandle> {
        &registries.mounts
    }
}

impl Contract for BindProvider {
    const CAPABILITY: Capability = Capability::BindProvider;
    type Handle = BindHandle;

    fn wrap(raw: RawHandle) -> BindHandle {
        BindHandle(raw)
    }

    fn registry(registries: &Registries) -> &CapabilityRegistry<BindHandle> {
        &registries.binds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order() {
        assert_eq!(
            Capability::ALL,
            [
                Capability::Initializer,
                Capability::MountProvider,
                Capability::BindProvider
            ]
        );
        assert!(Capability::Initializer < Capability::MountProvider);
    }

    #[test]
    fn test_set_iterates_in_order() {
        let set = CapabilitySet::BIND_PROVIDER | CapabilitySet::INITIALIZER;
        let caps: Vec<_> = set.capabilities().collect();
        assert_eq!(caps, vec![Capability::Initializer, Capability::BindProvider]);

        assert_eq!(CapabilitySet::empty().capabilities().count(), 0);
    }

    #[test]
    fn test_flags_roundtrip() {
        for capability in Capability::ALL {
            let caps: Vec<_> = capability.flag().capabilities().collect();
            assert_eq!(caps, vec![capability]);
        }
    }

    #[test]
    fn test_contract_constants() {
        assert_eq!(Initializer::CAPABILITY, Capability::Initializer);
        assert_eq!(MountProvider::CAPABILITY, Capability::MountProvider);
        assert_eq!(BindProvider::CAPABILITY, Capability::BindProvider);
        assert_eq!(Capability::MountProvider.operation(), "mount");
    }
}
