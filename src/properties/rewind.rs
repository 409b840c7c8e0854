use crate::properties::PhysicalProp;

/// Whether a plan fragment can be rescanned without re-executing its inputs.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Rewindability {
    /// No requirement.
    #[default]
    Any,
    Rewindable,
}

impl PhysicalProp for Rewindability {
    fn satisfies(&self, required: &Self) -> bool {
        match (self, required) {
            (_, Rewindability::Any) => true,
            (Rewindability::Rewindable, Rewindability::Rewindable) => true,
            _ => false,
        }
    }
}
