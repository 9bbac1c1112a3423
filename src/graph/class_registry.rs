//! Type registry of replicable classes
//!
//! Every class has a parent pointer (except the root `Actor` class) and the
//! replication defaults of its default instance. Policy inheritance walks
//! these parent pointers instead of relying on language-level subclassing.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::warn;

use super::constants::class::{NET_CULL_DISTANCE_SQUARED, NET_UPDATE_FREQUENCY, TRANSIENT_PREFIXES};

/// Dense class handle, valid only for the registry that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassId(pub u32);

/// Replication state of a class's default instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorDefaults {
    pub replicates: bool,
    pub always_relevant: bool,
    pub only_relevant_to_owner: bool,
    pub net_use_owner_relevancy: bool,
    pub net_cull_distance_squared: f32,
    pub net_update_frequency: f32,
}

impl Default for ActorDefaults {
    fn default() -> Self {
        Self {
            replicates: false,
            always_relevant: false,
            only_relevant_to_owner: false,
            net_use_owner_relevancy: false,
            net_cull_distance_squared: NET_CULL_DISTANCE_SQUARED,
            net_update_frequency: NET_UPDATE_FREQUENCY,
        }
    }
}

impl ActorDefaults {
    /// Replicated and not governed by any ownership/always-relevant rule
    #[inline]
    pub fn should_spatialize(&self) -> bool {
        self.replicates
            && !(self.always_relevant || self.only_relevant_to_owner || self.net_use_owner_relevancy)
    }

    /// True when the flags that drive classification are identical
    pub fn same_relevancy(&self, other: &ActorDefaults) -> bool {
        self.replicates == other.replicates
            && self.always_relevant == other.always_relevant
            && self.only_relevant_to_owner == other.only_relevant_to_owner
            && self.net_use_owner_relevancy == other.net_use_owner_relevancy
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassDescriptor {
    pub name: String,
    pub parent: Option<ClassId>,
    pub defaults: ActorDefaults,
    /// Carries the "networked" trait required when spatial networking is on
    pub networked: bool,
    /// Declared natively (as opposed to a data-defined subclass)
    pub native: bool,
}

impl ClassDescriptor {
    /// Generated/transient artifact classes never get routing entries
    pub fn is_transient(&self) -> bool {
        TRANSIENT_PREFIXES.iter().any(|prefix| self.name.starts_with(prefix))
    }
}

/// Handles of the classes every registry starts with
#[derive(Debug, Clone, Copy)]
pub struct EngineClasses {
    pub actor: ClassId,
    pub info: ClassId,
    pub player_state: ClassId,
    pub game_mode_base: ClassId,
    pub game_state_base: ClassId,
    pub pawn: ClassId,
    pub character: ClassId,
    pub controller: ClassId,
    pub player_controller: ClassId,
    pub debug_actor: ClassId,
}

/// Registry of all known replicable classes, in registration order
/// (a parent is always registered before its children).
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: Vec<ClassDescriptor>,
    by_name: FxHashMap<String, ClassId>,
    engine: EngineClasses,
}

impl ClassRegistry {
    /// Create a registry pre-populated with the engine base classes
    pub fn new() -> Self {
        let mut classes = Vec::with_capacity(64);
        classes.push(ClassDescriptor {
            name: "Actor".to_string(),
            parent: None,
            defaults: ActorDefaults::default(),
            networked: true,
            native: true,
        });

        let mut registry = Self {
            classes,
            by_name: FxHashMap::default(),
            engine: EngineClasses {
                actor: ClassId(0),
                info: ClassId(0),
                player_state: ClassId(0),
                game_mode_base: ClassId(0),
                game_state_base: ClassId(0),
                pawn: ClassId(0),
                character: ClassId(0),
                controller: ClassId(0),
                player_controller: ClassId(0),
                debug_actor: ClassId(0),
            },
        };
        registry.by_name.insert("Actor".to_string(), ClassId(0));

        let actor = ClassId(0);
        let info = registry.register_native("Info", actor, |d| {
            d.always_relevant = true;
            d.net_update_frequency = 10.0;
        });
        let player_state = registry.register_native("PlayerState", info, |d| {
            d.replicates = true;
            d.net_update_frequency = 1.0;
        });
        let game_mode_base = registry.register_native("GameModeBase", info, |_| {});
        let game_state_base = registry.register_native("GameStateBase", info, |d| {
            d.replicates = true;
        });
        let pawn = registry.register_native("Pawn", actor, |d| {
            d.replicates = true;
        });
        let character = registry.register_native("Character", pawn, |_| {});
        let controller = registry.register_native("Controller", actor, |d| {
            d.replicates = true;
            d.only_relevant_to_owner = true;
        });
        let player_controller = registry.register_native("PlayerController", controller, |_| {});
        let debug_actor = registry.register_native("ReplicationGraphDebugActor", actor, |d| {
            d.replicates = true;
            d.only_relevant_to_owner = true;
        });

        registry.engine = EngineClasses {
            actor,
            info,
            player_state,
            game_mode_base,
            game_state_base,
            pawn,
            character,
            controller,
            player_controller,
            debug_actor,
        };
        registry
    }

    pub fn engine(&self) -> &EngineClasses {
        &self.engine
    }

    /// Register a data-defined subclass. The descriptor starts as a copy of
    /// the parent's and `configure` adjusts it.
    pub fn register<F>(&mut self, name: &str, parent: ClassId, configure: F) -> ClassId
    where
        F: FnOnce(&mut ClassDescriptor),
    {
        self.insert(name, parent, false, configure)
    }

    /// Register a natively declared class
    pub fn register_native<F>(&mut self, name: &str, parent: ClassId, configure: F) -> ClassId
    where
        F: FnOnce(&mut ActorDefaults),
    {
        self.insert(name, parent, true, |d| configure(&mut d.defaults))
    }

    fn insert<F>(&mut self, name: &str, parent: ClassId, native: bool, configure: F) -> ClassId
    where
        F: FnOnce(&mut ClassDescriptor),
    {
        if let Some(&existing) = self.by_name.get(name) {
            warn!("Class {} registered twice, keeping the first definition", name);
            return existing;
        }

        let mut descriptor = match self.get(parent) {
            Some(parent_desc) => ClassDescriptor {
                name: name.to_string(),
                parent: Some(parent),
                defaults: parent_desc.defaults.clone(),
                networked: parent_desc.networked,
                native,
            },
            None => {
                warn!("Class {} has unknown parent {:?}, registering under Actor", name, parent);
                ClassDescriptor {
                    name: name.to_string(),
                    parent: Some(ClassId(0)),
                    defaults: ActorDefaults::default(),
                    networked: true,
                    native,
                }
            }
        };
        configure(&mut descriptor);
        descriptor.name = name.to_string();

        let id = ClassId(self.classes.len() as u32);
        self.classes.push(descriptor);
        self.by_name.insert(name.to_string(), id);
        id
    }

    #[inline]
    pub fn get(&self, class: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(class.0 as usize)
    }

    pub fn name(&self, class: ClassId) -> &str {
        self.get(class).map_or("<unknown>", |d| d.name.as_str())
    }

    #[inline]
    pub fn parent(&self, class: ClassId) -> Option<ClassId> {
        self.get(class).and_then(|d| d.parent)
    }

    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// The class itself followed by each ancestor up to the root
    pub fn ancestors(&self, class: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        let start = self.get(class).map(|_| class);
        std::iter::successors(start, move |&c| self.parent(c))
    }

    /// Inclusive subclass check
    pub fn is_child_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        self.ancestors(class).any(|c| c == ancestor)
    }

    /// Nearest native class at or above `class`, stopping below the root
    pub fn native_parent(&self, class: ClassId) -> ClassId {
        let mut current = class;
        while let Some(desc) = self.get(current) {
            match desc.parent {
                Some(parent) if !desc.native && parent != self.engine.actor => current = parent,
                _ => break,
            }
        }
        current
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &ClassDescriptor)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(idx, desc)| (ClassId(idx as u32), desc))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_classes_registered() {
        let registry = ClassRegistry::new();
        let engine = *registry.engine();

        assert_eq!(registry.find("PlayerState"), Some(engine.player_state));
        assert!(registry.is_child_of(engine.player_state, engine.info));
        assert!(registry.is_child_of(engine.character, engine.actor));
        assert!(!registry.is_child_of(engine.pawn, engine.info));
        assert_eq!(registry.parent(engine.actor), None);
    }

    #[test]
    fn test_register_inherits_parent_defaults() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();

        let npc = registry.register("NPCCharacter", engine.character, |d| {
            d.defaults.net_cull_distance_squared = 400.0;
        });
        let desc = registry.get(npc).cloned();
        let desc = desc.as_ref();

        assert_eq!(desc.map(|d| d.defaults.replicates), Some(true));
        assert_eq!(desc.map(|d| d.defaults.net_cull_distance_squared), Some(400.0));
        assert_eq!(desc.map(|d| d.native), Some(false));
    }

    #[test]
    fn test_duplicate_registration_returns_existing() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();

        let first = registry.register("Crate", engine.actor, |_| {});
        let second = registry.register("Crate", engine.pawn, |_| {});
        assert_eq!(first, second);
        assert_eq!(registry.parent(second), Some(engine.actor));
    }

    #[test]
    fn test_transient_classes() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();

        let skel = registry.register("SKEL_Door_C", engine.actor, |_| {});
        let reinst = registry.register("REINST_Door_C", engine.actor, |_| {});
        let door = registry.register("Door_C", engine.actor, |_| {});

        assert!(registry.get(skel).map_or(false, |d| d.is_transient()));
        assert!(registry.get(reinst).map_or(false, |d| d.is_transient()));
        assert!(!registry.get(door).map_or(true, |d| d.is_transient()));
    }

    #[test]
    fn test_native_parent() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();

        let bp = registry.register("PlayerCharacter_BP", engine.character, |_| {});
        let bp_child = registry.register("PlayerCharacter_BP_Child", bp, |_| {});
        let loose = registry.register("Prop_BP", engine.actor, |_| {});

        assert_eq!(registry.native_parent(bp_child), engine.character);
        assert_eq!(registry.native_parent(engine.pawn), engine.pawn);
        // Data classes directly under the root stop at themselves
        assert_eq!(registry.native_parent(loose), loose);
    }

    #[test]
    fn test_should_spatialize() {
        let mut defaults = ActorDefaults {
            replicates: true,
            ..ActorDefaults::default()
        };
        assert!(defaults.should_spatialize());

        defaults.net_use_owner_relevancy = true;
        assert!(!defaults.should_spatialize());

        defaults.net_use_owner_relevancy = false;
        defaults.replicates = false;
        assert!(!defaults.should_spatialize());
    }
}
