//! Class classification: which node owns actors of each class
//!
//! Built once at startup from explicit seeds plus a single pass over every
//! registered class. The table stays sparse: a subclass only gets its own
//! entry when its relevancy flags differ from its parent's, and lookups walk
//! up the parent chain to the nearest explicit entry.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::class_registry::{ActorDefaults, ClassId, ClassRegistry};
use super::constants::class::ACTOR_CHANNEL_FRAME_TIMEOUT;
use crate::config::GraphConfig;

/// Routing policy of a class. Each class maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RoutingPolicy {
    /// Not handed to any node (special-cased elsewhere or never replicated)
    NotRouted,
    /// Relevant to every connection (global list or streaming-level list)
    RelevantAllConnections,
    /// Always considered for replication regardless of viewers
    AlwaysReplicate,

    // Spatialized variants must stay contiguous: see `is_spatialized`.
    /// Grid node; placed once, never re-bucketed
    SpatializeStatic,
    /// Grid node; re-bucketed when it changes cell
    SpatializeDynamic,
    /// Grid node; static while dormant, dynamic when awake
    SpatializeDormant,

    NearestPlayers,
    NearestPlayerStates,
}

impl RoutingPolicy {
    pub const ALL: [RoutingPolicy; 8] = [
        RoutingPolicy::NotRouted,
        RoutingPolicy::RelevantAllConnections,
        RoutingPolicy::AlwaysReplicate,
        RoutingPolicy::SpatializeStatic,
        RoutingPolicy::SpatializeDynamic,
        RoutingPolicy::SpatializeDormant,
        RoutingPolicy::NearestPlayers,
        RoutingPolicy::NearestPlayerStates,
    ];

    #[inline]
    pub fn is_spatialized(self) -> bool {
        self >= RoutingPolicy::SpatializeStatic && self <= RoutingPolicy::SpatializeDormant
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoutingPolicy::NotRouted => "NotRouted",
            RoutingPolicy::RelevantAllConnections => "RelevantAllConnections",
            RoutingPolicy::AlwaysReplicate => "AlwaysReplicate",
            RoutingPolicy::SpatializeStatic => "SpatializeStatic",
            RoutingPolicy::SpatializeDynamic => "SpatializeDynamic",
            RoutingPolicy::SpatializeDormant => "SpatializeDormant",
            RoutingPolicy::NearestPlayers => "NearestPlayers",
            RoutingPolicy::NearestPlayerStates => "NearestPlayerStates",
        }
    }
}

impl fmt::Display for RoutingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown routing policy: {0}")]
pub struct UnknownPolicy(pub String);

impl FromStr for RoutingPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoutingPolicy::ALL
            .iter()
            .copied()
            .find(|policy| policy.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}

/// Sparse class → policy map with parent-chain lookup
#[derive(Debug, Clone, Default)]
pub struct ClassPolicyTable {
    entries: FxHashMap<ClassId, RoutingPolicy>,
    /// Subclasses that stopped being spatialized while their parent is
    non_spatialized_children: Vec<ClassId>,
}

impl ClassPolicyTable {
    pub fn set(&mut self, class: ClassId, policy: RoutingPolicy) {
        self.entries.insert(class, policy);
    }

    /// Explicit entry for exactly this class
    pub fn explicit(&self, class: ClassId) -> Option<RoutingPolicy> {
        self.entries.get(&class).copied()
    }

    /// Policy of `class`, inherited from the nearest ancestor with an entry.
    /// Classes with no classified ancestor are `NotRouted`.
    pub fn classify(&self, registry: &ClassRegistry, class: ClassId) -> RoutingPolicy {
        match registry.ancestors(class).find_map(|c| self.explicit(c)) {
            Some(policy) => policy,
            None => {
                trace!("Class {} is unclassified, not routing", registry.name(class));
                RoutingPolicy::NotRouted
            }
        }
    }

    pub fn non_spatialized_children(&self) -> &[ClassId] {
        &self.non_spatialized_children
    }

    /// Explicit entries in class registration order
    pub fn entries(&self) -> Vec<(ClassId, RoutingPolicy)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(c, p)| (*c, *p)).collect();
        entries.sort_unstable_by_key(|(class, _)| *class);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Routing table, one `name --> policy` line per explicit entry
    pub fn render(&self, registry: &ClassRegistry) -> String {
        let mut out = String::with_capacity(64 * (self.entries.len() + 3));
        out.push_str("====================================\n");
        out.push_str("Replication Graph Routing Policies\n");
        out.push_str("====================================\n");
        for (class, policy) in self.entries() {
            out.push_str(&format!("{:<40} --> {}\n", registry.name(class), policy));
        }
        out
    }
}

/// Per-class replication settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassReplicationInfo {
    pub distance_priority_scale: f32,
    pub starvation_priority_scale: f32,
    pub actor_channel_frame_timeout: u32,
    /// Replicate every N frames
    pub replication_period_frame: u32,
    /// Zero means "not culled by distance" (only meaningful for spatialized classes)
    pub cull_distance_squared: f32,
}

impl Default for ClassReplicationInfo {
    fn default() -> Self {
        Self {
            distance_priority_scale: 1.0,
            starvation_priority_scale: 1.0,
            actor_channel_frame_timeout: ACTOR_CHANNEL_FRAME_TIMEOUT,
            replication_period_frame: 1,
            cull_distance_squared: 0.0,
        }
    }
}

impl ClassReplicationInfo {
    /// Derive settings from a class's legacy per-actor defaults
    pub fn from_defaults(defaults: &ActorDefaults, spatialize: bool, server_max_tick_rate: f32) -> Self {
        let mut info = Self::default();
        if spatialize {
            info.cull_distance_squared = defaults.net_cull_distance_squared;
        }
        let frequency = defaults.net_update_frequency.max(f32::EPSILON);
        info.replication_period_frame = ((server_max_tick_rate / frequency).round() as u32).max(1);
        info
    }

    pub fn cull_distance(&self) -> f32 {
        self.cull_distance_squared.max(0.0).sqrt()
    }

    /// Only the fields that differ from the defaults
    pub fn debug_string_delta(&self) -> String {
        let defaults = Self::default();
        let mut parts = Vec::new();
        if self.distance_priority_scale != defaults.distance_priority_scale {
            parts.push(format!("DistancePriorityScale: {:.2}", self.distance_priority_scale));
        }
        if self.starvation_priority_scale != defaults.starvation_priority_scale {
            parts.push(format!("StarvationPriorityScale: {:.2}", self.starvation_priority_scale));
        }
        if self.actor_channel_frame_timeout != defaults.actor_channel_frame_timeout {
            parts.push(format!("ActorChannelFrameTimeout: {}", self.actor_channel_frame_timeout));
        }
        if self.replication_period_frame != defaults.replication_period_frame {
            parts.push(format!("ReplicationPeriodFrame: {}", self.replication_period_frame));
        }
        if self.cull_distance_squared != defaults.cull_distance_squared {
            parts.push(format!("CullDistance: {:.2}", self.cull_distance()));
        }
        if parts.is_empty() {
            "Default".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Class → replication settings, inherited down the parent chain
#[derive(Debug, Clone, Default)]
pub struct ClassInfoMap {
    entries: FxHashMap<ClassId, ClassReplicationInfo>,
}

impl ClassInfoMap {
    pub fn set(&mut self, class: ClassId, info: ClassReplicationInfo) {
        self.entries.insert(class, info);
    }

    pub fn get(&self, registry: &ClassRegistry, class: ClassId) -> ClassReplicationInfo {
        registry
            .ancestors(class)
            .find_map(|c| self.entries.get(&c).copied())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<(ClassId, ClassReplicationInfo)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(c, i)| (*c, *i)).collect();
        entries.sort_unstable_by_key(|(class, _)| *class);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the startup classification pass produces
#[derive(Debug, Clone, Default)]
pub struct ClassSettings {
    pub policies: ClassPolicyTable,
    pub class_info: ClassInfoMap,
}

fn resolve(registry: &ClassRegistry, name: &str) -> Option<ClassId> {
    let class = registry.find(name);
    if class.is_none() {
        warn!("Configured class {} is not registered, ignoring", name);
    }
    class
}

fn legacy_debug_str(registry: &ClassRegistry, class: ClassId, defaults: &ActorDefaults) -> String {
    format!(
        "{} [{}/{}/{}]",
        registry.name(class),
        defaults.always_relevant as u8,
        defaults.only_relevant_to_owner as u8,
        defaults.net_use_owner_relevancy as u8
    )
}

/// Build the routing table and per-class settings
pub fn build_class_settings(registry: &ClassRegistry, config: &GraphConfig) -> ClassSettings {
    let engine = *registry.engine();
    let spatial = config.spatial_networking;
    let mut policies = ClassPolicyTable::default();

    info!(
        "Custom performance scenario is {}",
        if config.custom_performance_scenario { "enabled" } else { "disabled" }
    );

    // Explicit seeds
    policies.set(engine.player_state, RoutingPolicy::NotRouted); // frequency limited node
    policies.set(engine.debug_actor, RoutingPolicy::NotRouted);
    policies.set(engine.info, RoutingPolicy::RelevantAllConnections);
    if let Some(class) = config.replicated_base_class.as_deref().and_then(|n| resolve(registry, n)) {
        policies.set(class, RoutingPolicy::SpatializeDynamic);
    }

    if config.custom_performance_scenario {
        for class in config.nearest_player_classes.iter().filter_map(|n| resolve(registry, n)) {
            policies.set(class, RoutingPolicy::NearestPlayers);
        }
        if let Some(class) = config.nearest_player_state_class.as_deref().and_then(|n| resolve(registry, n)) {
            policies.set(class, RoutingPolicy::NearestPlayerStates);
        }
    }

    if spatial {
        policies.set(engine.game_mode_base, RoutingPolicy::AlwaysReplicate);
        for class in config.always_replicate_classes.iter().filter_map(|n| resolve(registry, n)) {
            policies.set(class, RoutingPolicy::AlwaysReplicate);
        }
    }

    for (name, policy) in &config.policy_overrides {
        if let Some(class) = resolve(registry, name) {
            policies.set(class, *policy);
        }
    }

    // Derive the rest from the legacy relevancy flags
    let mut all_replicated = Vec::with_capacity(registry.len());
    for (class, desc) in registry.iter() {
        if !desc.defaults.replicates || desc.is_transient() {
            continue;
        }
        if spatial && !desc.networked {
            continue;
        }

        all_replicated.push(class);

        if policies.explicit(class).is_some() {
            continue;
        }

        let defaults = &desc.defaults;
        if let Some(parent) = desc.parent.and_then(|p| registry.get(p)) {
            // Immediate parent only. A match means classify() reaches the
            // parent's policy through the ancestor walk, a mismatch needs an
            // entry here even if some older ancestor has the same flags.
            if parent.defaults.same_relevancy(defaults) {
                continue;
            }
            if !defaults.should_spatialize() && parent.defaults.should_spatialize() {
                info!(
                    "Adding {} to non-spatialized child classes (parent: {})",
                    legacy_debug_str(registry, class, defaults),
                    legacy_debug_str(registry, desc.parent.unwrap_or(class), &parent.defaults)
                );
                policies.non_spatialized_children.push(class);
            }
        }

        if defaults.should_spatialize() {
            policies.set(class, RoutingPolicy::SpatializeDynamic);
        } else if defaults.always_relevant && (!defaults.only_relevant_to_owner || spatial) {
            policies.set(class, RoutingPolicy::RelevantAllConnections);
        } else if spatial && defaults.replicates {
            policies.set(class, RoutingPolicy::AlwaysReplicate);
        } else {
            debug!("Not adding info for class {}", legacy_debug_str(registry, class, defaults));
        }
    }

    // Per-class replication info: explicit entries first, never recomputed
    let mut class_info = ClassInfoMap::default();
    let mut explicitly_set = Vec::new();

    let player_state_info = ClassReplicationInfo {
        distance_priority_scale: 0.0,
        actor_channel_frame_timeout: 0,
        ..ClassReplicationInfo::default()
    };
    class_info.set(engine.player_state, player_state_info);
    explicitly_set.push(engine.player_state);

    if let Some(class) = config.nearest_player_state_class.as_deref().and_then(|n| registry.find(n)) {
        if let Some(desc) = registry.get(class) {
            class_info.set(
                class,
                ClassReplicationInfo::from_defaults(&desc.defaults, true, config.server_max_tick_rate),
            );
        }
    }

    for &class in &all_replicated {
        if explicitly_set.iter().any(|&set| registry.is_child_of(class, set)) {
            continue;
        }
        let Some(desc) = registry.get(class) else { continue };
        let spatialized = policies.classify(registry, class).is_spatialized();
        let info = ClassReplicationInfo::from_defaults(&desc.defaults, spatialized, config.server_max_tick_rate);
        debug!(
            "Setting replication period for {} ({}) to {} frames ({:.2})",
            desc.name,
            registry.name(registry.native_parent(class)),
            info.replication_period_frame,
            desc.defaults.net_update_frequency
        );
        class_info.set(class, info);
    }

    log_class_settings(registry, &policies, &class_info);

    ClassSettings { policies, class_info }
}

fn log_class_settings(registry: &ClassRegistry, policies: &ClassPolicyTable, class_info: &ClassInfoMap) {
    info!("Class Routing Map:");
    for (class, policy) in policies.entries() {
        // Only print if different than the native parent
        let native = registry.native_parent(class);
        if native != class && policies.explicit(native) == Some(policy) {
            continue;
        }
        info!("  {} ({}) -> {}", registry.name(class), registry.name(native), policy);
    }

    info!("Class Settings Map:");
    for (class, settings) in class_info.entries() {
        info!(
            "  {} ({}) -> {}",
            registry.name(class),
            registry.name(registry.native_parent(class)),
            settings.debug_string_delta()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replicated(d: &mut ActorDefaults) {
        d.replicates = true;
    }

    #[test]
    fn test_spatialized_range() {
        let spatialized: Vec<_> = RoutingPolicy::ALL
            .iter()
            .copied()
            .filter(|p| p.is_spatialized())
            .collect();
        assert_eq!(
            spatialized,
            vec![
                RoutingPolicy::SpatializeStatic,
                RoutingPolicy::SpatializeDynamic,
                RoutingPolicy::SpatializeDormant
            ]
        );
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("nearestplayers".parse::<RoutingPolicy>(), Ok(RoutingPolicy::NearestPlayers));
        assert_eq!("SpatializeDormant".parse::<RoutingPolicy>(), Ok(RoutingPolicy::SpatializeDormant));
        assert!("Spatial".parse::<RoutingPolicy>().is_err());
    }

    #[test]
    fn test_engine_seed_classification() {
        let registry = ClassRegistry::new();
        let engine = *registry.engine();
        let settings = build_class_settings(&registry, &GraphConfig::default());
        let p = &settings.policies;

        assert_eq!(p.classify(&registry, engine.player_state), RoutingPolicy::NotRouted);
        assert_eq!(p.classify(&registry, engine.info), RoutingPolicy::RelevantAllConnections);
        assert_eq!(p.classify(&registry, engine.game_state_base), RoutingPolicy::RelevantAllConnections);
        assert_eq!(p.classify(&registry, engine.pawn), RoutingPolicy::SpatializeDynamic);
        assert_eq!(p.classify(&registry, engine.character), RoutingPolicy::SpatializeDynamic);
        // Owner-only controllers are not routed outside spatial networking
        assert_eq!(p.classify(&registry, engine.player_controller), RoutingPolicy::NotRouted);
        assert_eq!(p.classify(&registry, engine.actor), RoutingPolicy::NotRouted);
    }

    #[test]
    fn test_subclass_inherits_nearest_explicit_ancestor() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();
        let door = registry.register("Door", engine.actor, |d| replicated(&mut d.defaults));
        let red_door = registry.register("RedDoor", door, |_| {});
        let big_red_door = registry.register("BigRedDoor", red_door, |_| {});

        let settings = build_class_settings(&registry, &GraphConfig::default());
        let p = &settings.policies;

        assert_eq!(p.explicit(door), Some(RoutingPolicy::SpatializeDynamic));
        // Sparse: identical subclasses get no entry of their own
        assert_eq!(p.explicit(red_door), None);
        assert_eq!(p.explicit(big_red_door), None);
        assert_eq!(p.classify(&registry, big_red_door), p.classify(&registry, door));
    }

    #[test]
    fn test_class_reverting_grandparent_flags_gets_own_entry() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();
        let pickup = registry.register("Pickup", engine.actor, |d| replicated(&mut d.defaults));
        let global = registry.register("GlobalPickup", pickup, |d| d.defaults.always_relevant = true);
        let local = registry.register("LocalPickup", global, |d| d.defaults.always_relevant = false);
        let local_child = registry.register("LocalPickupChild", local, |_| {});

        let settings = build_class_settings(&registry, &GraphConfig::default());
        let p = &settings.policies;

        assert_eq!(p.classify(&registry, global), RoutingPolicy::RelevantAllConnections);
        assert_eq!(p.explicit(local), Some(RoutingPolicy::SpatializeDynamic));
        assert_eq!(p.explicit(local_child), None);
        assert_eq!(p.classify(&registry, local_child), RoutingPolicy::SpatializeDynamic);
        assert_eq!(p.non_spatialized_children(), &[global]);
    }

    #[test]
    fn test_every_class_resolves_to_ancestor_policy() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();
        let base = registry.register("Pickup", engine.actor, |d| replicated(&mut d.defaults));
        let global = registry.register("GlobalPickup", base, |d| d.defaults.always_relevant = true);
        let _child = registry.register("GlobalPickupChild", global, |_| {});

        let settings = build_class_settings(&registry, &GraphConfig::default());
        let p = &settings.policies;

        for (class, _) in registry.iter() {
            let expected = registry
                .ancestors(class)
                .find_map(|c| p.explicit(c))
                .unwrap_or(RoutingPolicy::NotRouted);
            assert_eq!(p.classify(&registry, class), expected, "{}", registry.name(class));
        }
        assert_eq!(p.classify(&registry, global), RoutingPolicy::RelevantAllConnections);
        assert_eq!(p.non_spatialized_children(), &[global]);
    }

    #[test]
    fn test_owner_relevancy_depends_on_spatial_mode() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();
        let weapon = registry.register("Weapon", engine.actor, |d| {
            d.defaults.replicates = true;
            d.defaults.net_use_owner_relevancy = true;
        });
        let hud = registry.register("OwnerHud", engine.actor, |d| {
            d.defaults.replicates = true;
            d.defaults.always_relevant = true;
            d.defaults.only_relevant_to_owner = true;
        });

        let native = build_class_settings(&registry, &GraphConfig::default());
        assert_eq!(native.policies.classify(&registry, weapon), RoutingPolicy::NotRouted);
        assert_eq!(native.policies.classify(&registry, hud), RoutingPolicy::NotRouted);

        let spatial_config = GraphConfig {
            spatial_networking: true,
            ..GraphConfig::default()
        };
        let spatial = build_class_settings(&registry, &spatial_config);
        assert_eq!(spatial.policies.classify(&registry, weapon), RoutingPolicy::AlwaysReplicate);
        assert_eq!(spatial.policies.classify(&registry, hud), RoutingPolicy::RelevantAllConnections);
        assert_eq!(
            spatial.policies.classify(&registry, engine.game_mode_base),
            RoutingPolicy::AlwaysReplicate
        );
    }

    #[test]
    fn test_transient_and_non_networked_classes_skipped() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();
        let skel = registry.register("SKEL_Cube_C", engine.actor, |d| replicated(&mut d.defaults));
        let local_only = registry.register("LocalFx", engine.actor, |d| {
            d.defaults.replicates = true;
            d.networked = false;
        });

        let native = build_class_settings(&registry, &GraphConfig::default());
        assert_eq!(native.policies.explicit(skel), None);
        assert_eq!(native.policies.classify(&registry, skel), RoutingPolicy::NotRouted);
        assert_eq!(native.policies.classify(&registry, local_only), RoutingPolicy::SpatializeDynamic);

        let spatial_config = GraphConfig {
            spatial_networking: true,
            ..GraphConfig::default()
        };
        let spatial = build_class_settings(&registry, &spatial_config);
        assert_eq!(spatial.policies.classify(&registry, local_only), RoutingPolicy::NotRouted);
    }

    #[test]
    fn test_explicit_overrides_and_performance_scenario() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();
        let npc = registry.register("NPC", engine.character, |_| {});
        let perf_ps = registry.register("PerfPlayerState", engine.player_state, |d| {
            d.defaults.always_relevant = false;
        });
        let statue = registry.register("Statue", engine.actor, |d| replicated(&mut d.defaults));

        let config = GraphConfig {
            custom_performance_scenario: true,
            nearest_player_classes: vec!["NPC".to_string(), "Missing".to_string()],
            nearest_player_state_class: Some("PerfPlayerState".to_string()),
            policy_overrides: vec![("Statue".to_string(), RoutingPolicy::SpatializeStatic)],
            ..GraphConfig::default()
        };
        let settings = build_class_settings(&registry, &config);
        let p = &settings.policies;

        assert_eq!(p.classify(&registry, npc), RoutingPolicy::NearestPlayers);
        assert_eq!(p.classify(&registry, perf_ps), RoutingPolicy::NearestPlayerStates);
        assert_eq!(p.classify(&registry, statue), RoutingPolicy::SpatializeStatic);
    }

    #[test]
    fn test_class_replication_info_derivation() {
        let mut registry = ClassRegistry::new();
        let engine = *registry.engine();
        let slow = registry.register("SlowProp", engine.actor, |d| {
            d.defaults.replicates = true;
            d.defaults.net_update_frequency = 10.0;
            d.defaults.net_cull_distance_squared = 2500.0;
        });
        let team_info = registry.register("TeamInfo", engine.info, |d| {
            d.defaults.replicates = true;
            d.defaults.net_update_frequency = 2.0;
        });
        let custom_ps = registry.register("CustomPlayerState", engine.player_state, |_| {});

        let settings = build_class_settings(&registry, &GraphConfig::default());
        let info = &settings.class_info;

        let slow_info = info.get(&registry, slow);
        assert_eq!(slow_info.replication_period_frame, 3);
        assert_eq!(slow_info.cull_distance_squared, 2500.0);

        // Not spatialized: cull distance left at default
        let team = info.get(&registry, team_info);
        assert_eq!(team.replication_period_frame, 15);
        assert_eq!(team.cull_distance_squared, 0.0);

        // Fast updates clamp to one frame
        assert_eq!(info.get(&registry, engine.pawn).replication_period_frame, 1);

        // Explicit player state info is inherited, never recomputed
        let ps = info.get(&registry, custom_ps);
        assert_eq!(ps.distance_priority_scale, 0.0);
        assert_eq!(ps.actor_channel_frame_timeout, 0);
    }

    #[test]
    fn test_debug_string_delta() {
        assert_eq!(ClassReplicationInfo::default().debug_string_delta(), "Default");
        let info = ClassReplicationInfo {
            replication_period_frame: 3,
            cull_distance_squared: 100.0,
            ..ClassReplicationInfo::default()
        };
        assert_eq!(info.debug_string_delta(), "ReplicationPeriodFrame: 3 CullDistance: 10.00");
    }

    #[test]
    fn test_render_lists_entries() {
        let registry = ClassRegistry::new();
        let settings = build_class_settings(&registry, &GraphConfig::default());
        let table = settings.policies.render(&registry);
        assert!(table.contains("PlayerState"));
        assert!(table.contains("--> RelevantAllConnections"));
    }
}
