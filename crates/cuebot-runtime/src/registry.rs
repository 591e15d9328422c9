//! [`ActionRegistry`] – catalog of every action the runner can construct.
//!
//! Populated once at start-up by explicit registration (see
//! [`ActionRegistry::builtin`]), then shared read-only behind an `Arc`.

use std::collections::BTreeMap;

use cuebot_types::CueError;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::action::Action;

/// Builds a fresh action instance.
pub type ActionFactory = fn() -> Box<dyn Action>;

/// One registered action type.
#[derive(Clone)]
pub struct ActionEntry {
    pub name: String,
    pub tags: Vec<String>,
    factory: ActionFactory,
}

impl ActionEntry {
    pub fn construct(&self) -> Box<dyn Action> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEntry")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Default, Debug)]
pub struct ActionRegistry {
    entries: BTreeMap<String, ActionEntry>,
    tagged: BTreeMap<String, Vec<String>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, factory, tags) in crate::actions::BUILTIN {
            debug_assert_eq!(
                factory().name(),
                *name,
                "catalog entry constructs a differently named action"
            );
            registry.register(*name, *factory, tags);
        }
        registry
    }

    /// Register `factory` under `name` with `tags`.
    ///
    /// A duplicate name is logged and replaces the earlier entry, tags
    /// included.
    pub fn register(&mut self, name: impl Into<String>, factory: ActionFactory, tags: &[&str]) {
        let name = name.into();
        if let Some(old) = self.entries.remove(&name) {
            warn!(action = %name, "duplicate action registration; replacing earlier entry");
            for tag in &old.tags {
                if let Some(names) = self.tagged.get_mut(tag) {
                    names.retain(|n| *n != name);
                }
            }
            self.tagged.retain(|_, names| !names.is_empty());
        }

        let mut unique: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !unique.iter().any(|t| t == tag) {
                unique.push(tag.to_string());
            }
        }
        let tags = unique;
        for tag in &tags {
            self.tagged.entry(tag.clone()).or_default().push(name.clone());
        }
        debug!(action = %name, ?tags, "action registered");
        self.entries.insert(
            name.clone(),
            ActionEntry {
                name,
                tags,
                factory,
            },
        );
    }

    /// Look up the entry registered as `name`.
    pub fn get(&self, name: &str) -> Result<&ActionEntry, CueError> {
        self.entries
            .get(name)
            .ok_or_else(|| CueError::ActionNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Uniformly random entry among those tagged `tag`.
    pub fn random_with_tag(&self, tag: &str) -> Result<&ActionEntry, CueError> {
        let name = self
            .tagged
            .get(tag)
            .and_then(|names| names.choose(&mut rand::thread_rng()))
            .ok_or_else(|| CueError::EmptyTag(tag.to_string()))?;
        self.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Tags of `name`, or `None` if it is not registered.
    pub fn tags_of(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|e| e.tags.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionContext, Transition};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Action for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&mut self, _ctx: &ActionContext) -> Result<Transition, CueError> {
            Ok(Transition::none())
        }
    }

    fn alpha() -> Box<dyn Action> {
        Box::new(Named("Alpha"))
    }

    fn beta() -> Box<dyn Action> {
        Box::new(Named("Beta"))
    }

    fn beta_v2() -> Box<dyn Action> {
        Box::new(Named("BetaV2"))
    }

    #[test]
    fn get_constructs_registered_action() {
        let mut registry = ActionRegistry::new();
        registry.register("Alpha", alpha, &[]);
        let action = registry.get("Alpha").unwrap().construct();
        assert_eq!(action.name(), "Alpha");
    }

    #[test]
    fn get_unknown_is_not_found() {
        let registry = ActionRegistry::new();
        assert_eq!(
            registry.get("Nope").unwrap_err(),
            CueError::ActionNotFound("Nope".into())
        );
    }

    #[test]
    fn random_with_tag_only_picks_tagged_entries() {
        let mut registry = ActionRegistry::new();
        registry.register("Alpha", alpha, &["random"]);
        registry.register("Beta", beta, &["random", "loud"]);
        registry.register("Gamma", alpha, &[]);

        for _ in 0..50 {
            let entry = registry.random_with_tag("random").unwrap();
            assert!(entry.name == "Alpha" || entry.name == "Beta");
        }
        assert_eq!(registry.random_with_tag("loud").unwrap().name, "Beta");
    }

    #[test]
    fn random_with_unknown_tag_is_empty_tag() {
        let mut registry = ActionRegistry::new();
        registry.register("Alpha", alpha, &[]);
        assert_eq!(
            registry.random_with_tag("random").unwrap_err(),
            CueError::EmptyTag("random".into())
        );
    }

    #[test]
    fn repeated_tag_counts_once() {
        let mut registry = ActionRegistry::new();
        registry.register("Alpha", alpha, &["random", "random"]);
        registry.register("Beta", beta, &["random"]);

        assert_eq!(registry.tags_of("Alpha"), Some(&["random".to_string()][..]));
        assert_eq!(registry.tagged["random"], vec!["Alpha", "Beta"]);
    }

    #[test]
    fn duplicate_registration_last_writer_wins() {
        let mut registry = ActionRegistry::new();
        registry.register("Beta", beta, &["random"]);
        registry.register("Beta", beta_v2, &["calm"]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Beta").unwrap().construct().name(), "BetaV2");
        assert_eq!(registry.tags_of("Beta"), Some(&["calm".to_string()][..]));
        assert!(registry.random_with_tag("random").is_err());
        assert_eq!(registry.random_with_tag("calm").unwrap().name, "Beta");
    }

    #[test]
    fn builtin_catalog_is_complete() {
        let registry = ActionRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec![
                "BasicTest",
                "DanceParty",
                "FlashStuff",
                "Greeting",
                "KnobEcho",
                "LoadingShow",
                "MainLoop",
                "PlayTwoSounds",
            ]
        );
        for name in registry.names() {
            assert_eq!(registry.get(name).unwrap().construct().name(), name);
        }
        let mut random: Vec<_> = (0..200)
            .map(|_| registry.random_with_tag("random").unwrap().name.clone())
            .collect();
        random.sort();
        random.dedup();
        assert_eq!(random, vec!["DanceParty", "FlashStuff", "Greeting"]);
    }
}
