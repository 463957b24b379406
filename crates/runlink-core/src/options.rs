//! Run options: a list of tagged values folded into one resolved set before
//! a run is created. Later options overwrite earlier ones for the same field.

use std::sync::Arc;

use crate::models::KeyValueMap;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub enum RunOption {
    Settings(Arc<Settings>),
    Config(Arc<KeyValueMap>),
    RunName(String),
    RunId(String),
    Project(String),
}

pub fn with_settings(settings: impl Into<Arc<Settings>>) -> RunOption {
    RunOption::Settings(settings.into())
}

pub fn with_config(config: impl Into<Arc<KeyValueMap>>) -> RunOption {
    RunOption::Config(config.into())
}

pub fn with_run_name(name: impl Into<String>) -> RunOption {
    RunOption::RunName(name.into())
}

pub fn with_run_id(run_id: impl Into<String>) -> RunOption {
    RunOption::RunId(run_id.into())
}

pub fn with_project(project: impl Into<String>) -> RunOption {
    RunOption::Project(project.into())
}

/// Options after [`merge`]. Untouched fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOptions {
    pub settings: Option<Arc<Settings>>,
    pub config: Option<Arc<KeyValueMap>>,
    pub name: Option<String>,
    pub run_id: Option<String>,
    pub project: Option<String>,
}

impl ResolvedOptions {
    pub fn apply(mut self, option: RunOption) -> Self {
        match option {
            RunOption::Settings(s) => self.settings = Some(s),
            RunOption::Config(c) => self.config = Some(c),
            RunOption::RunName(n) => self.name = Some(n),
            RunOption::RunId(id) => self.run_id = Some(id),
            RunOption::Project(p) => self.project = Some(p),
        }
        self
    }
}

/// Fold `options` in order; the last option for a field wins.
pub fn merge<I>(options: I) -> ResolvedOptions
where
    I: IntoIterator<Item = RunOption>,
{
    options
        .into_iter()
        .fold(ResolvedOptions::default(), ResolvedOptions::apply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use crate::settings::SettingsOptions;
    use proptest::prelude::*;

    #[test]
    fn test_last_write_wins() {
        let resolved = merge([with_run_name("a"), with_run_name("b")]);
        assert_eq!(resolved.name.as_deref(), Some("b"));
        assert_eq!(resolved.project, None);
    }

    #[test]
    fn test_untouched_fields_stay_unset() {
        assert_eq!(merge(Vec::new()), ResolvedOptions::default());
        let resolved = merge([with_project("proj")]);
        assert_eq!(resolved.project.as_deref(), Some("proj"));
        assert!(resolved.settings.is_none());
        assert!(resolved.config.is_none());
        assert!(resolved.name.is_none());
        assert!(resolved.run_id.is_none());
    }

    #[test]
    fn test_merge_is_deterministic() {
        let config = Arc::new(KeyValueMap::from_pairs([("lr", Value::Double(0.1))]).unwrap());
        let options = vec![
            with_config(config.clone()),
            with_run_id("abc"),
            with_project("p1"),
            with_project("p2"),
            with_settings(Settings::new()),
        ];
        let first = merge(options.clone());
        let second = merge(options);
        assert_eq!(first, second);
        assert_eq!(first.project.as_deref(), Some("p2"));
        assert!(Arc::ptr_eq(first.config.as_ref().unwrap(), &config));
    }

    fn option() -> impl Strategy<Value = RunOption> {
        prop_oneof![
            "[a-z]{0,6}".prop_map(|s| with_run_name(s)),
            "[a-z0-9]{0,6}".prop_map(|s| with_run_id(s)),
            "[a-z]{0,6}".prop_map(|s| with_project(s)),
            any::<bool>().prop_map(|offline| {
                with_settings(Settings::from_options(SettingsOptions {
                    offline,
                    api_key: None,
                }))
            }),
            any::<i64>().prop_map(|seed| {
                with_config(KeyValueMap::from_pairs([("seed", seed)]).unwrap())
            }),
        ]
    }

    fn last<T>(options: &[RunOption], pick: impl Fn(&RunOption) -> Option<T>) -> Option<T> {
        options.iter().rev().find_map(pick)
    }

    proptest! {
        #[test]
        fn test_merge_keeps_last_value_per_field(
            options in prop::collection::vec(option(), 0..16),
        ) {
            let resolved = merge(options.clone());
            prop_assert_eq!(&resolved, &merge(options.clone()));

            let name = last(&options, |o| match o {
                RunOption::RunName(n) => Some(n.clone()),
                _ => None,
            });
            let run_id = last(&options, |o| match o {
                RunOption::RunId(id) => Some(id.clone()),
                _ => None,
            });
            let project = last(&options, |o| match o {
                RunOption::Project(p) => Some(p.clone()),
                _ => None,
            });
            let settings = last(&options, |o| match o {
                RunOption::Settings(s) => Some(Arc::as_ptr(s)),
                _ => None,
            });
            let config = last(&options, |o| match o {
                RunOption::Config(c) => Some(Arc::as_ptr(c)),
                _ => None,
            });
            prop_assert_eq!(resolved.name, name);
            prop_assert_eq!(resolved.run_id, run_id);
            prop_assert_eq!(resolved.project, project);
            prop_assert_eq!(resolved.settings.as_ref().map(Arc::as_ptr), settings);
            prop_assert_eq!(resolved.config.as_ref().map(Arc::as_ptr), config);
        }

        #[test]
        fn test_merge_of_concatenation_continues_the_fold(
            head in prop::collection::vec(option(), 0..8),
            tail in prop::collection::vec(option(), 0..8),
        ) {
            let whole = merge(head.iter().chain(&tail).cloned());
            let resumed = tail.into_iter().fold(merge(head), ResolvedOptions::apply);
            prop_assert_eq!(whole, resumed);
        }
    }
}
