//! Plugin discovery.
//!
//! Plugins are collected at link time: [`register_plugin!`](crate::register_plugin)
//! adds a [`PluginDescriptor`] to the [`PLUGINS`] distributed slice, recording
//! the module the plugin is declared in. Loading a module path registers every
//! plugin declared in that module or any module beneath it.
//!
//! Relative paths are resolved against the *home* module of the composing
//! root, which passes its own `module_path!()`:
//!
//! | home         | specifier    | resolves to              |
//! |--------------|--------------|--------------------------|
//! | `bot`        | `.commands`  | `bot::commands`          |
//! | `bot::core`  | `..admin`    | `bot::admin`             |
//! | `bot`        | `self::fun`  | `bot::fun`               |
//! | any          | `games::dice`| `games::dice`            |

use linkme::distributed_slice;
use tracing::{debug, info};

use crate::client::Client;
use crate::error::{ClientError, ClientResult, ModuleLocateError};

/// Module specifiers loaded by [`Client::load_default_plugins`].
pub const DEFAULT_MODULES: [&str; 4] = [".command", ".commands", ".plugins", ".plugin"];

/// A plugin collected by [`register_plugin!`](crate::register_plugin).
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Type name as written at the registration site.
    pub name: &'static str,
    /// `module_path!()` of the registration site.
    pub module_path: &'static str,
    /// Registers the plugin with a client.
    pub register: fn(&mut Client) -> ClientResult<()>,
}

/// Every plugin registered with [`register_plugin!`](crate::register_plugin)
/// in the final binary.
#[distributed_slice]
pub static PLUGINS: [PluginDescriptor];

/// Resolves module specifiers and registers the plugins declared beneath them.
#[derive(Debug, Clone)]
pub struct Discovery {
    home: String,
    catalog: &'static [PluginDescriptor],
}

impl Discovery {
    /// Discovery over [`PLUGINS`], with the home module derived from `caller`.
    pub fn new(caller: &str) -> Result<Self, ModuleLocateError> {
        Self::with_catalog(caller, &PLUGINS)
    }

    /// Discovery over an explicit catalog.
    pub fn with_catalog(
        caller: &str,
        catalog: &'static [PluginDescriptor],
    ) -> Result<Self, ModuleLocateError> {
        let home = locate_home(caller, catalog)?;
        Ok(Self { home, catalog })
    }

    /// The home module relative specifiers are resolved against.
    pub fn home(&self) -> &str {
        &self.home
    }

    /// Resolves `spec` to an absolute module path.
    pub fn resolve(&self, spec: &str) -> Result<String, ModuleLocateError> {
        let spec = spec.trim();
        let malformed = |reason| ModuleLocateError {
            path: spec.to_string(),
            reason,
        };

        let (base, rest) = if let Some(stripped) = spec.strip_prefix('.') {
            let rest = stripped.trim_start_matches('.');
            let base = ancestor(&self.home, stripped.len() - rest.len())
                .ok_or_else(|| malformed("escapes the crate root"))?;
            (base, rest)
        } else if let Some(rest) = keyword(spec, "self") {
            (self.home.clone(), rest)
        } else if let Some(mut rest) = keyword(spec, "super") {
            let mut levels = 1;
            while let Some(tail) = keyword(rest, "super") {
                levels += 1;
                rest = tail;
            }
            let base =
                ancestor(&self.home, levels).ok_or_else(|| malformed("escapes the crate root"))?;
            (base, rest)
        } else if let Some(rest) = keyword(spec, "crate") {
            let root = self.home.split("::").next().unwrap_or_default();
            (root.to_string(), rest)
        } else {
            (String::new(), spec.strip_prefix("::").unwrap_or(spec))
        };

        let rest = rest.replace('.', "::");
        let path = match (base.is_empty(), rest.is_empty()) {
            (true, _) => rest,
            (false, true) => base,
            (false, false) => format!("{base}::{rest}"),
        };

        if !is_well_formed(&path) {
            return Err(malformed("not a valid module path"));
        }
        Ok(path)
    }

    /// Descriptors declared in `module` or beneath it, in
    /// `(module_path, name)` order.
    pub fn matching(&self, module: &str) -> Vec<&'static PluginDescriptor> {
        let mut found: Vec<_> = self
            .catalog
            .iter()
            .filter(|descriptor| is_within(descriptor.module_path, module))
            .collect();
        found.sort_by_key(|descriptor| (descriptor.module_path, descriptor.name));
        found
    }

    /// Registers the plugins beneath each of `specs` with `client`.
    ///
    /// A specifier with no plugins is treated as an absent module. Plugins
    /// already registered are skipped. Returns the number of plugins
    /// registered.
    pub fn load<S: AsRef<str>>(&self, client: &mut Client, specs: &[S]) -> ClientResult<usize> {
        let mut registered = 0;
        for spec in specs {
            let module = self.resolve(spec.as_ref())?;
            let descriptors = self.matching(&module);
            if descriptors.is_empty() {
                debug!(module = %module, "No plugins found, skipping module");
                continue;
            }

            for descriptor in descriptors {
                match (descriptor.register)(client) {
                    Ok(()) => registered += 1,
                    Err(ClientError::DuplicatePlugin(name)) => {
                        debug!(
                            plugin = name,
                            module = descriptor.module_path,
                            "Plugin already registered, skipping"
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if registered > 0 {
            info!(count = registered, home = %self.home, "Plugins loaded");
        }
        Ok(registered)
    }
}

/// Strips a leading path keyword, returning what follows it.
fn keyword<'a>(spec: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = spec.strip_prefix(keyword)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix("::")
    }
}

fn is_well_formed(path: &str) -> bool {
    !path.is_empty()
        && path.split("::").all(|segment| {
            !segment.is_empty()
                && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
        })
}

fn is_within(path: &str, module: &str) -> bool {
    path == module
        || path
            .strip_prefix(module)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// `path` with `levels` trailing segments removed.
fn ancestor(path: &str, levels: usize) -> Option<String> {
    let segments: Vec<&str> = path.split("::").collect();
    if levels >= segments.len() {
        return None;
    }
    Some(segments[..segments.len() - levels].join("::"))
}

/// The home module of `caller`: itself when it is a crate root or has plugins
/// declared beneath it, its parent otherwise.
fn locate_home(caller: &str, catalog: &[PluginDescriptor]) -> Result<String, ModuleLocateError> {
    if !is_well_formed(caller) {
        return Err(ModuleLocateError {
            path: caller.to_string(),
            reason: "not a valid module path",
        });
    }

    let is_package = catalog.iter().any(|descriptor| {
        descriptor
            .module_path
            .strip_prefix(caller)
            .is_some_and(|rest| rest.starts_with("::"))
    });

    match caller.rsplit_once("::") {
        Some((parent, _)) if !is_package => Ok(parent.to_string()),
        _ => Ok(caller.to_string()),
    }
}

/// Registers a plugin type for discovery.
///
/// ```rust,ignore
/// pub struct Dice;
///
/// #[plugin]
/// impl Dice { /* ... */ }
///
/// register_plugin!(Dice);
/// ```
#[macro_export]
macro_rules! register_plugin {
    ($plugin:ty) => {
        const _: () = {
            #[$crate::__private::linkme::distributed_slice($crate::discovery::PLUGINS)]
            #[linkme(crate = $crate::__private::linkme)]
            static PLUGIN: $crate::discovery::PluginDescriptor =
                $crate::discovery::PluginDescriptor {
                    name: ::core::stringify!($plugin),
                    module_path: ::core::module_path!(),
                    register: $crate::plugin::register_descriptor::<$plugin>,
                };
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Client) -> ClientResult<()> {
        Ok(())
    }

    const fn descriptor(name: &'static str, module_path: &'static str) -> PluginDescriptor {
        PluginDescriptor {
            name,
            module_path,
            register: noop,
        }
    }

    static CATALOG: [PluginDescriptor; 5] = [
        descriptor("Roll", "bot::commands::dice"),
        descriptor("Flip", "bot::commands"),
        descriptor("Audit", "bot::plugins::audit"),
        descriptor("Quote", "bot::commandsx"),
        descriptor("Weather", "weather::plugin"),
    ];

    #[test]
    fn test_home_of_leaf_module_is_parent() {
        let discovery = Discovery::with_catalog("bot::main_app", &CATALOG).unwrap();
        assert_eq!(discovery.home(), "bot");
    }

    #[test]
    fn test_home_of_package_is_itself() {
        assert_eq!(Discovery::with_catalog("bot", &CATALOG).unwrap().home(), "bot");
        assert_eq!(
            Discovery::with_catalog("bot::plugins", &CATALOG).unwrap().home(),
            "bot::plugins"
        );
    }

    #[test]
    fn test_malformed_caller() {
        assert!(Discovery::with_catalog("", &CATALOG).is_err());
        assert!(Discovery::with_catalog("bot::::x", &CATALOG).is_err());
    }

    #[test]
    fn test_resolve_specifiers() {
        let discovery = Discovery::with_catalog("bot::plugins", &CATALOG).unwrap();
        assert_eq!(discovery.resolve(".audit").unwrap(), "bot::plugins::audit");
        assert_eq!(discovery.resolve("..commands.dice").unwrap(), "bot::commands::dice");
        assert_eq!(discovery.resolve(".").unwrap(), "bot::plugins");
        assert_eq!(discovery.resolve("self::audit").unwrap(), "bot::plugins::audit");
        assert_eq!(discovery.resolve("super::commands").unwrap(), "bot::commands");
        assert_eq!(discovery.resolve("crate::commands").unwrap(), "bot::commands");
        assert_eq!(discovery.resolve("::weather::plugin").unwrap(), "weather::plugin");
        assert_eq!(discovery.resolve("weather.plugin").unwrap(), "weather::plugin");
        assert!(discovery.resolve("...too_far").is_err());
        assert!(discovery.resolve("bad path").is_err());
    }

    #[test]
    fn test_matching_covers_submodules_only() {
        let discovery = Discovery::with_catalog("bot", &CATALOG).unwrap();
        let names: Vec<_> = discovery
            .matching("bot::commands")
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect();
        assert_eq!(names, vec!["Flip", "Roll"]);
        assert!(discovery.matching("bot::command").is_empty());
    }
}
