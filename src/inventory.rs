// src/inventory.rs

//! Test inventory published by the discovery side of the build tool.
//!
//! The inventory is a TOML document listing the project's modules and the
//! test classes found in them:
//!
//! ```toml
//! [[module]]
//! coordinate = "com.acme:app"
//! dependencies = ["com.acme:core"]
//! application = true
//!
//! [[module]]
//! coordinate = "com.acme:core"
//!
//! [[test]]
//! class = "com.acme.app.CheckoutTest"
//! module = "com.acme:app"
//! tags = ["fast"]
//! kind = "unit"
//! ```
//!
//! Loading validates the module graph eagerly: duplicate coordinates,
//! dangling module dependencies, missing or ambiguous application markers
//! and dependency cycles are all hard errors. Tests referencing undeclared
//! modules are *not* errors here; the planner skips them with a warning so
//! a half-published inventory never takes the engine down.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{Result, TestwatchError};

/// Module coordinate in `group:artifact` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleCoord {
    pub group: String,
    pub artifact: String,
}

impl ModuleCoord {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        ModuleCoord {
            group: group.into(),
            artifact: artifact.into(),
        }
    }
}

impl fmt::Display for ModuleCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for ModuleCoord {
    type Err = TestwatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((group, artifact)) if !group.trim().is_empty() && !artifact.trim().is_empty() => {
                Ok(ModuleCoord::new(group.trim(), artifact.trim()))
            }
            _ => Err(TestwatchError::DiscoveryInconsistency(format!(
                "malformed module coordinate '{s}' (expected group:artifact)"
            ))),
        }
    }
}

/// Classification of a test class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Runs without the application framework.
    Unit,
    /// Needs the application (or a launched artifact) up.
    Framework,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestKind::Unit => write!(f, "unit"),
            TestKind::Framework => write!(f, "framework"),
        }
    }
}

/// A single discovered test class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentity {
    pub class_name: String,
    pub tags: BTreeSet<String>,
    pub module: ModuleCoord,
    pub kind: TestKind,
}

/// Declared project modules plus which of them is the application.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    application: Option<ModuleCoord>,
    declared: BTreeSet<ModuleCoord>,
    /// Application module plus its transitive dependencies.
    application_closure: BTreeSet<ModuleCoord>,
}

impl ModuleGraph {
    /// Build a validated graph. `dependencies` maps each declared module to
    /// the modules it depends on.
    pub fn new(
        application: ModuleCoord,
        dependencies: BTreeMap<ModuleCoord, Vec<ModuleCoord>>,
    ) -> Result<Self> {
        for (module, deps) in &dependencies {
            for dep in deps {
                if !dependencies.contains_key(dep) {
                    return Err(TestwatchError::DiscoveryInconsistency(format!(
                        "module '{module}' depends on undeclared module '{dep}'"
                    )));
                }
            }
        }
        if !dependencies.contains_key(&application) {
            return Err(TestwatchError::DiscoveryInconsistency(format!(
                "application module '{application}' is not declared"
            )));
        }

        validate_acyclic(&dependencies)?;

        let application_closure = transitive_closure(&application, &dependencies);
        Ok(ModuleGraph {
            declared: dependencies.keys().cloned().collect(),
            application: Some(application),
            application_closure,
        })
    }

    pub fn contains(&self, module: &ModuleCoord) -> bool {
        self.declared.contains(module)
    }

    pub fn application(&self) -> Option<&ModuleCoord> {
        self.application.as_ref()
    }

    /// Whether tests from `module` participate in runs.
    ///
    /// With `only_application_module` set, only the application module
    /// itself is in scope; otherwise the application plus everything it
    /// transitively depends on.
    pub fn in_scope(&self, only_application_module: bool, module: &ModuleCoord) -> bool {
        if only_application_module {
            self.application.as_ref() == Some(module)
        } else {
            self.application_closure.contains(module)
        }
    }
}

fn validate_acyclic(dependencies: &BTreeMap<ModuleCoord, Vec<ModuleCoord>>) -> Result<()> {
    // Edge direction: dependency -> dependent, same as a build order.
    let names: BTreeMap<&ModuleCoord, String> = dependencies
        .keys()
        .map(|coord| (coord, coord.to_string()))
        .collect();

    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in names.values() {
        graph.add_node(name.as_str());
    }
    for (module, deps) in dependencies {
        for dep in deps {
            graph.add_edge(names[dep].as_str(), names[module].as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TestwatchError::ModuleCycle(format!(
            "cycle involving module '{}'",
            cycle.node_id()
        ))),
    }
}

fn transitive_closure(
    start: &ModuleCoord,
    dependencies: &BTreeMap<ModuleCoord, Vec<ModuleCoord>>,
) -> BTreeSet<ModuleCoord> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start.clone()];
    while let Some(module) = stack.pop() {
        if !seen.insert(module.clone()) {
            continue;
        }
        if let Some(deps) = dependencies.get(&module) {
            stack.extend(deps.iter().cloned());
        }
    }
    seen
}

/// Parsed and validated inventory.
#[derive(Debug, Clone, Default)]
pub struct TestInventory {
    tests: Vec<TestIdentity>,
    modules: ModuleGraph,
}

impl TestInventory {
    pub fn new(mut tests: Vec<TestIdentity>, modules: ModuleGraph) -> Self {
        // Deterministic run order regardless of inventory file order.
        tests.sort_by(|a, b| a.class_name.cmp(&b.class_name));
        TestInventory { tests, modules }
    }

    pub fn tests(&self) -> &[TestIdentity] {
        &self.tests
    }

    pub fn modules(&self) -> &ModuleGraph {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawInventoryFile {
    #[serde(default)]
    module: Vec<RawModule>,
    #[serde(default)]
    test: Vec<RawTest>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawModule {
    coordinate: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    application: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTest {
    class: String,
    module: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_test_kind")]
    kind: TestKind,
}

fn default_test_kind() -> TestKind {
    TestKind::Unit
}

/// Read and parse the inventory file at `path`.
pub fn load_inventory(path: impl AsRef<Path>) -> Result<TestInventory> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let inventory = parse_inventory(&contents)?;
    debug!(
        path = %path.display(),
        tests = inventory.len(),
        "loaded test inventory"
    );
    Ok(inventory)
}

/// Parse an inventory document.
pub fn parse_inventory(contents: &str) -> Result<TestInventory> {
    let raw: RawInventoryFile = toml::from_str(contents)?;

    if raw.module.is_empty() {
        if !raw.test.is_empty() {
            return Err(TestwatchError::DiscoveryInconsistency(
                "inventory declares tests but no modules".to_string(),
            ));
        }
        return Ok(TestInventory::default());
    }

    let mut dependencies: BTreeMap<ModuleCoord, Vec<ModuleCoord>> = BTreeMap::new();
    let mut application: Option<ModuleCoord> = None;
    for module in &raw.module {
        let coord: ModuleCoord = module.coordinate.parse()?;
        let deps = module
            .dependencies
            .iter()
            .map(|dep| dep.parse())
            .collect::<Result<Vec<ModuleCoord>>>()?;
        if dependencies.insert(coord.clone(), deps).is_some() {
            return Err(TestwatchError::DiscoveryInconsistency(format!(
                "module '{coord}' is declared twice"
            )));
        }
        if module.application {
            if let Some(previous) = &application {
                return Err(TestwatchError::DiscoveryInconsistency(format!(
                    "both '{previous}' and '{coord}' are marked as the application module"
                )));
            }
            application = Some(coord);
        }
    }

    let application = application.ok_or_else(|| {
        TestwatchError::DiscoveryInconsistency(
            "no module is marked as the application module".to_string(),
        )
    })?;
    let modules = ModuleGraph::new(application, dependencies)?;

    let tests = raw
        .test
        .iter()
        .map(|test| {
            Ok(TestIdentity {
                class_name: test.class.clone(),
                tags: test.tags.iter().map(|tag| tag.trim().to_string()).collect(),
                module: test.module.parse()?,
                kind: test.kind,
            })
        })
        .collect::<Result<Vec<TestIdentity>>>()?;

    Ok(TestInventory::new(tests, modules))
}
