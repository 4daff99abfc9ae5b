#![allow(dead_code)]

use std::collections::BTreeMap;

use testwatch::inventory::{ModuleCoord, ModuleGraph, TestIdentity, TestInventory, TestKind};

/// Builder for `TestIdentity` to simplify test setup.
///
/// Defaults: unit test, no tags, module `com.acme:app`.
pub struct TestIdentityBuilder {
    class_name: String,
    tags: Vec<String>,
    module: String,
    kind: TestKind,
}

impl TestIdentityBuilder {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            tags: Vec::new(),
            module: "com.acme:app".to_string(),
            kind: TestKind::Unit,
        }
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn module(mut self, coordinate: &str) -> Self {
        self.module = coordinate.to_string();
        self
    }

    pub fn kind(mut self, kind: TestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn framework(self) -> Self {
        self.kind(TestKind::Framework)
    }

    pub fn build(self) -> TestIdentity {
        TestIdentity {
            class_name: self.class_name,
            tags: self.tags.into_iter().collect(),
            module: self
                .module
                .parse()
                .expect("builder module coordinate must be group:artifact"),
            kind: self.kind,
        }
    }
}

/// Builder for `TestInventory`.
pub struct InventoryBuilder {
    modules: BTreeMap<String, Vec<String>>,
    application: Option<String>,
    tests: Vec<TestIdentity>,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
            application: None,
            tests: Vec::new(),
        }
    }

    /// Inventory with a single application module `com.acme:app`, matching
    /// the `TestIdentityBuilder` default.
    pub fn single_module() -> Self {
        Self::new().application_module("com.acme:app")
    }

    /// Declare the application module (no dependencies).
    pub fn application_module(mut self, coordinate: &str) -> Self {
        self.modules.insert(coordinate.to_string(), Vec::new());
        self.application = Some(coordinate.to_string());
        self
    }

    /// Declare a non-application module with dependencies.
    pub fn module(mut self, coordinate: &str, dependencies: &[&str]) -> Self {
        self.modules.insert(
            coordinate.to_string(),
            dependencies.iter().map(|dep| dep.to_string()).collect(),
        );
        self
    }

    /// Add dependencies to an already declared module (including the
    /// application module).
    pub fn depends_on(mut self, coordinate: &str, dependencies: &[&str]) -> Self {
        let deps = self.modules.entry(coordinate.to_string()).or_default();
        deps.extend(dependencies.iter().map(|dep| dep.to_string()));
        self
    }

    pub fn test(mut self, test: TestIdentity) -> Self {
        self.tests.push(test);
        self
    }

    pub fn build(self) -> TestInventory {
        let application: ModuleCoord = self
            .application
            .expect("builder needs an application module")
            .parse()
            .expect("application coordinate must be group:artifact");
        let dependencies: BTreeMap<ModuleCoord, Vec<ModuleCoord>> = self
            .modules
            .into_iter()
            .map(|(coordinate, deps)| {
                let coord: ModuleCoord = coordinate
                    .parse()
                    .expect("module coordinate must be group:artifact");
                let deps = deps
                    .into_iter()
                    .map(|dep| dep.parse().expect("dependency coordinate must be group:artifact"))
                    .collect();
                (coord, deps)
            })
            .collect();
        let graph = ModuleGraph::new(application, dependencies)
            .expect("builder module graph must be valid");
        TestInventory::new(self.tests, graph)
    }
}

impl Default for InventoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
