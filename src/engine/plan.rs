// src/engine/plan.rs

//! Run planning: turn the current inventory into an ordered run set.
//!
//! The planner applies, in order:
//! 1. test-kind selection (`type = "unit" | "framework" | "all"`),
//! 2. module scoping (application module, or its transitive dependency
//!    closure),
//! 3. the user's [`TestFilter`].
//!
//! Tests referencing modules the graph does not declare are skipped with a
//! warning and recorded on the plan, so the summary can show them instead
//! of silently dropping them.
//!
//! A plan always lists unit phases before framework phases.

use tracing::{debug, warn};

use crate::events::SkippedTest;
use crate::filter::TestFilter;
use crate::inventory::{TestIdentity, TestInventory, TestKind};
use crate::types::TestType;

use super::TriggerSource;

/// One homogeneous stretch of a run.
#[derive(Debug, Clone)]
pub struct RunPhase {
    pub kind: TestKind,
    pub tests: Vec<TestIdentity>,
}

/// Everything the executor needs for one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run_id: u64,
    pub trigger: TriggerSource,
    pub phases: Vec<RunPhase>,
    /// Candidate tests dropped at planning time (e.g. undeclared modules).
    pub skipped: Vec<SkippedTest>,
}

impl RunPlan {
    pub fn selected(&self) -> usize {
        self.phases.iter().map(|phase| phase.tests.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.selected() == 0
    }
}

/// Builds [`RunPlan`]s from the live inventory.
#[derive(Debug)]
pub struct RunPlanner {
    filter: TestFilter,
    test_type: TestType,
    only_application_module: bool,
    inventory: TestInventory,
}

impl RunPlanner {
    pub fn new(
        filter: TestFilter,
        test_type: TestType,
        only_application_module: bool,
        inventory: TestInventory,
    ) -> Self {
        RunPlanner {
            filter,
            test_type,
            only_application_module,
            inventory,
        }
    }

    pub fn inventory(&self) -> &TestInventory {
        &self.inventory
    }

    /// Swap in a freshly published inventory; takes effect from the next
    /// plan, never an in-flight run.
    pub fn set_inventory(&mut self, inventory: TestInventory) {
        self.inventory = inventory;
    }

    pub fn build_plan(&self, run_id: u64, trigger: TriggerSource) -> RunPlan {
        let mut unit = Vec::new();
        let mut framework = Vec::new();
        let mut skipped = Vec::new();
        let modules = self.inventory.modules();

        for test in self.inventory.tests() {
            if !self.kind_selected(test.kind) {
                continue;
            }
            if !modules.contains(&test.module) {
                warn!(
                    class = %test.class_name,
                    module = %test.module,
                    "test references an undeclared module; skipping"
                );
                skipped.push(SkippedTest {
                    class_name: test.class_name.clone(),
                    reason: format!("undeclared module '{}'", test.module),
                });
                continue;
            }
            if !modules.in_scope(self.only_application_module, &test.module) {
                debug!(
                    class = %test.class_name,
                    module = %test.module,
                    "module out of scope for this run"
                );
                continue;
            }
            if !self.filter.should_run(test) {
                continue;
            }
            match test.kind {
                TestKind::Unit => unit.push(test.clone()),
                TestKind::Framework => framework.push(test.clone()),
            }
        }

        debug!(
            run_id,
            unit = unit.len(),
            framework = framework.len(),
            skipped = skipped.len(),
            "run set selected"
        );

        let mut phases = Vec::new();
        if !unit.is_empty() {
            phases.push(RunPhase {
                kind: TestKind::Unit,
                tests: unit,
            });
        }
        if !framework.is_empty() {
            phases.push(RunPhase {
                kind: TestKind::Framework,
                tests: framework,
            });
        }

        RunPlan {
            run_id,
            trigger,
            phases,
            skipped,
        }
    }

    fn kind_selected(&self, kind: TestKind) -> bool {
        match self.test_type {
            TestType::All => true,
            TestType::Unit => kind == TestKind::Unit,
            TestType::Framework => kind == TestKind::Framework,
        }
    }
}
