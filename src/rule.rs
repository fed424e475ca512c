use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use futures::future::Shared;
use futures::future::LocalBoxFuture;

use crate::arrow::Build;
use crate::error::BuildError;
use crate::path::Path;

/*  A rule in progress.  `Starting` records which top-level target first
    demanded it (`for_file`), which is how wait_for_file in engine.rs
    both detects cycles and, on failure, reports the dependency chain
    that led to the failure.  `Running` holds a Shared future so repeat
    callers of the same rule get the same in-flight result rather than
    re-running the action - this is the at-most-once guarantee. */
pub enum ExecStatus<A>
{
    NotStarted(Build<A>),
    Starting
    {
        for_file: Path,
    },
    Running
    {
        for_file: Path,
        future: Shared<LocalBoxFuture<'static, Result<(), BuildError>>>,
    },
}

pub struct Rule<A>
{
    pub targets: BTreeSet<Path>,
    pub sandbox: bool,
    pub exec: ExecStatus<A>,
}

/*  Every target of a rule with N targets shares one of these, so a
    transition observed through one target's lookup is observed through
    every alias (invariant I1). */
pub type RuleHandle<A> = Rc<RefCell<Rule<A>>>;

/*  What a caller registers before any building happens. */
pub struct PreRule<A>
{
    pub build: Build<A>,
    pub targets: BTreeSet<Path>,
    pub sandbox: bool,
}

impl<A> PreRule<A>
{
    pub fn new(build: Build<A>, targets: BTreeSet<Path>, sandbox: bool) -> PreRule<A>
    {
        PreRule{ build, targets, sandbox }
    }

    pub fn compile(self) -> RuleHandle<A>
    {
        Rc::new(RefCell::new(Rule
        {
            targets: self.targets,
            sandbox: self.sandbox,
            exec: ExecStatus::NotStarted(self.build),
        }))
    }
}

#[cfg(test)]
mod test
{
    use super::*;

    #[test]
    fn pre_rule_compiles_to_not_started()
    {
        let mut targets = BTreeSet::new();
        targets.insert(Path::local("out.txt"));
        let build: Build<()> = Build::ret(());
        let pre_rule = PreRule::new(build, targets.clone(), false);
        let handle = pre_rule.compile();
        assert_eq!(handle.borrow().targets, targets);
        assert!(matches!(handle.borrow().exec, ExecStatus::NotStarted(_)));
    }
}
