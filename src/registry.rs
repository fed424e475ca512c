use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::error::BuildError;
use crate::path::Path;
use crate::rule::{PreRule, RuleHandle};

/*  Maps each target path to the rule that produces it.  Registering a
    pre-rule inserts the same RuleHandle under every one of its targets
    (invariant I1); overriding rules replace only the overlapping
    targets, leaving the original rule's other targets under its
    original handle (see DESIGN.md, Open Question 1). */
pub struct RuleRegistry<A>
{
    files: RefCell<BTreeMap<Path, RuleHandle<A>>>,
}

impl<A> RuleRegistry<A>
{
    pub fn new() -> RuleRegistry<A>
    {
        RuleRegistry{ files: RefCell::new(BTreeMap::new()) }
    }

    pub fn add_rule(&self, pre_rule: PreRule<A>, allow_override: bool) -> Result<(), BuildError>
    {
        if !allow_override
        {
            for target in &pre_rule.targets
            {
                if self.files.borrow().contains_key(target)
                {
                    return Err(BuildError::MultipleRulesForTarget(target.clone()));
                }
            }
        }

        let handle = pre_rule.compile();
        let targets = handle.borrow().targets.clone();
        let mut files = self.files.borrow_mut();
        for target in targets
        {
            files.insert(target, handle.clone());
        }
        Ok(())
    }

    pub fn is_target(&self, path: &Path) -> bool
    {
        self.files.borrow().contains_key(path)
    }

    pub fn find(&self, path: &Path) -> Option<RuleHandle<A>>
    {
        self.files.borrow().get(path).cloned()
    }

    pub fn all_targets(&self) -> Vec<Path>
    {
        self.files.borrow().keys().cloned().collect()
    }

    pub fn targets_in_dir(&self, dir: &Path) -> Vec<Path>
    {
        self.files.borrow().keys()
            .filter(|path| path.parent().as_ref() == Some(dir))
            .cloned()
            .collect()
    }

    /*  The rule's arrow, if it hasn't started executing yet.  Used by
        closure analysis to approximate dependencies before any building
        happens; returns None once a rule has left NotStarted so callers
        don't accidentally race the scheduler. */
    pub fn build_of(&self, path: &Path) -> Option<crate::arrow::Build<A>>
    {
        let handle = self.find(path)?;
        let rule = handle.borrow();
        match &rule.exec
        {
            crate::rule::ExecStatus::NotStarted(build) => Some(build.clone()),
            _ => None,
        }
    }
}
