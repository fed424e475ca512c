use std::collections::{HashMap, HashSet};

use futures::future::LocalBoxFuture;

use crate::error::ActionError;
use crate::path::Path;

/*  What the engine needs from an action, and nothing about how to build
    or run one: the concrete action language (process invocation, file
    copy, write-file) lives outside this crate. */
pub trait Action
{
    /*  Canonical text form fed into the rule hash.  Two actions with the
        same canonical form are treated as identical for freshness
        purposes, even if their runtime representation differs. */
    fn canonical_form(&self) -> String;

    /*  Targets this action updates in place rather than replacing; the
        executor must not pre-delete these before running the action. */
    fn updated_files(&self) -> HashSet<Path>;

    /*  Returns a copy of the action with every local path rewritten
        through `mapping`; external paths are left untouched. */
    fn sandboxed(&self, mapping: &HashMap<Path, Path>) -> Self
    where
        Self: Sized;

    fn working_dir(&self) -> Option<&Path>;

    fn exec<'a>(&'a self) -> LocalBoxFuture<'a, Result<(), ActionError>>;
}
