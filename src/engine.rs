use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::action::Action;
use crate::arrow::{Build, EvalContext, EvalMode, Realizer};
use crate::config::EngineConfig;
use crate::digest::rule_hash;
use crate::error::BuildError;
use crate::fs::util::ensure_dir_exists;
use crate::fs::FileSystem;
use crate::gc::remove_old_artifacts;
use crate::path::Path;
use crate::printer::{Printer, BUILDING, NO_DEPS_WARNING, RECOVERED, UP_TO_DATE};
use crate::registry::RuleRegistry;
use crate::rule::{ExecStatus, PreRule, RuleHandle};
use crate::sandbox::Sandbox;
use crate::timestamp::{max_timestamp, min_timestamp, TimestampCache};
use crate::trace::TraceStore;

/*  Plugs engine.rs's scheduler back into the Build<T> arrow: every
    dependency primitive the arrow touches calls back through
    wait_for_file, recursively driving other rules to completion. */
struct ConcreteRealizer<A, FsType: FileSystem>
{
    engine: Rc<EngineInner<A, FsType>>,
}

impl<A: Action + 'static, FsType: FileSystem + 'static> Realizer for ConcreteRealizer<A, FsType>
{
    fn mode(&self) -> EvalMode
    {
        EvalMode::Concrete
    }

    fn ensure_built(&self, path: &Path, for_file: &Path) -> LocalBoxFuture<'static, Result<(), BuildError>>
    {
        EngineInner::wait_for_file(self.engine.clone(), path.clone(), for_file.clone())
    }

    fn read_contents(&self, path: &Path, _for_file: &Path) -> LocalBoxFuture<'static, Result<Vec<u8>, BuildError>>
    {
        let engine = self.engine.clone();
        let path = path.clone();
        Box::pin(async move {
            if engine.file_system.is_file(path.as_str())
            {
                crate::fs::util::read_file_to_string(&engine.file_system, path.as_str())
                    .map(|text| text.into_bytes())
                    .map_err(|error| BuildError::Io(error.to_string()))
            }
            else
            {
                Err(BuildError::FileUnavailable(path))
            }
        })
    }

    fn is_target(&self, path: &Path) -> bool
    {
        self.engine.registry.is_target(path)
    }

    fn targets_in_dir(&self, dir: &Path) -> Vec<Path>
    {
        self.engine.registry.targets_in_dir(dir)
    }
}

struct EngineInner<A, FsType>
where FsType: FileSystem
{
    registry: Rc<RuleRegistry<A>>,
    trace: RefCell<TraceStore>,
    timestamps: TimestampCache,
    local_mkdirs: RefCell<BTreeSet<String>>,
    pending_targets: RefCell<BTreeSet<Path>>,
    warned_no_deps: RefCell<BTreeSet<Path>>,
    failed_targets: RefCell<BTreeSet<Path>>,
    file_system: FsType,
    config: EngineConfig,
    printer: RefCell<Box<dyn Printer>>,
}

/*  Unlinks any target whose action never finished, so a crash or a
    dropped future doesn't leave a half-written file looking up to
    date on the next run. */
impl<A, FsType: FileSystem> Drop for EngineInner<A, FsType>
{
    fn drop(&mut self)
    {
        for target in self.pending_targets.borrow().iter()
        {
            let _ = self.file_system.remove_file(target.as_str());
        }
    }
}

impl<A: Action + 'static, FsType: FileSystem + 'static> EngineInner<A, FsType>
{
    /*  Walks the for_file chain backwards from `start` until it reaches
        `target` again, reconstructing the cycle for diagnostics. */
    fn cycle_chain(&self, start: Path, target: Path) -> Vec<Path>
    {
        let mut chain = vec![start.clone()];
        let mut current = start;

        loop
        {
            if current == target
            {
                break;
            }

            let next = match self.registry.find(&current)
            {
                Some(handle) =>
                {
                    match &handle.borrow().exec
                    {
                        ExecStatus::Starting{for_file} => for_file.clone(),
                        ExecStatus::Running{for_file, ..} => for_file.clone(),
                        ExecStatus::NotStarted(_) => break,
                    }
                },
                None => break,
            };

            if chain.contains(&next)
            {
                break;
            }
            chain.push(next.clone());
            current = next;
        }

        chain
    }

    fn wait_for_file(self: Rc<Self>, target: Path, for_file: Path) -> LocalBoxFuture<'static, Result<(), BuildError>>
    {
        if !self.registry.is_target(&target)
        {
            let is_local = target.is_local();
            let file_system = self.file_system.clone();
            let target = target.clone();
            return Box::pin(async move {
                if is_local
                {
                    Err(BuildError::NoRuleFound(target))
                }
                else if file_system.is_file(target.as_str())
                {
                    Ok(())
                }
                else
                {
                    Err(BuildError::FileUnavailable(target))
                }
            });
        }

        let handle = self.registry.find(&target).expect("just checked is_target");

        enum Decision<A>
        {
            Run(Build<A>),
            Cycle(Vec<Path>),
            Existing(Shared<LocalBoxFuture<'static, Result<(), BuildError>>>),
        }

        let decision =
        {
            let mut rule_mut = handle.borrow_mut();
            match &rule_mut.exec
            {
                ExecStatus::Running{future, ..} => Decision::Existing(future.clone()),
                ExecStatus::Starting{..} =>
                {
                    let chain = self.cycle_chain(for_file.clone(), target.clone());
                    Decision::Cycle(chain)
                },
                ExecStatus::NotStarted(_) =>
                {
                    let old = std::mem::replace(&mut rule_mut.exec, ExecStatus::Starting{ for_file: for_file.clone() });
                    match old
                    {
                        ExecStatus::NotStarted(build) => Decision::Run(build),
                        _ => unreachable!("just matched NotStarted"),
                    }
                },
            }
        };

        match decision
        {
            Decision::Existing(future) => Box::pin(async move { future.await }),
            Decision::Cycle(chain) => Box::pin(async move { Err(BuildError::Cycle(chain)) }),
            Decision::Run(build) =>
            {
                let engine = self.clone();
                let target_for_run = target.clone();
                let handle_for_run = handle.clone();
                let for_file_for_run = for_file.clone();

                let fut: LocalBoxFuture<'static, Result<(), BuildError>> = Box::pin(async move {
                    engine.compile_rule(target_for_run, handle_for_run, build, for_file_for_run).await
                });
                let shared = fut.shared();
                handle.borrow_mut().exec = ExecStatus::Running{ for_file, future: shared.clone() };
                Box::pin(async move { shared.await })
            },
        }
    }

    async fn ensure_parent_dirs(&self, targets: &BTreeSet<Path>) -> Result<(), BuildError>
    {
        for target in targets
        {
            if !target.is_local()
            {
                continue;
            }
            if let Some(parent) = target.parent()
            {
                let parent_str = parent.as_str().to_string();
                if self.local_mkdirs.borrow().contains(&parent_str)
                {
                    continue;
                }
                ensure_dir_exists(&self.file_system, &parent_str)
                    .map_err(|error| BuildError::Io(error.to_string()))?;
                self.local_mkdirs.borrow_mut().insert(parent_str);
            }
        }
        Ok(())
    }

    async fn compile_rule(
        self: Rc<Self>,
        target: Path,
        handle: RuleHandle<A>,
        build: Build<A>,
        for_file: Path,
    )
    -> Result<(), BuildError>
    {
        let targets: BTreeSet<Path> = handle.borrow().targets.clone();
        let sandbox_requested = handle.borrow().sandbox || self.config.sandbox_by_default;

        self.ensure_parent_dirs(&targets).await?;

        let realizer: Rc<dyn Realizer> = Rc::new(ConcreteRealizer{ engine: self.clone() });
        let ctx = EvalContext::new(realizer, target.clone());
        let action = build.eval(ctx.clone()).await?;

        let deps: BTreeSet<Path> = ctx.deps.borrow().clone();
        let dep_strings: Vec<String> = deps.iter().map(|p| p.as_str().to_string()).collect();
        let target_strings: Vec<String> = targets.iter().map(|p| p.as_str().to_string()).collect();

        let new_hash = rule_hash(&target_strings, &dep_strings, &action.canonical_form());

        let rule_changed =
        {
            let trace = self.trace.borrow();
            targets.iter().any(|t| trace.get(t) != Some(&new_hash))
        };
        {
            let mut trace = self.trace.borrow_mut();
            for t in &targets
            {
                trace.set(t.clone(), new_hash.clone());
            }
        }

        let deps_vec: Vec<Path> = deps.iter().cloned().collect();
        let targets_vec: Vec<Path> = targets.iter().cloned().collect();

        let deps_max_ts = max_timestamp(&self.timestamps, &self.file_system, &deps_vec);
        let targets_min_ts = min_timestamp(&self.timestamps, &self.file_system, &targets_vec);

        if deps_max_ts.missing_files
        {
            return Err(BuildError::Internal(
                "dependency reported missing after it was realised".to_string()));
        }

        let no_deps_degenerate = deps_vec.is_empty();
        if no_deps_degenerate && !self.warned_no_deps.borrow().contains(&target)
        {
            self.warned_no_deps.borrow_mut().insert(target.clone());
            let mut printer = self.printer.borrow_mut();
            printer.print_single_banner_line(NO_DEPS_WARNING.0, NO_DEPS_WARNING.1, target.as_str());
        }

        let should_run = rule_changed
            || targets_min_ts.missing_files
            || (no_deps_degenerate && !targets_min_ts.missing_files)
            || match (targets_min_ts.limit, deps_max_ts.limit)
            {
                (Some(t), Some(d)) => t < d,
                _ => false,
            };

        if !should_run
        {
            let mut printer = self.printer.borrow_mut();
            for t in &targets
            {
                printer.print_single_banner_line(UP_TO_DATE.0, UP_TO_DATE.1, t.as_str());
            }
            return Ok(());
        }

        let updated_files = action.updated_files();
        let targets_to_remove: Vec<Path> = targets.iter()
            .filter(|t| !updated_files.contains(t))
            .cloned()
            .collect();

        for t in &targets_to_remove
        {
            let _ = self.file_system.remove_file(t.as_str());
        }

        self.pending_targets.borrow_mut().extend(targets.iter().cloned());

        let sandbox = if sandbox_requested
        {
            let dep_set: HashSet<Path> = deps.iter().cloned().collect();
            let target_set: HashSet<Path> = targets.iter().cloned().collect();
            match Sandbox::create(&self.file_system, &self.config.build_root, &new_hash.human_readable(), &dep_set, &target_set)
            {
                Ok(sandbox) => Some(sandbox),
                Err(message) => return Err(BuildError::Io(message)),
            }
        }
        else
        {
            None
        };

        let final_action = match &sandbox
        {
            Some(sandbox) => action.sandboxed(&sandbox.mapping),
            None => action,
        };

        if let Some(working_dir) = final_action.working_dir()
        {
            ensure_dir_exists(&self.file_system, working_dir.as_str())
                .map_err(|error| BuildError::Io(error.to_string()))?;
        }

        let exec_result = final_action.exec().await;

        match exec_result
        {
            Ok(()) =>
            {
                if let Some(sandbox) = &sandbox
                {
                    let _ = sandbox.remove(&self.file_system);
                }

                {
                    let mut pending = self.pending_targets.borrow_mut();
                    for t in &targets
                    {
                        pending.remove(t);
                    }
                }

                let mut not_generated = Vec::new();
                for t in &targets
                {
                    self.timestamps.invalidate(t);
                    if !self.file_system.is_file(t.as_str()) && !self.file_system.is_dir(t.as_str())
                    {
                        not_generated.push(t.clone());
                    }
                }

                if !not_generated.is_empty()
                {
                    return Err(BuildError::TargetsNotGenerated(not_generated));
                }

                let mut printer = self.printer.borrow_mut();
                let mut failed = self.failed_targets.borrow_mut();
                for t in &targets
                {
                    if failed.remove(t)
                    {
                        printer.print_single_banner_line(RECOVERED.0, RECOVERED.1, t.as_str());
                    }
                    else
                    {
                        printer.print_single_banner_line(BUILDING.0, BUILDING.1, t.as_str());
                    }
                }

                Ok(())
            },
            Err(action_error) =>
            {
                self.failed_targets.borrow_mut().extend(targets.iter().cloned());
                let dep_path = self.cycle_chain(for_file.clone(), target.clone());
                let message = action_error.to_string();
                self.printer.borrow_mut().error(&message);
                Err(BuildError::ActionFailed{ dep_path, message })
            },
        }
    }
}

/*  The public handle to a build.  Cheap to clone - it's just an Rc
    around the shared engine state. */
pub struct BuildEngine<A, FsType: FileSystem>
{
    inner: Rc<EngineInner<A, FsType>>,
}

impl<A, FsType: FileSystem> Clone for BuildEngine<A, FsType>
{
    fn clone(&self) -> Self
    {
        BuildEngine{ inner: self.inner.clone() }
    }
}

impl<A: Action + 'static, FsType: FileSystem + 'static> BuildEngine<A, FsType>
{
    pub fn new(
        config: EngineConfig,
        file_system: FsType,
        printer: Box<dyn Printer>,
    )
    -> Result<BuildEngine<A, FsType>, BuildError>
    {
        let trace = TraceStore::load(&file_system, &config.trace_path())?;

        Ok(BuildEngine
        {
            inner: Rc::new(EngineInner
            {
                registry: Rc::new(RuleRegistry::new()),
                trace: RefCell::new(trace),
                timestamps: TimestampCache::new(),
                local_mkdirs: RefCell::new(BTreeSet::new()),
                pending_targets: RefCell::new(BTreeSet::new()),
                warned_no_deps: RefCell::new(BTreeSet::new()),
                failed_targets: RefCell::new(BTreeSet::new()),
                file_system,
                config,
                printer: RefCell::new(printer),
            }),
        })
    }

    pub fn add_rule(&self, pre_rule: PreRule<A>, allow_override: bool) -> Result<(), BuildError>
    {
        self.inner.registry.add_rule(pre_rule, allow_override)
    }

    pub fn is_target(&self, path: &Path) -> bool
    {
        self.inner.registry.is_target(path)
    }

    /*  Pre-flight diagnostic: walks the approximate dependency closure of
        `roots` without running anything, surfacing a Cycle error before
        do_build would otherwise discover it mid-schedule. */
    pub fn check_cycles(&self, roots: &[Path]) -> Result<BTreeSet<Path>, BuildError>
    {
        crate::closure::closure_and_cycles(
            self.inner.registry.clone(),
            roots,
            |path| self.inner.registry.build_of(path))
    }

    /*  Library-dependency requirements declared via record_lib_deps
        across the approximate closure of `roots`, grouped by context
        (the first build-directory segment of each observed path). */
    pub fn lib_deps_by_context(&self, roots: &[Path]) -> Result<BTreeMap<String, BTreeSet<String>>, BuildError>
    {
        let observations = crate::closure::approximate_lib_deps(
            self.inner.registry.clone(),
            roots,
            |path| self.inner.registry.build_of(path))?;
        Ok(crate::closure::aggregate_lib_deps(&observations))
    }

    fn run_gc(&self) -> Result<(), BuildError>
    {
        let registered: HashSet<Path> = self.inner.registry.all_targets().into_iter().collect();
        for context in &self.inner.config.contexts
        {
            remove_old_artifacts(&self.inner.file_system, &context.build_dir, &registered)
                .map_err(BuildError::Io)?;
        }
        Ok(())
    }

    /*  Realises every requested target, using a cooperative single-
        threaded scheduler: concurrent requests for the same rule share
        one in-flight execution (ExecStatus::Running), and dependency
        cycles are reported rather than causing a deadlock. */
    pub async fn do_build(&self, requested: Vec<Path>) -> Result<(), BuildError>
    {
        self.run_gc()?;

        let requested_count = requested.len();
        let local = tokio::task::LocalSet::new();
        let inner = self.inner.clone();

        let result: Result<(), BuildError> = local.run_until(async move {
            let mut handles = Vec::new();
            for target in requested
            {
                let engine = inner.clone();
                let target_clone = target.clone();
                handles.push(tokio::task::spawn_local(async move {
                    EngineInner::wait_for_file(engine, target_clone.clone(), target_clone).await
                }));
            }

            let mut first_error = None;
            for handle in handles
            {
                match handle.await
                {
                    Ok(Ok(())) => {},
                    Ok(Err(error)) => if first_error.is_none() { first_error = Some(error); },
                    Err(join_error) => if first_error.is_none() { first_error = Some(BuildError::Internal(join_error.to_string())); },
                }
            }

            match first_error
            {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }).await;

        result?;

        self.inner.trace.borrow().dump(&self.inner.file_system, &self.inner.config.trace_path())?;
        self.inner.printer.borrow_mut().print(&format!("{} target(s) requested", requested_count));
        Ok(())
    }
}
