use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::arrow::{Build, EvalContext, EvalMode, Realizer};
use crate::error::BuildError;
use crate::path::Path;
use crate::registry::RuleRegistry;

/*  Realiser for approximate evaluation: never touches the filesystem,
    never drives another rule's action, just answers "what would this
    arrow depend on" by returning placeholder values and recording the
    paths it was asked about. */
struct ApproximateRealizer<A>
{
    registry: Rc<RuleRegistry<A>>,
}

impl<A: 'static> Realizer for ApproximateRealizer<A>
{
    fn mode(&self) -> EvalMode
    {
        EvalMode::Approximate
    }

    fn ensure_built(&self, _path: &Path, _for_file: &Path) -> LocalBoxFuture<'static, Result<(), BuildError>>
    {
        Box::pin(async { Ok(()) })
    }

    fn read_contents(&self, _path: &Path, _for_file: &Path) -> LocalBoxFuture<'static, Result<Vec<u8>, BuildError>>
    {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn is_target(&self, path: &Path) -> bool
    {
        self.registry.is_target(path)
    }

    fn targets_in_dir(&self, dir: &Path) -> Vec<Path>
    {
        self.registry.targets_in_dir(dir)
    }
}

/*  Runs `build`'s approximate evaluation once and returns both the
    dependency paths and the record_lib_deps observations it made,
    without running anything or touching disk. */
fn approximate_eval<A: 'static>(
    registry: Rc<RuleRegistry<A>>,
    target: &Path,
    build: &Build<A>,
)
-> Result<(BTreeSet<Path>, Vec<(Path, Vec<String>)>), BuildError>
{
    let realizer: Rc<dyn Realizer> = Rc::new(ApproximateRealizer{ registry });
    let ctx = EvalContext::new(realizer, target.clone());
    futures::executor::block_on(build.eval(ctx.clone()))?;
    let result = (ctx.deps.borrow().clone(), ctx.lib_deps.borrow().clone());
    Ok(result)
}

pub fn approximate_deps<A: 'static>(
    registry: Rc<RuleRegistry<A>>,
    target: &Path,
    build: &Build<A>,
)
-> Result<BTreeSet<Path>, BuildError>
{
    approximate_eval(registry, target, build).map(|(deps, _)| deps)
}

/*  record_lib_deps observations across the whole approximate closure of
    `roots`, feeding aggregate_lib_deps so §4.6's aggregation query can
    actually run against a real rule set instead of hand-built test
    fixtures. */
pub fn approximate_lib_deps<A: 'static>(
    registry: Rc<RuleRegistry<A>>,
    roots: &[Path],
    build_of: impl Fn(&Path) -> Option<Build<A>>,
)
-> Result<Vec<(Path, Vec<String>)>, BuildError>
{
    let closure = closure_and_cycles(registry.clone(), roots, &build_of)?;
    let mut observations = Vec::new();
    for path in &closure
    {
        if let Some(build) = build_of(path)
        {
            let (_, lib_deps) = approximate_eval(registry.clone(), path, &build)?;
            observations.extend(lib_deps);
        }
    }
    Ok(observations)
}

/*  Top-closure of rules reachable from `roots` via their approximate
    dependency sets, with a DFS cycle check over that same graph - no
    execution-state machine is needed since nothing here runs an action. */
pub fn closure_and_cycles<A: 'static>(
    registry: Rc<RuleRegistry<A>>,
    roots: &[Path],
    build_of: impl Fn(&Path) -> Option<Build<A>>,
)
-> Result<BTreeSet<Path>, BuildError>
{
    let mut visited: BTreeSet<Path> = BTreeSet::new();
    let mut stack: Vec<Path> = Vec::new();
    let mut on_stack: BTreeSet<Path> = BTreeSet::new();

    for root in roots
    {
        visit(&registry, root, &build_of, &mut visited, &mut stack, &mut on_stack)?;
    }

    Ok(visited)
}

fn visit<A: 'static>(
    registry: &Rc<RuleRegistry<A>>,
    path: &Path,
    build_of: &impl Fn(&Path) -> Option<Build<A>>,
    visited: &mut BTreeSet<Path>,
    stack: &mut Vec<Path>,
    on_stack: &mut BTreeSet<Path>,
)
-> Result<(), BuildError>
{
    if on_stack.contains(path)
    {
        let mut chain: Vec<Path> = stack.iter().skip_while(|p| *p != path).cloned().collect();
        chain.push(path.clone());
        return Err(BuildError::Cycle(chain));
    }

    if visited.contains(path)
    {
        return Ok(());
    }

    let build = match build_of(path)
    {
        Some(build) => build,
        None => { visited.insert(path.clone()); return Ok(()); },
    };

    stack.push(path.clone());
    on_stack.insert(path.clone());
    visited.insert(path.clone());

    let deps = approximate_deps(registry.clone(), path, &build)?;
    for dep in &deps
    {
        if registry.is_target(dep)
        {
            visit(registry, dep, build_of, visited, stack, on_stack)?;
        }
        else
        {
            visited.insert(dep.clone());
        }
    }

    stack.pop();
    on_stack.remove(path);
    Ok(())
}

/*  Aggregates record_lib_deps observations, grouped by the first
    build-directory segment of each path (its context). */
pub fn aggregate_lib_deps(observations: &[(Path, Vec<String>)]) -> BTreeMap<String, BTreeSet<String>>
{
    let mut by_context: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (dir, deps) in observations
    {
        let context = dir.as_str().split('/').next().unwrap_or("").to_string();
        let entry = by_context.entry(context).or_insert_with(BTreeSet::new);
        for dep in deps
        {
            entry.insert(dep.clone());
        }
    }
    by_context
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::arrow::{paths, record_lib_deps};
    use std::collections::BTreeSet as Set;

    fn register(registry: &RuleRegistry<()>, target: &str)
    {
        let mut targets = Set::new();
        targets.insert(Path::local(target));
        registry.add_rule(crate::rule::PreRule::new(Build::ret(()), targets, false), false).unwrap();
    }

    #[test]
    fn closure_reaches_transitive_targets()
    {
        let registry: RuleRegistry<()> = RuleRegistry::new();
        register(&registry, "a");
        register(&registry, "b");

        let build_of = |p: &Path| -> Option<Build<()>>
        {
            if p.as_str() == "a" { Some(paths(vec![Path::local("b")])) }
            else { Some(Build::ret(())) }
        };

        let closure = closure_and_cycles(Rc::new(registry), &[Path::local("a")], build_of).unwrap();
        assert!(closure.contains(&Path::local("a")));
        assert!(closure.contains(&Path::local("b")));
    }

    #[test]
    fn cycle_is_detected()
    {
        let registry: RuleRegistry<()> = RuleRegistry::new();
        register(&registry, "a");
        register(&registry, "b");

        let build_of = |p: &Path| -> Option<Build<()>>
        {
            if p.as_str() == "a" { Some(paths(vec![Path::local("b")])) }
            else { Some(paths(vec![Path::local("a")])) }
        };

        let result = closure_and_cycles(Rc::new(registry), &[Path::local("a")], build_of);
        assert!(matches!(result, Err(BuildError::Cycle(_))));
    }

    #[test]
    fn lib_deps_grouped_by_context()
    {
        let observations = vec![
            (Path::local("ctx1/dir"), vec!["foo".to_string()]),
            (Path::local("ctx1/other"), vec!["bar".to_string()]),
            (Path::local("ctx2/dir"), vec!["baz".to_string()]),
        ];
        let grouped = aggregate_lib_deps(&observations);
        assert_eq!(grouped.get("ctx1").unwrap().len(), 2);
        assert_eq!(grouped.get("ctx2").unwrap().len(), 1);
    }

    #[test]
    fn approximate_lib_deps_walks_the_whole_closure()
    {
        let registry: RuleRegistry<()> = RuleRegistry::new();
        register(&registry, "ctx1/a");
        register(&registry, "ctx1/b");

        let build_of = |p: &Path| -> Option<Build<()>>
        {
            if p.as_str() == "ctx1/a"
            {
                Some(record_lib_deps(Path::local("ctx1/a"), vec!["libfoo".to_string()])
                    .bind(|_| paths(vec![Path::local("ctx1/b")])))
            }
            else
            {
                Some(record_lib_deps(Path::local("ctx1/b"), vec!["libbar".to_string()]))
            }
        };

        let observations = approximate_lib_deps(Rc::new(registry), &[Path::local("ctx1/a")], build_of).unwrap();
        let grouped = aggregate_lib_deps(&observations);
        assert_eq!(grouped.get("ctx1").unwrap().len(), 2);
    }
}
