/*  The build arrow: a composable description of how to produce a value,
    built out of primitives that can be run two different ways by the
    same code path.  `EvalMode::Concrete` drives the scheduler (realising
    every dependency it touches); `EvalMode::Approximate` collects the
    same dependency set without performing any IO, used by the closure
    analysis in closure.rs.  Both modes run the identical `Build<T>`
    closures; only the `Realizer` plugged into the `EvalContext` differs. */

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use regex::Regex;

use crate::error::BuildError;
use crate::path::Path;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EvalMode
{
    Concrete,
    Approximate,
}

/*  What a Build<T> closure needs from its caller: realise a dependency
    (or pretend to, in approximate mode), read its contents, and answer
    questions about the registered target set. */
pub trait Realizer
{
    fn mode(&self) -> EvalMode;

    fn ensure_built(&self, path: &Path, for_file: &Path) -> LocalBoxFuture<'static, Result<(), BuildError>>;

    fn read_contents(&self, path: &Path, for_file: &Path) -> LocalBoxFuture<'static, Result<Vec<u8>, BuildError>>;

    fn is_target(&self, path: &Path) -> bool;

    fn targets_in_dir(&self, dir: &Path) -> Vec<Path>;
}

enum MemoState
{
    Unevaluated,
    Evaluating,
    Evaluated(Rc<dyn Any>),
}

#[derive(Clone)]
pub struct EvalContext
{
    pub realizer: Rc<dyn Realizer>,
    pub for_file: Path,
    pub deps: Rc<RefCell<BTreeSet<Path>>>,
    pub lib_deps: Rc<RefCell<Vec<(Path, Vec<String>)>>>,
    memo: Rc<RefCell<HashMap<String, MemoState>>>,
}

impl EvalContext
{
    pub fn new(realizer: Rc<dyn Realizer>, for_file: Path) -> EvalContext
    {
        EvalContext
        {
            realizer,
            for_file,
            deps: Rc::new(RefCell::new(BTreeSet::new())),
            lib_deps: Rc::new(RefCell::new(Vec::new())),
            memo: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

type Thunk<T> = Rc<dyn Fn(EvalContext) -> LocalBoxFuture<'static, Result<T, BuildError>>>;

pub struct Build<T>(Thunk<T>);

impl<T> Clone for Build<T>
{
    fn clone(&self) -> Self
    {
        Build(self.0.clone())
    }
}

impl<T: 'static> Build<T>
{
    pub fn eval(&self, ctx: EvalContext) -> LocalBoxFuture<'static, Result<T, BuildError>>
    {
        (self.0)(ctx)
    }

    pub fn ret(value: T) -> Build<T>
    where
        T: Clone,
    {
        Build(Rc::new(move |_ctx| {
            let value = value.clone();
            Box::pin(async move { Ok(value) })
        }))
    }

    pub fn fail(message: String) -> Build<T>
    {
        Build(Rc::new(move |ctx: EvalContext| {
            let message = message.clone();
            Box::pin(async move {
                Err(BuildError::ActionFailed{ dep_path: vec![ctx.for_file.clone()], message })
            })
        }))
    }

    pub fn bind<U, F>(self, f: F) -> Build<U>
    where
        U: 'static,
        F: Fn(T) -> Build<U> + Clone + 'static,
    {
        let inner = self.0;
        Build(Rc::new(move |ctx: EvalContext| {
            let inner = inner.clone();
            let f = f.clone();
            let fut = inner(ctx.clone());
            let next_ctx = ctx;
            let result: LocalBoxFuture<'static, Result<U, BuildError>> = Box::pin(async move {
                let value = fut.await?;
                let next = f(value);
                next.eval(next_ctx).await
            });
            result
        }))
    }

    pub fn map<U, F>(self, f: F) -> Build<U>
    where
        U: 'static,
        F: Fn(T) -> U + Clone + 'static,
    {
        let inner = self.0;
        Build(Rc::new(move |ctx: EvalContext| {
            let inner = inner.clone();
            let f = f.clone();
            let fut = inner(ctx);
            let result: LocalBoxFuture<'static, Result<U, BuildError>> = Box::pin(async move {
                Ok(f(fut.await?))
            });
            result
        }))
    }

    /*  Memoises the sub-arrow under `name`, scoped to one top-level
        evaluation (one EvalContext tree).  Re-entering `name` while it
        is still evaluating is an arrow-internal cycle, not a scheduler
        cycle, and is reported distinctly. */
    pub fn memo(name: &str, inner: Build<T>) -> Build<T>
    where
        T: Clone,
    {
        let name = name.to_string();
        Build(Rc::new(move |ctx: EvalContext| {
            let name = name.clone();
            let inner = inner.clone();
            Box::pin(async move {
                {
                    let mut cells = ctx.memo.borrow_mut();
                    match cells.get(&name)
                    {
                        Some(MemoState::Evaluated(value)) =>
                        {
                            let value = value.downcast_ref::<T>().expect("memo type mismatch").clone();
                            return Ok(value);
                        },
                        Some(MemoState::Evaluating) => return Err(BuildError::MemoCycle(name)),
                        _ => {},
                    }
                    cells.insert(name.clone(), MemoState::Evaluating);
                }

                let value = inner.eval(ctx.clone()).await?;

                ctx.memo.borrow_mut().insert(name, MemoState::Evaluated(Rc::new(value.clone())));
                Ok(value)
            })
        }))
    }
}

pub fn both<A: 'static, B: 'static>(a: Build<A>, b: Build<B>) -> Build<(A, B)>
{
    Build(Rc::new(move |ctx: EvalContext| {
        let fut_a = a.eval(ctx.clone());
        let fut_b = b.eval(ctx);
        Box::pin(async move {
            let (ra, rb) = futures::join!(fut_a, fut_b);
            Ok((ra?, rb?))
        })
    }))
}

/*  Declares `paths` as dependencies with no value; realises each one. */
pub fn paths(ps: Vec<Path>) -> Build<()>
{
    Build(Rc::new(move |ctx: EvalContext| {
        let ps = ps.clone();
        Box::pin(async move {
            for p in &ps
            {
                ctx.realizer.ensure_built(p, &ctx.for_file).await?;
                ctx.deps.borrow_mut().insert(p.clone());
            }
            Ok(())
        })
    }))
}

pub fn contents(p: Path) -> Build<Vec<u8>>
{
    Build(Rc::new(move |ctx: EvalContext| {
        let p = p.clone();
        Box::pin(async move {
            ctx.realizer.ensure_built(&p, &ctx.for_file).await?;
            ctx.deps.borrow_mut().insert(p.clone());
            ctx.realizer.read_contents(&p, &ctx.for_file).await
        })
    }))
}

pub fn lines_of(p: Path) -> Build<Vec<String>>
{
    contents(p).map(|bytes| {
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| line.to_string())
            .collect()
    })
}

/*  Matches already-registered targets in `dir` against `pattern`; never
    realises anything and never registers `dir` itself as a dependency -
    a glob observes the target set, it doesn't force a build. */
pub fn glob(dir: Path, pattern: Regex) -> Build<Vec<Path>>
{
    Build(Rc::new(move |ctx: EvalContext| {
        let dir = dir.clone();
        let pattern = pattern.clone();
        Box::pin(async move {
            let mut matches: Vec<Path> = ctx.realizer.targets_in_dir(&dir)
                .into_iter()
                .filter(|path| {
                    let name = path.as_str().rsplit('/').next().unwrap_or(path.as_str());
                    pattern.is_match(name)
                })
                .collect();
            matches.sort();
            Ok(matches)
        })
    }))
}

/*  True iff `p` is a registered target, not iff it exists on disk. */
pub fn file_exists(p: Path) -> Build<bool>
{
    Build(Rc::new(move |ctx: EvalContext| {
        let p = p.clone();
        Box::pin(async move { Ok(ctx.realizer.is_target(&p)) })
    }))
}

/*  Side-channel observation of a directory's library dependencies,
    collected by the closure analysis and otherwise ignored by the
    executor. */
pub fn record_lib_deps(dir: Path, deps: Vec<String>) -> Build<()>
{
    Build(Rc::new(move |ctx: EvalContext| {
        let dir = dir.clone();
        let deps = deps.clone();
        Box::pin(async move {
            ctx.lib_deps.borrow_mut().push((dir, deps));
            Ok(())
        })
    }))
}
