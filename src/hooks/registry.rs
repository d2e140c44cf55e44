//! Hook registry for pre/post interception of named operations.
//!
//! Pre-hooks observe the operation's arguments before it runs. Post-hooks run
//! in registration order, each receiving the arguments and the current return
//! value and producing the value handed to the next hook (or the caller).

use crate::core::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// Hook observing arguments before an operation.
pub type PreHook<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Hook receiving arguments and the current return value.
pub type PostHook<A, R> = Arc<dyn Fn(&A, R) -> R + Send + Sync>;

/// Stage at which a hook runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookStage {
    Pre,
    Post,
}

impl HookStage {
    /// Registry key for an operation at this stage, e.g. `pre_unpack`.
    pub fn key(self, op: &str) -> String {
        match self {
            HookStage::Pre => format!("pre_{}", op),
            HookStage::Post => format!("post_{}", op),
        }
    }
}

struct HookPoint<A, R> {
    pre: Vec<PreHook<A>>,
    post: Vec<PostHook<A, R>>,
}

impl<A, R> Default for HookPoint<A, R> {
    fn default() -> Self {
        Self {
            pre: Vec::new(),
            post: Vec::new(),
        }
    }
}

type Snapshot<A, R> = (Vec<PreHook<A>>, Vec<PostHook<A, R>>);

/// Per-instance registry of hooks keyed by operation name.
#[derive(Default)]
pub struct HookRegistry {
    points: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
    counts: RwLock<HashMap<String, usize>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-hook for `op`.
    pub fn pre<A, R>(&self, op: &str, hook: impl Fn(&A) + Send + Sync + 'static) -> Result<()>
    where
        A: 'static,
        R: 'static,
    {
        self.with_point_mut::<A, R, _>(op, |point| point.pre.push(Arc::new(hook)))?;
        self.bump(HookStage::Pre.key(op));
        Ok(())
    }

    /// Register a post-hook for `op`.
    pub fn post<A, R>(
        &self,
        op: &str,
        hook: impl Fn(&A, R) -> R + Send + Sync + 'static,
    ) -> Result<()>
    where
        A: 'static,
        R: 'static,
    {
        self.with_point_mut::<A, R, _>(op, |point| point.post.push(Arc::new(hook)))?;
        self.bump(HookStage::Post.key(op));
        Ok(())
    }

    /// Number of hooks registered for `op` at `stage`.
    pub fn count(&self, op: &str, stage: HookStage) -> usize {
        self.counts
            .read()
            .unwrap()
            .get(&stage.key(op))
            .copied()
            .unwrap_or(0)
    }

    /// Run a synchronous operation through its hooks.
    pub fn run<A, R>(&self, op: &str, args: &A, f: impl FnOnce(&A) -> R) -> Result<R>
    where
        A: 'static,
        R: 'static,
    {
        let (pre, post) = self.snapshot::<A, R>(op)?;
        for hook in &pre {
            hook(args);
        }
        let mut value = f(args);
        for hook in &post {
            value = hook(args, value);
        }
        Ok(value)
    }

    /// Run a fallible asynchronous operation through its hooks. Post-hooks
    /// only see successful results.
    pub async fn run_async<'a, A, R, Fut>(
        &self,
        op: &str,
        args: &'a A,
        f: impl FnOnce(&'a A) -> Fut,
    ) -> Result<R>
    where
        A: 'static,
        R: 'static,
        Fut: Future<Output = Result<R>>,
    {
        let (pre, post) = self.snapshot::<A, R>(op)?;
        for hook in &pre {
            hook(args);
        }
        let mut value = f(args).await?;
        for hook in &post {
            value = hook(args, value);
        }
        Ok(value)
    }

    fn bump(&self, key: String) {
        *self.counts.write().unwrap().entry(key).or_insert(0) += 1;
    }

    fn with_point_mut<A, R, T>(
        &self,
        op: &str,
        f: impl FnOnce(&mut HookPoint<A, R>) -> T,
    ) -> Result<T>
    where
        A: 'static,
        R: 'static,
    {
        let mut points = self.points.write().unwrap();
        let point = points
            .entry(op.to_string())
            .or_insert_with(|| Box::new(HookPoint::<A, R>::default()) as Box<dyn Any + Send + Sync>);
        point
            .downcast_mut::<HookPoint<A, R>>()
            .map(f)
            .ok_or_else(|| Error::HookSignatureMismatch(op.to_string()))
    }

    fn snapshot<A, R>(&self, op: &str) -> Result<Snapshot<A, R>>
    where
        A: 'static,
        R: 'static,
    {
        let points = self.points.read().unwrap();
        match points.get(op) {
            None => Ok((Vec::new(), Vec::new())),
            Some(point) => point
                .downcast_ref::<HookPoint<A, R>>()
                .map(|p| (p.pre.clone(), p.post.clone()))
                .ok_or_else(|| Error::HookSignatureMismatch(op.to_string())),
        }
    }
}

/// A component owning a hook registry.
pub trait Hookable {
    /// The receiver's registry, if it has one.
    fn hooks(&self) -> Option<&HookRegistry> {
        None
    }
}

/// Resolve the registry of a receiver, failing with `NoHooksFound`.
pub fn hooks_for<'a, T: Hookable + ?Sized>(receiver: &'a T, op: &str) -> Result<&'a HookRegistry> {
    receiver
        .hooks()
        .ok_or_else(|| Error::NoHooksFound(op.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Args = (String, String);

    fn args() -> Args {
        ("one".to_string(), "two".to_string())
    }

    #[test]
    fn test_post_hooks_chain_in_order() {
        let hooks = HookRegistry::new();
        hooks
            .pre::<Args, i32>("testing", |(a, b)| {
                assert_eq!(a, "one");
                assert_eq!(b, "two");
            })
            .unwrap();
        hooks
            .post::<Args, i32>("testing", |_, ret| {
                assert_eq!(ret, 1);
                2
            })
            .unwrap();
        hooks
            .post::<Args, i32>("testing", |_, ret| {
                assert_eq!(ret, 2);
                3
            })
            .unwrap();

        let result = hooks.run("testing", &args(), |(a, b)| {
            assert_eq!(a, "one");
            assert_eq!(b, "two");
            1
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_pre_hooks_run_before_operation() {
        let hooks = HookRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = order.clone();
        hooks
            .pre::<Args, ()>("op", move |_| seen.lock().unwrap().push("pre"))
            .unwrap();

        hooks
            .run("op", &args(), |_| order.lock().unwrap().push("op"))
            .unwrap();
        assert_eq!(*order.lock().unwrap(), ["pre", "op"]);
    }

    #[test]
    fn test_no_hooks_passes_through() {
        let hooks = HookRegistry::new();
        assert_eq!(hooks.run("unhooked", &5u32, |n| n * 2).unwrap(), 10);
    }

    #[test]
    fn test_signature_mismatch() {
        let hooks = HookRegistry::new();
        hooks.post::<u32, u32>("op", |_, v| v).unwrap();
        assert!(matches!(
            hooks.post::<String, u32>("op", |_, v| v),
            Err(Error::HookSignatureMismatch(_))
        ));
        assert!(matches!(
            hooks.run::<u32, String>("op", &1, |_| String::new()),
            Err(Error::HookSignatureMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_run_async_post_hooks_replace_value() {
        let hooks = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        hooks
            .pre::<Vec<u8>, usize>("measure", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        hooks
            .post::<Vec<u8>, usize>("measure", |bytes, len| len + bytes.len())
            .unwrap();

        let input = vec![1u8, 2, 3];
        let out = hooks
            .run_async("measure", &input, |bytes| async move { Ok(bytes.len()) })
            .await
            .unwrap();
        assert_eq!(out, 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_async_error_skips_post_hooks() {
        let hooks = HookRegistry::new();
        hooks
            .post::<u8, u8>("fail", |_, _| panic!("post hook must not run"))
            .unwrap();
        let result = hooks
            .run_async("fail", &0u8, |_| async { Err::<u8, _>(Error::ConnectionClosed) })
            .await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    struct Bare;
    impl Hookable for Bare {}

    struct WithHooks(HookRegistry);
    impl Hookable for WithHooks {
        fn hooks(&self) -> Option<&HookRegistry> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_receiver_without_registry() {
        assert!(matches!(hooks_for(&Bare, "op"), Err(Error::NoHooksFound(_))));
        assert!(hooks_for(&WithHooks(HookRegistry::new()), "op").is_ok());
    }

    #[test]
    fn test_hook_counts() {
        let hooks = HookRegistry::new();
        hooks.pre::<u8, u8>("op", |_| {}).unwrap();
        hooks.post::<u8, u8>("op", |_, v| v).unwrap();
        hooks.post::<u8, u8>("op", |_, v| v).unwrap();
        assert_eq!(hooks.count("op", HookStage::Pre), 1);
        assert_eq!(hooks.count("op", HookStage::Post), 2);
        assert_eq!(hooks.count("other", HookStage::Post), 0);
    }

    #[test]
    fn test_stage_keys() {
        assert_eq!(HookStage::Pre.key("unpack"), "pre_unpack");
        assert_eq!(HookStage::Post.key("unpack"), "post_unpack");
    }
}
