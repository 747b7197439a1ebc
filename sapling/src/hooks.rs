//! Before/after hooks and the pipeline that gates every mutation.
//!
//! A mutation runs as `before`, then the default mutation, then `after`. A
//! `before` hook resolving to [`Verdict::Veto`] cancels the mutation with no
//! side effect. Hooks may be asynchronous; their futures are awaited in
//! order.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by hooks and factories.
pub type HookFuture<R> = Pin<Box<dyn Future<Output = R> + Send + 'static>>;

/// Gate invoked before a mutation.
pub type BeforeHook<T> =
    Arc<dyn Fn(HookContext<T>) -> HookFuture<Verdict> + Send + Sync>;

/// Notification invoked after a mutation.
pub type AfterHook<T> =
    Arc<dyn Fn(HookContext<T>) -> HookFuture<()> + Send + Sync>;

/// Notification invoked when an item is (de)selected.
pub type SelectHook<T> = Arc<dyn Fn(T, bool) -> HookFuture<()> + Send + Sync>;

/// Factory producing new items from the parent and the new item's depth.
///
/// The depth is `None` when the item is created at the root.
pub type CreateFactory<T> =
    Arc<dyn Fn(Option<T>, Option<usize>) -> HookFuture<T> + Send + Sync>;

/// Kind of update passed to the update hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateAction {
    #[default]
    Edit,
    Move,
}

/// Outcome of a `before` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Veto,
}

impl From<bool> for Verdict {
    fn from(value: bool) -> Self {
        if value { Self::Proceed } else { Self::Veto }
    }
}

impl From<()> for Verdict {
    fn from(_: ()) -> Self {
        Self::Proceed
    }
}

/// Snapshot handed to hooks.
///
/// The context owns clones of the items; hooks never observe the live
/// collection.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext<T> {
    pub item: T,
    pub action: Option<UpdateAction>,
    pub new_parent: Option<T>,
}

impl<T> HookContext<T> {
    pub fn new(item: T) -> Self {
        Self {
            item,
            action: None,
            new_parent: None,
        }
    }

    pub fn update(
        item: T,
        action: UpdateAction,
        new_parent: Option<T>,
    ) -> Self {
        Self {
            item,
            action: Some(action),
            new_parent,
        }
    }
}

/// The hook slots of a tree.
pub struct Hooks<T> {
    pub(crate) on_before_create: Option<BeforeHook<T>>,
    pub(crate) on_create: Option<AfterHook<T>>,
    pub(crate) on_before_delete: Option<BeforeHook<T>>,
    pub(crate) on_delete: Option<AfterHook<T>>,
    pub(crate) on_before_update: Option<BeforeHook<T>>,
    pub(crate) on_update: Option<AfterHook<T>>,
    pub(crate) on_select: Option<SelectHook<T>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            on_before_create: None,
            on_create: None,
            on_before_delete: None,
            on_delete: None,
            on_before_update: None,
            on_update: None,
            on_select: None,
        }
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_before_create: self.on_before_create.clone(),
            on_create: self.on_create.clone(),
            on_before_delete: self.on_before_delete.clone(),
            on_delete: self.on_delete.clone(),
            on_before_update: self.on_before_update.clone(),
            on_update: self.on_update.clone(),
            on_select: self.on_select.clone(),
        }
    }
}

impl<T> fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_before_create", &self.on_before_create.is_some())
            .field("on_create", &self.on_create.is_some())
            .field("on_before_delete", &self.on_before_delete.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .field("on_before_update", &self.on_before_update.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_select", &self.on_select.is_some())
            .finish()
    }
}

impl<T: Send + 'static> Hooks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate item creation. Resolving to `false` cancels it.
    pub fn on_before_create<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Into<Verdict>,
    {
        self.on_before_create = Some(before_hook(hook));
        self
    }

    pub fn on_create<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_create = Some(after_hook(hook));
        self
    }

    /// Gate item deletion. Resolving to `false` cancels it.
    pub fn on_before_delete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Into<Verdict>,
    {
        self.on_before_delete = Some(before_hook(hook));
        self
    }

    pub fn on_delete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_delete = Some(after_hook(hook));
        self
    }

    /// Gate edits and moves. Also consulted while hovering a drop target.
    pub fn on_before_update<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Into<Verdict>,
    {
        self.on_before_update = Some(before_hook(hook));
        self
    }

    pub fn on_update<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_update = Some(after_hook(hook));
        self
    }

    pub fn on_select<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(T, bool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_select =
            Some(Arc::new(move |item, selected| -> HookFuture<()> {
                Box::pin(hook(item, selected))
            }));
        self
    }

    pub(crate) fn create_pipeline(&self) -> HookPipeline<T> {
        HookPipeline::new(self.on_before_create.clone(), self.on_create.clone())
    }

    pub(crate) fn delete_pipeline(&self) -> HookPipeline<T> {
        HookPipeline::new(self.on_before_delete.clone(), self.on_delete.clone())
    }

    pub(crate) fn update_pipeline(&self) -> HookPipeline<T> {
        HookPipeline::new(self.on_before_update.clone(), self.on_update.clone())
    }
}

/// Wrap a creation factory returning any future of an item.
pub fn create_factory<T, F, Fut>(factory: F) -> CreateFactory<T>
where
    F: Fn(Option<T>, Option<usize>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    Arc::new(move |parent, depth| -> HookFuture<T> {
        Box::pin(factory(parent, depth))
    })
}

fn before_hook<T, F, Fut>(hook: F) -> BeforeHook<T>
where
    F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Into<Verdict>,
{
    Arc::new(move |ctx| -> HookFuture<Verdict> {
        let pending = hook(ctx);
        Box::pin(async move {
            let verdict: Verdict = pending.await.into();
            verdict
        })
    })
}

fn after_hook<T, F, Fut>(hook: F) -> AfterHook<T>
where
    F: Fn(HookContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx| -> HookFuture<()> { Box::pin(hook(ctx)) })
}

/// Result of running a mutation through a [`HookPipeline`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PipelineOutcome<T> {
    /// The mutation ran; carries the item as stored afterwards.
    Applied(T),
    /// The `before` hook vetoed the mutation.
    Vetoed,
    /// The mutation found nothing to act on once the gate opened.
    Missing,
}

/// One before/after hook pair wrapped around a default mutation.
pub(crate) struct HookPipeline<T> {
    before: Option<BeforeHook<T>>,
    after: Option<AfterHook<T>>,
}

impl<T> fmt::Debug for HookPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookPipeline")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

impl<T> HookPipeline<T> {
    pub(crate) fn new(
        before: Option<BeforeHook<T>>,
        after: Option<AfterHook<T>>,
    ) -> Self {
        Self { before, after }
    }
}

impl<T: Clone> HookPipeline<T> {
    /// Await the `before` hook. Returns `false` when the mutation is vetoed.
    pub(crate) async fn gate(&self, ctx: &HookContext<T>) -> bool {
        match &self.before {
            Some(before) => before(ctx.clone()).await == Verdict::Proceed,
            None => true,
        }
    }

    /// Await the `after` hook, if any.
    pub(crate) async fn notify(&self, ctx: HookContext<T>) {
        if let Some(after) = &self.after {
            after(ctx).await;
        }
    }

    /// Run `before` → `mutate` → `after`.
    ///
    /// `mutate` runs synchronously and returns the item as stored after the
    /// mutation, or `None` when its target vanished while the gate was
    /// pending. The `after` hook sees the stored item.
    pub(crate) async fn run<M>(
        &self,
        ctx: HookContext<T>,
        mutate: M,
    ) -> PipelineOutcome<T>
    where
        M: FnOnce(&HookContext<T>) -> Option<T>,
    {
        if !self.gate(&ctx).await {
            return PipelineOutcome::Vetoed;
        }
        let Some(stored) = mutate(&ctx) else {
            return PipelineOutcome::Missing;
        };
        self.notify(HookContext {
            item: stored.clone(),
            ..ctx
        })
        .await;
        PipelineOutcome::Applied(stored)
    }
}
