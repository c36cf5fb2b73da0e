//! # Handler Registry
//!
//! Handlers are grouped into [`PluginUnit`]s. A unit is built completely
//! (and validated) before it is handed to the dispatcher, which swaps it in
//! as a whole.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::api::Bot;
use crate::core::executor::WorkerPool;
use crate::core::permission::PermissionLevel;
use crate::error::RegistrationError;
use crate::events::Event;

/// `Ok(true)` marks the event as consumed; only generic message handlers
/// act on it.
pub type HandlerResult = anyhow::Result<bool>;

pub type AsyncHandlerFn = dyn Fn(HandlerContext) -> BoxFuture<'static, HandlerResult> + Send + Sync;
pub type BlockingHandlerFn = dyn Fn(HandlerContext) -> HandlerResult + Send + Sync;

/// A parameter a handler asks the dispatcher to supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Bot,
    Event,
    /// Whitespace separated tokens after the command name. Commands only.
    Args,
    /// Outcome of the permission check. Commands only.
    PermissionGranted,
}

impl Param {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::Event => "event",
            Self::Args => "args",
            Self::PermissionGranted => "permission_granted",
        }
    }
}

/// What a handler receives. Only the declared parameters are `Some`.
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    pub bot: Option<Bot>,
    pub event: Option<Arc<Event>>,
    pub args: Option<Vec<String>>,
    pub permission_granted: Option<bool>,
}

impl HandlerContext {
    pub fn bot(&self) -> anyhow::Result<&Bot> {
        self.bot.as_ref().ok_or_else(|| undeclared(Param::Bot))
    }

    pub fn event(&self) -> anyhow::Result<&Event> {
        self.event.as_deref().ok_or_else(|| undeclared(Param::Event))
    }

    pub fn args(&self) -> anyhow::Result<&[String]> {
        self.args.as_deref().ok_or_else(|| undeclared(Param::Args))
    }

    pub fn permission_granted(&self) -> anyhow::Result<bool> {
        self.permission_granted
            .ok_or_else(|| undeclared(Param::PermissionGranted))
    }
}

fn undeclared(param: Param) -> anyhow::Error {
    anyhow!("handler did not declare the {} parameter", param.name())
}

#[derive(Clone)]
pub enum Handler {
    /// Runs cooperatively on the dispatching task.
    Async(Arc<AsyncHandlerFn>),
    /// Runs on the bounded [`WorkerPool`].
    Blocking(Arc<BlockingHandlerFn>),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Async(_) => f.write_str("Handler::Async"),
            Self::Blocking(_) => f.write_str("Handler::Blocking"),
        }
    }
}

impl Handler {
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |ctx| f(ctx).boxed()))
    }

    pub fn from_blocking<F>(f: F) -> Self
    where
        F: Fn(HandlerContext) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    pub(crate) async fn invoke(&self, ctx: HandlerContext, pool: &WorkerPool) -> HandlerResult {
        match self {
            Self::Async(f) => f(ctx).await,
            Self::Blocking(f) => {
                let f = Arc::clone(f);
                pool.run(move || f(ctx)).await?
            }
        }
    }
}

/// One registered handler with its declared parameters.
#[derive(Debug, Clone)]
pub struct HandlerEntry {
    pub plugin: String,
    pub params: Vec<Param>,
    pub handler: Handler,
}

impl HandlerEntry {
    pub fn wants(&self, param: Param) -> bool {
        self.params.contains(&param)
    }

    /// Builds the context holding exactly the declared parameters.
    pub fn context(
        &self,
        bot: &Bot,
        event: &Arc<Event>,
        args: Option<&[String]>,
        permission_granted: Option<bool>,
    ) -> HandlerContext {
        HandlerContext {
            bot: self.wants(Param::Bot).then(|| bot.with_self_id(event.self_id)),
            event: self.wants(Param::Event).then(|| Arc::clone(event)),
            args: args
                .filter(|_| self.wants(Param::Args))
                .map(<[String]>::to_vec),
            permission_granted: permission_granted.filter(|_| self.wants(Param::PermissionGranted)),
        }
    }
}

/// Registration options of a named command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub permission: Option<PermissionLevel>,
    /// Run the handler even when the permission check fails.
    pub override_check: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permission: None,
            override_check: false,
        }
    }

    pub fn permission(mut self, level: PermissionLevel) -> Self {
        self.permission = Some(level);
        self
    }

    pub fn override_check(mut self) -> Self {
        self.override_check = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub spec: CommandSpec,
    pub entry: HandlerEntry,
}

/// A notice or request handler; `subtype: None` matches every subtype.
#[derive(Debug, Clone)]
pub struct FilterEntry {
    pub subtype: Option<String>,
    pub entry: HandlerEntry,
}

impl FilterEntry {
    pub fn matches(&self, subtype: &str) -> bool {
        self.subtype.as_deref().map_or(true, |s| s == subtype)
    }
}

/// Metadata shown by the built-in `help` command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginMeta {
    pub name: String,
    pub description: String,
    pub usage: String,
}

impl PluginMeta {
    pub fn new(name: impl Into<String>, description: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            usage: usage.into(),
        }
    }
}

/// All registrations of one plugin, in registration order.
#[derive(Debug, Default)]
pub struct PluginUnit {
    pub(crate) meta: PluginMeta,
    pub(crate) messages: Vec<HandlerEntry>,
    pub(crate) commands: Vec<CommandEntry>,
    pub(crate) notices: Vec<FilterEntry>,
    pub(crate) requests: Vec<FilterEntry>,
}

fn reject_command_params(kind: &str, params: &[Param]) -> Result<(), RegistrationError> {
    for param in [Param::Args, Param::PermissionGranted] {
        if params.contains(&param) {
            return Err(RegistrationError::UnsupportedParam {
                kind: kind.to_string(),
                param: param.name(),
            });
        }
    }
    Ok(())
}

impl PluginUnit {
    pub fn new(meta: PluginMeta) -> Self {
        Self {
            meta,
            ..Default::default()
        }
    }

    pub fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    fn entry(&self, params: &[Param], handler: Handler) -> HandlerEntry {
        HandlerEntry {
            plugin: self.meta.name.clone(),
            params: params.to_vec(),
            handler,
        }
    }

    /// Generic message listener. Must be asynchronous.
    pub fn on_message(&mut self, params: &[Param], handler: Handler) -> Result<&mut Self, RegistrationError> {
        if !handler.is_async() {
            return Err(RegistrationError::BlockingHandler("message listener".to_string()));
        }
        reject_command_params("message listener", params)?;
        let entry = self.entry(params, handler);
        self.messages.push(entry);
        Ok(self)
    }

    pub fn command(&mut self, spec: CommandSpec, params: &[Param], handler: Handler) -> Result<&mut Self, RegistrationError> {
        if spec.name.is_empty() || spec.name.chars().any(char::is_whitespace) {
            return Err(RegistrationError::InvalidCommandName(spec.name));
        }
        let entry = self.entry(params, handler);
        // Same name twice within a unit: the later one wins.
        self.commands.retain(|c| c.spec.name != spec.name);
        self.commands.push(CommandEntry { spec, entry });
        Ok(self)
    }

    pub fn on_notice(&mut self, subtype: Option<&str>, params: &[Param], handler: Handler) -> Result<&mut Self, RegistrationError> {
        reject_command_params("notice handler", params)?;
        let entry = self.entry(params, handler);
        self.notices.push(FilterEntry {
            subtype: subtype.map(str::to_string),
            entry,
        });
        Ok(self)
    }

    pub fn on_request(&mut self, subtype: Option<&str>, params: &[Param], handler: Handler) -> Result<&mut Self, RegistrationError> {
        reject_command_params("request handler", params)?;
        let entry = self.entry(params, handler);
        self.requests.push(FilterEntry {
            subtype: subtype.map(str::to_string),
            entry,
        });
        Ok(self)
    }
}

/// The dispatcher's tables. Entries are `Arc`ed so a dispatch can snapshot
/// them and release the lock before awaiting any handler.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) plugins: Vec<(String, PluginMeta)>,
    pub(crate) messages: Vec<Arc<HandlerEntry>>,
    pub(crate) commands: HashMap<String, Arc<CommandEntry>>,
    pub(crate) notices: Vec<Arc<FilterEntry>>,
    pub(crate) requests: Vec<Arc<FilterEntry>>,
}

impl Registry {
    /// Drops every registration of `id`. Returns whether it was loaded.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|(p, _)| p != id);
        self.messages.retain(|e| e.plugin != id);
        self.commands.retain(|_, c| c.entry.plugin != id);
        self.notices.retain(|f| f.entry.plugin != id);
        self.requests.retain(|f| f.entry.plugin != id);
        self.plugins.len() != before
    }

    /// Replaces whatever `id` had registered with `unit`.
    pub(crate) fn install(&mut self, id: &str, unit: PluginUnit) -> bool {
        let replaced = self.remove(id);
        let PluginUnit {
            meta,
            messages,
            commands,
            notices,
            requests,
        } = unit;
        let tag = |mut e: HandlerEntry| {
            e.plugin = id.to_string();
            e
        };

        self.plugins.push((id.to_string(), meta));
        self.messages
            .extend(messages.into_iter().map(|e| Arc::new(tag(e))));
        for mut c in commands {
            c.entry = tag(c.entry);
            self.commands.insert(c.spec.name.clone(), Arc::new(c));
        }
        self.notices.extend(notices.into_iter().map(|mut f| {
            f.entry = tag(f.entry);
            Arc::new(f)
        }));
        self.requests.extend(requests.into_iter().map(|mut f| {
            f.entry = tag(f.entry);
            Arc::new(f)
        }));
        replaced
    }
}
