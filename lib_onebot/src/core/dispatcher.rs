//! # Event Dispatcher
//!
//! Routes a classified [`Event`] to the registered handlers.
//!
//! Message events go through generic listeners first (any of them may consume
//! the event), then prefix matched commands with permission gating. Notice and
//! request events run every handler whose subtype filter matches. Meta events
//! are only logged.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use log::{debug, info, trace};

use crate::api::Bot;
use crate::configs::BotConfig;
use crate::core::executor::WorkerPool;
use crate::core::permission::{PermissionLevel, PermissionResolver};
use crate::core::registry::{
    CommandSpec, FilterEntry, Handler, HandlerEntry, Param, PluginMeta, PluginUnit, Registry,
};
use crate::events::{Event, EventKind, MessageEvent};

pub const HELP_PLUGIN_ID: &str = "core.help";

/// Chat text sent when a caller lacks the level a command requires.
pub fn denial_message(required: PermissionLevel) -> String {
    format!("Permission denied: this command requires {} permission", required.name())
}

pub struct Dispatcher {
    registry: Arc<RwLock<Registry>>,
    resolver: PermissionResolver,
    pool: WorkerPool,
    prefixes: Vec<String>,
    ignore_self_message: bool,
}

/// Splits `raw` into a command name and its arguments using the first prefix
/// that matches. `None` when no prefix matches or nothing follows it.
pub fn parse_command<'a>(raw: &'a str, prefixes: &[String]) -> Option<(&'a str, Vec<&'a str>)> {
    let text = raw.trim();
    let prefix = prefixes.iter().find(|p| text.starts_with(p.as_str()))?;
    let mut tokens = text[prefix.len()..].split_whitespace();
    let name = tokens.next()?;
    Some((name, tokens.collect()))
}

fn log_event(event: &Event) {
    match &event.kind {
        EventKind::Message(m) | EventKind::MessageSent(m) => {
            let (user_id, nickname) = m
                .body()
                .map(|b| (b.user_id, b.sender.nickname.as_str()))
                .unwrap_or((0, ""));
            info!(
                "[{}] {} | {}({}): {}",
                event.post_type().as_str(),
                m.message_type(),
                user_id,
                nickname,
                m.raw_message()
            );
        }
        EventKind::Notice(n) => info!("[notice] {}", n.notice_type()),
        EventKind::Request(r) => info!("[request] {}", r.request_type()),
        EventKind::Meta(m) => debug!("[meta] {}", m.meta_event_type()),
    }
}

impl Dispatcher {
    /// Builds a dispatcher with the built-in `help` command loaded.
    pub fn new(config: &BotConfig, resolver: PermissionResolver) -> Self {
        let dispatcher = Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            resolver,
            pool: WorkerPool::new(config.worker_threads),
            prefixes: config.command_prefixes.clone(),
            ignore_self_message: config.ignore_self_message,
        };
        dispatcher.install_help();
        dispatcher
    }

    fn install_help(&self) {
        let registry: Weak<RwLock<Registry>> = Arc::downgrade(&self.registry);
        let usage = format!("{}help", self.prefixes.first().map(String::as_str).unwrap_or("/"));
        let mut unit = PluginUnit::new(PluginMeta::new(
            "help",
            "Lists every loaded plugin and how to use it",
            usage,
        ));
        let handler = Handler::from_async(move |ctx| {
            let registry = registry.clone();
            async move {
                let Some(registry) = registry.upgrade() else {
                    return Ok(true);
                };
                let text = {
                    let registry = registry.read().unwrap_or_else(PoisonError::into_inner);
                    help_text(registry.plugins.iter().map(|(_, meta)| meta))
                };
                ctx.bot()?.send(ctx.event()?, text).await;
                Ok(true)
            }
        });
        // A fixed name and params cannot fail validation.
        if unit
            .command(CommandSpec::new("help"), &[Param::Bot, Param::Event], handler)
            .is_ok()
        {
            self.write().install(HELP_PLUGIN_ID, unit);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn worker_pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Installs `unit` under `id`, replacing any previous registrations
    /// of the same id. Returns `true` when something was replaced.
    pub fn load_plugin(&self, id: &str, unit: PluginUnit) -> bool {
        let replaced = self.write().install(id, unit);
        info!("Plugin {} {}", id, if replaced { "reloaded" } else { "loaded" });
        replaced
    }

    /// Atomically swaps the registrations of `id` for a freshly built unit.
    pub fn reload_plugin(&self, id: &str, build: impl FnOnce() -> PluginUnit) -> bool {
        self.load_plugin(id, build())
    }

    pub fn unload_plugin(&self, id: &str) -> bool {
        let removed = self.write().remove(id);
        if removed {
            info!("Plugin {} unloaded", id);
        }
        removed
    }

    /// Loaded plugin ids with their metadata, in load order.
    pub fn plugins(&self) -> Vec<(String, PluginMeta)> {
        self.read().plugins.clone()
    }

    /// Routes one event. The first handler error aborts the rest of this
    /// event's processing and is returned.
    pub async fn dispatch(&self, bot: &Bot, event: Arc<Event>) -> anyhow::Result<()> {
        log_event(&event);

        match &event.kind {
            EventKind::Message(msg) | EventKind::MessageSent(msg) => {
                if self.ignore_self_message && msg.user_id() == event.self_id {
                    trace!("Ignoring own message {}", event.self_id);
                    return Ok(());
                }
                self.dispatch_message(bot, &event, msg).await
            }
            EventKind::Notice(notice) => {
                let handlers = self.read().notices.clone();
                self.run_filtered(bot, &event, notice.notice_type(), &handlers)
                    .await
            }
            EventKind::Request(request) => {
                let handlers = self.read().requests.clone();
                self.run_filtered(bot, &event, request.request_type(), &handlers)
                    .await
            }
            EventKind::Meta(_) => Ok(()),
        }
    }

    async fn run(&self, entry: &HandlerEntry, bot: &Bot, event: &Arc<Event>) -> anyhow::Result<bool> {
        let ctx = entry.context(bot, event, None, None);
        entry.handler.invoke(ctx, &self.pool).await
    }

    async fn run_filtered(
        &self,
        bot: &Bot,
        event: &Arc<Event>,
        subtype: &str,
        handlers: &[Arc<FilterEntry>],
    ) -> anyhow::Result<()> {
        for filter in handlers.iter().filter(|f| f.matches(subtype)) {
            self.run(&filter.entry, bot, event).await?;
        }
        Ok(())
    }

    async fn dispatch_message(&self, bot: &Bot, event: &Arc<Event>, msg: &MessageEvent) -> anyhow::Result<()> {
        let listeners = self.read().messages.clone();
        for entry in &listeners {
            if self.run(entry, bot, event).await? {
                trace!("Message consumed by plugin {}", entry.plugin);
                return Ok(());
            }
        }

        let Some((name, args)) = parse_command(msg.raw_message(), &self.prefixes) else {
            return Ok(());
        };
        let command = self.read().commands.get(name).cloned();
        let Some(command) = command else {
            trace!("Unknown command {:?}", name);
            return Ok(());
        };

        let granted = match command.spec.permission {
            Some(required) => {
                let user_id = event.user_id().unwrap_or(0);
                let granted = self.resolver.check(user_id, required).await;
                if !granted && !command.spec.override_check {
                    info!("User {} denied {} (requires {})", user_id, name, required);
                    bot.with_self_id(event.self_id)
                        .send(event, denial_message(required))
                        .await;
                    return Ok(());
                }
                granted
            }
            None => true,
        };

        let args: Vec<String> = args.into_iter().map(str::to_string).collect();
        let ctx = command.entry.context(bot, event, Some(&args), Some(granted));
        debug!("Running command {} from plugin {}", name, command.entry.plugin);
        command.entry.handler.invoke(ctx, &self.pool).await?;
        Ok(())
    }
}

/// Text of the built-in `help` reply.
pub fn help_text<'a>(plugins: impl Iterator<Item = &'a PluginMeta>) -> String {
    let mut text = String::from("--- Available commands ---\n");
    for meta in plugins {
        let name = if meta.name.is_empty() { "unnamed plugin" } else { &meta.name };
        let description = if meta.description.is_empty() { "no description" } else { &meta.description };
        let usage = if meta.usage.is_empty() { "no usage notes" } else { &meta.usage };
        text.push_str(&format!("\n{name}:\n  Description: {description}\n  Usage: {usage}\n"));
    }
    text.trim().to_string()
}
