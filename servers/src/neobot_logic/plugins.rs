//! Built-in chat commands loaded at startup.

use lib_onebot::error::RegistrationError;
use lib_onebot::{
    CommandSpec, Dispatcher, Handler, HandlerContext, HandlerResult, Param, PermissionLevel,
    PermissionResolver, PluginMeta, PluginUnit,
};

pub const ECHO_PLUGIN: &str = "echo";
pub const ADMIN_PLUGIN: &str = "admin";

const ECHO_USAGE: &str = "/echo [text] - repeat the text\n/like - the bot likes your profile 10 times";
const ADMIN_USAGE: &str =
    "/admin list - list all admins\n/admin add <id> - add an admin\n/admin remove <id> - remove an admin";

/// Loads every built-in plugin into the dispatcher.
pub fn load_all(dispatcher: &Dispatcher) -> Result<(), RegistrationError> {
    dispatcher.load_plugin(ECHO_PLUGIN, echo_plugin()?);
    dispatcher.load_plugin(ADMIN_PLUGIN, admin_plugin(dispatcher.resolver().clone())?);
    Ok(())
}

pub fn echo_plugin() -> Result<PluginUnit, RegistrationError> {
    let mut unit = PluginUnit::new(PluginMeta::new("echo", "Echo and like commands", ECHO_USAGE));
    unit.command(
        CommandSpec::new("echo"),
        &[Param::Bot, Param::Event, Param::Args],
        Handler::from_async(handle_echo),
    )?
    .command(
        CommandSpec::new("like")
            .permission(PermissionLevel::Admin)
            .override_check(),
        &[Param::Bot, Param::Event, Param::PermissionGranted],
        Handler::from_async(handle_like),
    )?;
    Ok(unit)
}

async fn handle_echo(ctx: HandlerContext) -> HandlerResult {
    let args = ctx.args()?;
    let reply = if args.is_empty() {
        "Type something after the command, e.g. /echo hello".to_string()
    } else {
        args.join(" ")
    };
    ctx.bot()?.send(ctx.event()?, reply).await;
    Ok(true)
}

async fn handle_like(ctx: HandlerContext) -> HandlerResult {
    let (bot, event) = (ctx.bot()?, ctx.event()?);
    if !ctx.permission_granted()? {
        bot.send(event, "Only my operators can ask me for likes!").await;
        return Ok(true);
    }
    let Some(user_id) = event.user_id() else {
        return Ok(true);
    };

    let res = bot.send_like(user_id, 10).await;
    if res["status"] == "failed" {
        let msg = res["msg"].as_str().unwrap_or("unknown error");
        bot.send(event, format!("Like failed: {msg}")).await;
    } else {
        bot.send(event, "Sent you 10 likes!").await;
    }
    Ok(true)
}

pub fn admin_plugin(resolver: PermissionResolver) -> Result<PluginUnit, RegistrationError> {
    let mut unit = PluginUnit::new(PluginMeta::new("admin", "Manage the bot's global admins", ADMIN_USAGE));
    unit.command(
        CommandSpec::new("admin").permission(PermissionLevel::Admin),
        &[Param::Bot, Param::Event, Param::Args],
        Handler::from_async(move |ctx| handle_admin(resolver.clone(), ctx)),
    )?;
    Ok(unit)
}

async fn handle_admin(resolver: PermissionResolver, ctx: HandlerContext) -> HandlerResult {
    let (bot, event, args) = (ctx.bot()?, ctx.event()?, ctx.args()?);
    let Some(action) = args.first().map(|a| a.to_lowercase()) else {
        bot.send(event, ADMIN_USAGE).await;
        return Ok(true);
    };

    let reply = match action.as_str() {
        "list" => {
            let admins = resolver.admins().await;
            if admins.is_empty() {
                "No admins are configured.".to_string()
            } else {
                let list: Vec<String> = admins.iter().map(i64::to_string).collect();
                format!("Admins ({}):\n{}", admins.len(), list.join("\n"))
            }
        }
        "add" | "remove" => match args.get(1).and_then(|id| id.parse::<i64>().ok()) {
            None => format!("Please give a numeric account id.\nExample: /admin {action} 123456"),
            Some(user_id) if action == "add" => {
                if resolver.grant_admin(user_id).await? {
                    format!("Added admin: {user_id}")
                } else {
                    format!("{user_id} is already an admin.")
                }
            }
            Some(user_id) => {
                if resolver.revoke_admin(user_id).await? {
                    format!("Removed admin: {user_id}")
                } else {
                    format!("{user_id} is not an admin.")
                }
            }
        },
        other => format!("Unknown action: {other}\n\n{ADMIN_USAGE}"),
    };
    bot.send(event, reply).await;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_onebot::connections::{AdminManager, JsonLevelStore};
    use lib_onebot::{classify, Bot, BotApi, BotConfig};
    use serde_json::{Value, json};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl BotApi for Outbox {
        fn call<'a>(&'a self, action: &'a str, params: Value) -> Pin<Box<dyn Future<Output = Value> + Send + 'a>> {
            self.sent.lock().unwrap().push((action.to_string(), params));
            Box::pin(async { json!({"status": "ok", "retcode": 0}) })
        }
    }

    impl Outbox {
        fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(_, p)| p["message"].as_str().map(str::to_string))
                .collect()
        }
    }

    fn setup(dir: &tempfile::TempDir) -> (Arc<Outbox>, Bot, Dispatcher, Arc<AdminManager>) {
        let admins = Arc::new(AdminManager::load(dir.path().join("admin.json")).unwrap());
        let levels = Arc::new(JsonLevelStore::load(dir.path().join("permissions.json")).unwrap());
        let dispatcher = Dispatcher::new(&BotConfig::default(), PermissionResolver::new(admins.clone(), levels));
        load_all(&dispatcher).unwrap();
        let outbox = Arc::new(Outbox::default());
        let bot = Bot::new(outbox.clone());
        (outbox, bot, dispatcher, admins)
    }

    fn msg(user_id: i64, text: &str) -> Arc<lib_onebot::Event> {
        Arc::new(
            classify(&json!({
                "post_type": "message", "message_type": "group", "group_id": 500,
                "self_id": 1, "user_id": user_id, "raw_message": text
            }))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_echo_repeats_args() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, bot, dispatcher, _) = setup(&dir);
        dispatcher.dispatch(&bot, msg(7, "/echo hello  world")).await.unwrap();
        dispatcher.dispatch(&bot, msg(7, "/echo")).await.unwrap();
        let texts = outbox.texts();
        assert_eq!(texts[0], "hello world");
        assert!(texts[1].starts_with("Type something"));
        assert_eq!(outbox.sent.lock().unwrap()[0].1["group_id"], 500);
    }

    #[tokio::test]
    async fn test_like_custom_denial_and_success() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, bot, dispatcher, admins) = setup(&dir);
        dispatcher.dispatch(&bot, msg(7, "/like")).await.unwrap();
        assert_eq!(outbox.texts(), vec!["Only my operators can ask me for likes!".to_string()]);

        use lib_onebot::core::AdminStore;
        admins.add_admin(7).await.unwrap();
        dispatcher.dispatch(&bot, msg(7, "/like")).await.unwrap();
        let sent = outbox.sent.lock().unwrap().clone();
        assert_eq!(sent[1].0, "send_like");
        assert_eq!(sent[1].1, json!({"user_id": 7, "times": 10}));
        assert_eq!(sent[2].1["message"], "Sent you 10 likes!");
    }

    #[tokio::test]
    async fn test_admin_add_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, bot, dispatcher, admins) = setup(&dir);

        // Not an admin yet: standard denial naming the level.
        dispatcher.dispatch(&bot, msg(9, "/admin list")).await.unwrap();
        assert!(outbox.texts()[0].contains("admin"));

        use lib_onebot::core::AdminStore;
        admins.add_admin(9).await.unwrap();
        dispatcher.dispatch(&bot, msg(9, "/admin add 123456")).await.unwrap();
        dispatcher.dispatch(&bot, msg(9, "/admin add 123456")).await.unwrap();
        dispatcher.dispatch(&bot, msg(9, "/admin list")).await.unwrap();
        dispatcher.dispatch(&bot, msg(9, "/admin remove abc")).await.unwrap();
        dispatcher.dispatch(&bot, msg(9, "/admin remove 123456")).await.unwrap();
        dispatcher.dispatch(&bot, msg(9, "/admin frobnicate")).await.unwrap();

        let texts = outbox.texts();
        assert_eq!(texts[1], "Added admin: 123456");
        assert_eq!(texts[2], "123456 is already an admin.");
        assert_eq!(texts[3], "Admins (2):\n9\n123456");
        assert!(texts[4].starts_with("Please give a numeric account id."));
        assert_eq!(texts[5], "Removed admin: 123456");
        assert!(texts[6].starts_with("Unknown action: frobnicate"));
    }
}
