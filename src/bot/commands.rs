use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Команды бота:")]
pub enum Command {
    #[command(description = "проверить доступ")]
    Start,
    #[command(description = "добавить пользователя: /adduser <user_id>")]
    AddUser(String),
    #[command(description = "список пользователей")]
    ListUsers,
    #[command(description = "этикетки: /labels, затем строки «код магазин наименование»")]
    Labels(String),
}

/// Parse the `/adduser` argument.
pub fn parse_user_id(arg: &str) -> Result<u64, &'static str> {
    let mut parts = arg.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(id), None) => id.parse().map_err(|_| "❌ ID должен быть числом."),
        _ => Err("Использование: /adduser <user_id>"),
    }
}
