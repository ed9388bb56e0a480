use super::AppContext;
use crate::browser_ai::{AssistantSession, BrowserDriver};
use crate::config::TimingConfig;
use crate::error::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Quit,
    Help,
    Person,
}

const COMMANDS: &[(&str, MetaCommand, &str)] = &[
    ("-q", MetaCommand::Quit, "Leave the chat."),
    ("--quit", MetaCommand::Quit, "Leave the chat."),
    ("--exit", MetaCommand::Quit, "Leave the chat."),
    ("--help", MetaCommand::Help, "Show available commands."),
    ("-h", MetaCommand::Help, "Show available commands."),
    ("--person", MetaCommand::Person, "Change the current person."),
];

impl MetaCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim().to_lowercase();
        COMMANDS
            .iter()
            .find(|(name, _, _)| *name == line)
            .map(|(_, command, _)| *command)
    }
}

pub async fn run(ctx: &AppContext) -> Result<()> {
    let mut session = ctx.start_session().await?;
    let mut input = BufReader::new(tokio::io::stdin());
    let mut output = std::io::stdout();

    let result = chat(&mut session, &ctx.config.timing, &mut input, &mut output).await;

    if let Err(e) = session.close(ctx.config.browser.purge_profile_on_exit).await {
        tracing::warn!("Failed to close the browser: {}", e);
    }
    result
}

/// Reads prompts from `input` until a quit command or end of input.
pub async fn chat<D, R, W>(
    session: &mut AssistantSession<D>,
    timing: &TimingConfig,
    input: &mut R,
    out: &mut W,
) -> Result<()>
where
    D: BrowserDriver,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if !session.open_main_session(timing.open_timeout_secs).await? {
        writeln!(out, "{} is not available.", session.site().name)?;
        return Ok(());
    }

    writeln!(
        out,
        "Site: {} ({})",
        session.site().name,
        session.site().main_page_url
    )?;
    writeln!(out, "Person: {}", describe_person(session))?;

    loop {
        write!(out, "Prompt: ")?;
        out.flush()?;

        let Some(line) = read_line(input).await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match MetaCommand::parse(&line) {
            Some(MetaCommand::Quit) => {
                writeln!(out, "Leaving the chat.")?;
                break;
            }
            Some(MetaCommand::Help) => show_help(out)?,
            Some(MetaCommand::Person) => change_person(session, input, out).await?,
            None => {
                let reply = session
                    .ask(&line, timing.start_delay_secs, timing.max_polls)
                    .await?;
                writeln!(out, "Reply: {}", reply.as_deref().unwrap_or("null"))?;
            }
        }
    }
    Ok(())
}

fn describe_person<D: BrowserDriver>(session: &AssistantSession<D>) -> String {
    let person = session.person();
    match &person.assistant_tone {
        Some(tone) => format!("{} ({})", person.name, tone),
        None => person.name.clone(),
    }
}

fn show_help<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "Available commands:")?;
    for (name, _, description) in COMMANDS {
        writeln!(out, "  {:<12} {}", name, description)?;
    }
    Ok(())
}

async fn change_person<D, R, W>(
    session: &mut AssistantSession<D>,
    input: &mut R,
    out: &mut W,
) -> Result<()>
where
    D: BrowserDriver,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "Current person: {}", session.person().name)?;
    let names = session.catalog().persons.list_names();
    writeln!(out, "Available persons:")?;
    for (idx, person) in session.catalog().persons.iter().enumerate() {
        let tone = person.assistant_tone.as_deref().unwrap_or("-");
        writeln!(out, "  {}. {} ({})", idx + 1, person.name, tone)?;
    }
    write!(out, "Person number: ")?;
    out.flush()?;

    let choice = read_line(input)
        .await?
        .and_then(|line| line.trim().parse::<usize>().ok())
        .filter(|choice| (1..=names.len()).contains(choice));

    match choice {
        Some(choice) => {
            let name = &names[choice - 1];
            session.switch_personalization(name)?;
            writeln!(out, "Person changed to: {}", name)?;
        }
        None => writeln!(out, "Invalid choice.")?,
    }
    Ok(())
}

async fn read_line<R: AsyncBufRead + Unpin>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser_ai::scripted::{Call, ScriptedDriver};
    use crate::models::Role;
    use crate::profiles::Catalog;
    use crate::secrets::FileSecrets;
    use std::sync::Arc;

    fn session_for(driver: ScriptedDriver) -> AssistantSession<ScriptedDriver> {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let site = catalog.site("CHATAPP").unwrap();
        let person = catalog.person("PY_SENIOR").unwrap();
        AssistantSession::new(
            driver,
            catalog,
            Arc::new(FileSecrets::default()),
            site,
            person,
            false,
        )
    }

    fn ready_driver() -> ScriptedDriver {
        let site = Catalog::builtin().unwrap().site("CHATAPP").unwrap();
        let mut driver = ScriptedDriver::new();
        driver.always(site.locator(Role::TextInput).unwrap(), "");
        driver.always(site.locator(Role::ReplyMessage).unwrap(), "pong");
        driver
    }

    async fn transcript(session: &mut AssistantSession<ScriptedDriver>, input: &str) -> String {
        let mut out = Vec::new();
        let mut input = input.as_bytes();
        chat(session, &TimingConfig::default(), &mut input, &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_meta_command_parsing() {
        assert_eq!(MetaCommand::parse("-q"), Some(MetaCommand::Quit));
        assert_eq!(MetaCommand::parse("  --EXIT "), Some(MetaCommand::Quit));
        assert_eq!(MetaCommand::parse("-h"), Some(MetaCommand::Help));
        assert_eq!(MetaCommand::parse("--person"), Some(MetaCommand::Person));
        assert_eq!(MetaCommand::parse("ping"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_replies_until_quit() {
        let mut session = session_for(ready_driver());
        let output = transcript(&mut session, "ping\n\n--help\n-q\nnever sent\n").await;

        assert!(output.contains("Site: CHATAPP"));
        assert!(output.contains("Reply: pong"));
        assert!(output.contains("--person"));
        assert!(output.contains("Leaving the chat."));
        assert_eq!(
            session
                .driver()
                .count(|c| matches!(c, Call::Type(_, t) if t == "never sent")),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_changes_person() {
        let mut session = session_for(ready_driver());
        let output = transcript(&mut session, "--person\n2\n--person\n99\n").await;

        assert_eq!(session.person().name, "DUMB");
        assert!(output.contains("Person changed to: DUMB"));
        assert!(output.contains("Invalid choice."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_ends_on_end_of_input() {
        let mut session = session_for(ready_driver());
        let output = transcript(&mut session, "ping").await;
        assert!(output.contains("Reply: pong"));
        assert_eq!(
            session.driver().count(|c| matches!(c, Call::Type(_, t) if t == "ping")),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reply_prints_null() {
        let site = Catalog::builtin().unwrap().site("CHATAPP").unwrap();
        let mut driver = ScriptedDriver::new();
        driver.always(site.locator(Role::TextInput).unwrap(), "");
        let mut session = session_for(driver);

        let output = transcript(&mut session, "ping
-q
").await;
        assert!(output.contains("Reply: null"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_reports_unavailable_site() {
        let mut session = session_for(ScriptedDriver::new());
        let output = transcript(&mut session, "ping\n").await;
        assert!(output.contains("CHATAPP is not available."));
    }
}
