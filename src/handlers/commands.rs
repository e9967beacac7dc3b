use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::controls::ControlField;
use crate::handlers::responses::{
    build_controls_report, build_log_report, build_options_report, build_prompt_report,
    build_status_report, HELP_TEXT,
};
use crate::image_store::load_from_path;
use crate::llm::ImageEditor;
use crate::state::EditorSession;
use crate::utils::timing::{complete_action_timer, start_action_timer};

const DEFAULT_LOG_TAIL_LINES: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Load(PathBuf),
    Set { field: ControlField, value: String },
    Options(Option<ControlField>),
    Show,
    Prompt,
    Generate,
    Save(Option<PathBuf>),
    Continue,
    Reset,
    Status,
    Logs(usize),
    Help,
    Quit,
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Load(_) => "load",
            SessionCommand::Set { .. } => "set",
            SessionCommand::Options(_) => "options",
            SessionCommand::Show => "show",
            SessionCommand::Prompt => "prompt",
            SessionCommand::Generate => "generate",
            SessionCommand::Save(_) => "save",
            SessionCommand::Continue => "continue",
            SessionCommand::Reset => "reset",
            SessionCommand::Status => "status",
            SessionCommand::Logs(_) => "logs",
            SessionCommand::Help => "help",
            SessionCommand::Quit => "quit",
        }
    }

    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let optional_rest = if rest.is_empty() { None } else { Some(rest) };

        let command = match verb.to_ascii_lowercase().as_str() {
            "load" | "upload" | "open" => {
                let path = optional_rest.ok_or_else(|| anyhow!("Usage: load <path>"))?;
                SessionCommand::Load(PathBuf::from(path))
            }
            "set" => {
                let (field, value) = match rest.split_once(char::is_whitespace) {
                    Some((field, value)) => (field, value.trim()),
                    None if !rest.is_empty() => (rest, ""),
                    None => return Err(anyhow!("Usage: set <field> <value>")),
                };
                let field = ControlField::parse(field)?;
                if value.is_empty() && field != ControlField::Prompt {
                    return Err(anyhow!("Usage: set {} <value>", field.name()));
                }
                SessionCommand::Set {
                    field,
                    value: value.to_string(),
                }
            }
            "options" => SessionCommand::Options(optional_rest.map(ControlField::parse).transpose()?),
            "show" | "controls" => SessionCommand::Show,
            "prompt" | "preview" => SessionCommand::Prompt,
            "generate" | "apply" => SessionCommand::Generate,
            "save" => SessionCommand::Save(optional_rest.map(PathBuf::from)),
            "continue" => SessionCommand::Continue,
            "reset" => SessionCommand::Reset,
            "status" => SessionCommand::Status,
            "logs" => {
                let lines = match optional_rest {
                    Some(value) => value
                        .parse::<usize>()
                        .map_err(|_| anyhow!("Invalid line count: {value}"))?,
                    None => DEFAULT_LOG_TAIL_LINES,
                };
                SessionCommand::Logs(lines)
            }
            "help" | "?" => SessionCommand::Help,
            "quit" | "exit" => SessionCommand::Quit,
            other => return Err(anyhow!("Unknown command: {other}. Type `help` for a list.")),
        };
        Ok(Some(command))
    }

    fn argument(&self) -> Option<String> {
        match self {
            SessionCommand::Load(path) => Some(path.display().to_string()),
            SessionCommand::Set { field, value } => Some(format!("{field}={value}")),
            SessionCommand::Options(field) => field.map(|field| field.name().to_string()),
            SessionCommand::Save(path) => path.as_ref().map(|path| path.display().to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub save_path: PathBuf,
    pub logs_dir: PathBuf,
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    if !text.ends_with('\n') {
        output.write_all(b"\n").await?;
    }
    output.flush().await?;
    Ok(())
}

async fn load_image(session: &mut EditorSession, path: &Path) -> Result<String> {
    let image = load_from_path(path).await?;
    let summary = format!(
        "Loaded {} ({}, {} bytes).",
        path.display(),
        image.mime_type,
        image.bytes.len()
    );
    session.upload(image);
    Ok(summary)
}

pub async fn execute<E, W>(
    session: &mut EditorSession,
    editor: &E,
    settings: &SessionSettings,
    command: SessionCommand,
    output: &mut W,
) -> Result<bool>
where
    E: ImageEditor,
    W: AsyncWrite + Unpin,
{
    let argument = command.argument();
    let mut timer = start_action_timer(command.name(), argument.as_deref());

    let outcome: Result<String> = match command {
        SessionCommand::Load(path) => load_image(session, &path).await,
        SessionCommand::Set { field, value } => session
            .set_control(field, &value)
            .map(|_| format!("{} updated.", field.name()))
            .map_err(Into::into),
        SessionCommand::Options(field) => Ok(build_options_report(field)),
        SessionCommand::Show => Ok(build_controls_report(session.controls())),
        SessionCommand::Prompt => Ok(build_prompt_report(&session.preview_prompt())),
        SessionCommand::Generate => {
            if session.original().is_some() {
                write_line(output, "Generating... (waiting for the model)").await?;
            }
            match session.generate(editor).await {
                Ok(edited) => Ok(format!(
                    "Edited image ready ({} bytes). Use `save` or `continue`.",
                    edited.len()
                )),
                Err(err) => Err(anyhow!(err)),
            }
        }
        SessionCommand::Save(path) => {
            let path = path.unwrap_or_else(|| settings.save_path.clone());
            session
                .save_edited(&path)
                .await
                .map(|_| format!("Saved edited image to {}.", path.display()))
        }
        SessionCommand::Continue => {
            if session.continue_with_result() {
                Ok("The edited image is now the original. Controls were reset.".to_string())
            } else {
                Err(anyhow!("There is no edited image to continue with."))
            }
        }
        SessionCommand::Reset => {
            session.reset_controls();
            Ok("Controls reset to defaults.".to_string())
        }
        SessionCommand::Status => Ok(build_status_report(session)),
        SessionCommand::Logs(lines) => Ok(build_log_report(&settings.logs_dir, lines)),
        SessionCommand::Help => Ok(HELP_TEXT.to_string()),
        SessionCommand::Quit => {
            complete_action_timer(&mut timer, "success", None);
            return Ok(false);
        }
    };

    match outcome {
        Ok(text) => {
            complete_action_timer(&mut timer, "success", None);
            write_line(output, &text).await?;
        }
        Err(err) => {
            complete_action_timer(&mut timer, "error", Some(err.to_string()));
            write_line(output, &format!("Error: {err}")).await?;
        }
    }
    Ok(true)
}

pub async fn run_session<E, R, W>(
    session: &mut EditorSession,
    editor: &E,
    settings: &SessionSettings,
    input: R,
    output: &mut W,
) -> Result<()>
where
    E: ImageEditor,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Interactive session started");
    write_line(output, "Image controller session. Type `help` for commands.").await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match SessionCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                write_line(output, &format!("Error: {err}")).await?;
                continue;
            }
        };
        match execute(session, editor, settings, command, output).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                error!("Session output failed: {err}");
                return Err(err);
            }
        }
    }

    info!("Interactive session ended");
    Ok(())
}
