use std::error::Error;
use std::path::PathBuf;

use anyhow::anyhow;
use dotenvy::dotenv;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{error, info};

mod config;
mod controls;
mod handlers;
mod image_store;
mod llm;
mod prompt;
mod state;
mod utils;

use config::CONFIG;
use controls::{ControlField, ControlState};
use handlers::commands::{run_session, SessionSettings};
use image_store::load_from_path;
use llm::GeminiImageEditor;
use state::EditorSession;
use utils::logging::init_logging;

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

fn usage() -> &'static str {
    "Usage:
  image_controller preview [control flags]
  image_controller edit --image <path> [--output <path>] [control flags]
  image_controller session [--image <path>] [control flags]

Control flags:
  --controls <file.json>    Start from a saved controls file
  --object-rotation <view>  --camera-angle <angle>  --camera-rotation <deg>
  --zoom <n>  --hand <gesture>  --feet <gesture>  --pose <pose>
  --prompt <text>  --lock-aspect  --no-lock-aspect"
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ControlArgs {
    controls_file: Option<PathBuf>,
    overrides: Vec<(ControlField, String)>,
}

impl ControlArgs {
    async fn resolve(&self) -> anyhow::Result<ControlState> {
        let mut controls = match &self.controls_file {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|err| anyhow!("Could not read {}: {err}", path.display()))?;
                let mut controls: ControlState = serde_json::from_str(&raw)
                    .map_err(|err| anyhow!("Invalid controls file {}: {err}", path.display()))?;
                controls.clamp_ranges();
                controls
            }
            None => ControlState::default(),
        };
        for (field, value) in &self.overrides {
            controls.apply(*field, value)?;
        }
        Ok(controls)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CliCommand {
    Preview {
        controls: ControlArgs,
    },
    Edit {
        image: PathBuf,
        output: PathBuf,
        controls: ControlArgs,
    },
    Session {
        image: Option<PathBuf>,
        controls: ControlArgs,
    },
}

fn control_flag(flag: &str) -> Option<ControlField> {
    match flag {
        "--object-rotation" => Some(ControlField::ObjectRotation),
        "--camera-angle" => Some(ControlField::CameraUpDown),
        "--camera-rotation" => Some(ControlField::CameraRotation),
        "--zoom" => Some(ControlField::Zoom),
        "--hand" => Some(ControlField::HandGesture),
        "--feet" => Some(ControlField::FeetGesture),
        "--pose" => Some(ControlField::BodyPose),
        "--prompt" => Some(ControlField::Prompt),
        _ => None,
    }
}

fn parse_cli_args(args: &[String]) -> anyhow::Result<CliCommand> {
    let (subcommand, mut index) = match args.get(1).map(|value| value.as_str()) {
        Some("preview") | Some("edit") | Some("session") => (args[1].as_str(), 2),
        Some("--help") | Some("-h") | Some("help") => return Err(anyhow!(usage())),
        _ => ("session", 1),
    };

    let mut image: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut controls = ControlArgs::default();

    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "--image" | "--output" | "--controls" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for {flag}"))?;
                let path = PathBuf::from(value);
                match flag {
                    "--image" => image = Some(path),
                    "--output" => output = Some(path),
                    _ => controls.controls_file = Some(path),
                }
            }
            "--lock-aspect" => controls
                .overrides
                .push((ControlField::LockAspectRatio, "on".to_string())),
            "--no-lock-aspect" => controls
                .overrides
                .push((ControlField::LockAspectRatio, "off".to_string())),
            "--help" | "-h" => return Err(anyhow!(usage())),
            other => {
                let Some(field) = control_flag(other) else {
                    return Err(anyhow!("Unknown argument: {other}\n{}", usage()));
                };
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for {other}"))?;
                ControlState::default().apply(field, value)?;
                controls.overrides.push((field, value.clone()));
            }
        }
        index += 1;
    }

    match subcommand {
        "preview" => {
            if image.is_some() || output.is_some() {
                return Err(anyhow!("preview does not take --image or --output"));
            }
            Ok(CliCommand::Preview { controls })
        }
        "edit" => Ok(CliCommand::Edit {
            image: image.ok_or_else(|| anyhow!("--image is required for edit"))?,
            output: output.unwrap_or_else(|| CONFIG.edited_image_path.clone()),
            controls,
        }),
        _ => {
            if output.is_some() {
                return Err(anyhow!("session saves with the `save` command, not --output"));
            }
            Ok(CliCommand::Session { image, controls })
        }
    }
}

async fn run_edit(image: PathBuf, output: PathBuf, controls: ControlArgs) -> anyhow::Result<()> {
    let mut session = EditorSession::new();
    session.replace_controls(controls.resolve().await?);
    session.upload(load_from_path(&image).await?);

    let editor = GeminiImageEditor::from_config(&CONFIG);
    info!(
        "Editing {} with model {} -> {}",
        image.display(),
        editor.model(),
        output.display()
    );
    let prompt = session.preview_prompt();
    eprintln!("Prompt: {prompt}");

    if let Err(err) = session.generate(&editor).await {
        error!("Edit failed: {err}");
        return Err(err.into());
    }
    session.save_edited(&output).await?;
    println!("{}", output.display());
    Ok(())
}

async fn run_interactive(image: Option<PathBuf>, controls: ControlArgs) -> anyhow::Result<()> {
    let mut session = EditorSession::new();
    session.replace_controls(controls.resolve().await?);
    if let Some(path) = image {
        session.upload(load_from_path(&path).await?);
    }

    let editor = GeminiImageEditor::from_config(&CONFIG);
    let settings = SessionSettings {
        save_path: CONFIG.edited_image_path.clone(),
        logs_dir: CONFIG.log_dir.clone(),
    };
    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    run_session(&mut session, &editor, &settings, input, &mut output).await?;
    output.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let _guards = init_logging(&CONFIG);

    let args: Vec<String> = std::env::args().collect();
    let command = parse_cli_args(&args)?;
    info!("Starting image controller");

    match command {
        CliCommand::Preview { controls } => {
            let controls = controls.resolve().await?;
            println!("{}", prompt::build_prompt(&controls));
        }
        CliCommand::Edit {
            image,
            output,
            controls,
        } => run_edit(image, output, controls).await?,
        CliCommand::Session { image, controls } => run_interactive(image, controls).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("image_controller")
            .chain(values.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn defaults_to_an_interactive_session() {
        assert_eq!(
            parse_cli_args(&args(&[])).unwrap(),
            CliCommand::Session {
                image: None,
                controls: ControlArgs::default()
            }
        );
        assert_eq!(
            parse_cli_args(&args(&["--image", "cat.jpg"])).unwrap(),
            CliCommand::Session {
                image: Some(PathBuf::from("cat.jpg")),
                controls: ControlArgs::default()
            }
        );
    }

    #[test]
    fn parses_edit_with_control_flags() {
        let command = parse_cli_args(&args(&[
            "edit",
            "--image",
            "in.png",
            "--output",
            "out.png",
            "--zoom",
            "4",
            "--hand",
            "thumbs up",
            "--no-lock-aspect",
        ]))
        .unwrap();
        let CliCommand::Edit {
            image,
            output,
            controls,
        } = command
        else {
            panic!("expected edit");
        };
        assert_eq!(image, PathBuf::from("in.png"));
        assert_eq!(output, PathBuf::from("out.png"));
        assert_eq!(
            controls.overrides,
            vec![
                (ControlField::Zoom, "4".to_string()),
                (ControlField::HandGesture, "thumbs up".to_string()),
                (ControlField::LockAspectRatio, "off".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_cli_args(&args(&["edit"])).is_err());
        assert!(parse_cli_args(&args(&["preview", "--zoom"])).is_err());
        assert!(parse_cli_args(&args(&["preview", "--zoom", "far"])).is_err());
        assert!(parse_cli_args(&args(&["preview", "--pose", "flying"])).is_err());
        assert!(parse_cli_args(&args(&["preview", "--image", "a.png"])).is_err());
        assert!(parse_cli_args(&args(&["session", "--output", "a.png"])).is_err());
        assert!(parse_cli_args(&args(&["--brightness", "3"])).is_err());
    }

    #[tokio::test]
    async fn flags_apply_over_the_controls_file() {
        let path = image_store::test_support::scratch_path("controls.json");
        tokio::fs::write(&path, r#"{"zoom": 30, "bodyPose": "Sitting", "prompt": "add a hat"}"#)
            .await
            .unwrap();

        let command = parse_cli_args(&args(&[
            "preview",
            "--controls",
            path.to_str().unwrap(),
            "--prompt",
            "add a scarf",
        ]))
        .unwrap();
        let CliCommand::Preview { controls } = command else {
            panic!("expected preview");
        };
        let resolved = controls.resolve().await.unwrap();
        assert_eq!(resolved.zoom, 20.0);
        assert_eq!(resolved.body_pose, crate::controls::BodyPose::Sitting);
        assert_eq!(resolved.prompt, "add a scarf");
        assert!(resolved.lock_aspect_ratio);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
