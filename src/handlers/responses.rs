use std::path::Path;

use crate::controls::{ControlField, ControlState};
use crate::state::EditorSession;
use crate::utils::logging::read_recent_log_lines;

pub const HELP_TEXT: &str = "\
Image controller commands

load <path>            Load an image as the new original
set <field> <value>    Change a control (see `options`)
options [field]        List fields, or the choices for one field
show                   Print the current controls as JSON
prompt                 Preview the prompt that generate would send
generate               Send the original image and prompt to the model
save [path]            Save the edited image (default: edited-image.png)
continue               Use the edited image as the new original and reset controls
reset                  Reset all controls to their defaults
status                 Show session state
logs [lines]           Show recent log lines
help                   Show this help
quit                   Leave the session";

fn bool_label(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn build_status_report(session: &EditorSession) -> String {
    let mut report = String::new();

    match session.original() {
        Some(original) => {
            let size = original
                .dimensions()
                .map(|(width, height)| format!(", {width}x{height}"))
                .unwrap_or_default();
            report.push_str(&format!(
                "Original: {} ({} bytes{})\n",
                original.mime_type,
                original.bytes.len(),
                size
            ));
        }
        None => report.push_str("Original: none (use `load <path>`)\n"),
    }

    match session.edited() {
        Some(edited) => report.push_str(&format!("Edited: image/png ({} bytes)\n", edited.len())),
        None => report.push_str("Edited: none\n"),
    }

    let changed: Vec<&str> = session
        .controls()
        .changed_fields()
        .into_iter()
        .map(|field| field.name())
        .collect();
    if changed.is_empty() {
        report.push_str("Changed controls: none\n");
    } else {
        report.push_str(&format!("Changed controls: {}\n", changed.join(", ")));
    }
    report.push_str(&format!(
        "Generate enabled: {}\n",
        bool_label(session.can_generate())
    ));
    if let Some(error) = session.last_error() {
        report.push_str(&format!("Last error: {error}\n"));
    }
    report
}

pub fn build_options_report(field: Option<ControlField>) -> String {
    let Some(field) = field else {
        let mut report = String::from("Fields:\n");
        for field in ControlField::ALL {
            let kind = match field {
                ControlField::CameraRotation => "number 0..360 (degrees)",
                ControlField::Zoom => "number -20..20, step 0.5",
                ControlField::Prompt => "free text",
                ControlField::LockAspectRatio => "on/off",
                _ => "choice",
            };
            report.push_str(&format!("  {:<16} {}\n", field.name(), kind));
        }
        return report;
    };

    match field.option_labels() {
        Some(labels) => {
            let mut report = format!("Choices for {}:\n", field.name());
            for (label, localized) in labels {
                report.push_str(&format!("  {:<22} {}\n", label, localized));
            }
            report
        }
        None => format!("{} takes a value, not a choice. Run `options` for details.\n", field.name()),
    }
}

pub fn build_controls_report(controls: &ControlState) -> String {
    serde_json::to_string_pretty(controls)
        .unwrap_or_else(|err| format!("Could not render controls: {err}"))
}

pub fn build_prompt_report(prompt: &str) -> String {
    if prompt.is_empty() {
        "Generated prompt: (empty, nothing would change)".to_string()
    } else {
        format!("Generated prompt:\n{prompt}")
    }
}

pub fn build_log_report(logs_dir: &Path, max_lines: usize) -> String {
    let mut report = String::new();
    for (base_name, title) in [
        ("editor.log", "Recent editor log lines"),
        ("timing.log", "Recent timing log lines"),
    ] {
        report.push_str(&format!("{title}\n"));
        match read_recent_log_lines(logs_dir, base_name, max_lines) {
            Ok(Some(tail)) => {
                report.push_str(&format!("file: {}\n", tail.path.display()));
                for line in tail.lines {
                    report.push_str(&line);
                    report.push('\n');
                }
            }
            Ok(None) => report.push_str("(no log file yet)\n"),
            Err(err) => report.push_str(&format!("(could not read log: {err})\n")),
        }
        report.push('\n');
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_store::ImageState;

    #[test]
    fn status_of_an_empty_session() {
        let report = build_status_report(&EditorSession::new());
        assert!(report.contains("Original: none"));
        assert!(report.contains("Generate enabled: no"));
        assert!(report.contains("Changed controls: none"));
        assert!(!report.contains("Busy"));
        assert!(!report.contains("Last error"));
    }

    #[test]
    fn status_with_an_original() {
        let mut session = EditorSession::new();
        session.upload(ImageState::new(vec![0; 4], "image/webp"));
        session.set_control(ControlField::Zoom, "2").unwrap();
        let report = build_status_report(&session);
        assert!(report.contains("Original: image/webp (4 bytes)"));
        assert!(report.contains("Generate enabled: yes"));
        assert!(report.contains("Changed controls: zoom"));
    }

    #[test]
    fn options_lists_bilingual_choices() {
        let report = build_options_report(Some(ControlField::BodyPose));
        assert!(report.contains("Hands on Hips"));
        assert!(report.contains("ច្រត់ចង្កេះ (Hands on Hips)"));

        let fields = build_options_report(None);
        for field in ControlField::ALL {
            assert!(fields.contains(field.name()));
        }
        assert!(build_options_report(Some(ControlField::Zoom)).contains("takes a value"));
    }

    #[test]
    fn empty_prompt_preview_says_so() {
        assert!(build_prompt_report("").contains("empty"));
        assert_eq!(build_prompt_report("add a hat."), "Generated prompt:\nadd a hat.");
    }
}
