use crate::controls::{BodyPose, ControlState, FeetGesture, HandGesture, ObjectRotation};

pub const ASPECT_RATIO_CLAUSE: &str = "Preserve the original image's aspect ratio and framing exactly; do not crop, pad, or stretch the canvas.";

fn object_rotation_view(option: ObjectRotation) -> Option<&'static str> {
    match option {
        ObjectRotation::None => None,
        ObjectRotation::FrontView => Some("directly from the front"),
        ObjectRotation::BackView => Some("directly from behind"),
        ObjectRotation::LeftSideView => Some("from its left side"),
        ObjectRotation::RightSideView => Some("from its right side"),
        ObjectRotation::Front45View => Some("from a 45-degree angle in front"),
        ObjectRotation::Back45View => Some("from a 45-degree angle behind"),
        ObjectRotation::LeftSide45View => Some("from a 45-degree angle on its left side"),
        ObjectRotation::RightSide45View => Some("from a 45-degree angle on its right side"),
    }
}

fn hand_gesture_action(option: HandGesture) -> Option<&'static str> {
    match option {
        HandGesture::None => None,
        HandGesture::Waving => Some("waving"),
        HandGesture::Pointing => Some("pointing with one finger"),
        HandGesture::Fist => Some("making a fist"),
        HandGesture::ThumbsUp => Some("giving a thumbs up"),
        HandGesture::PeaceSign => Some("making a peace sign"),
        HandGesture::OpenPalm => Some("showing an open palm"),
        HandGesture::HoldingObject => Some("holding an object"),
        HandGesture::Typing => Some("typing"),
        HandGesture::Clapping => Some("clapping"),
        HandGesture::Relaxed => Some("resting their hands in a relaxed position"),
    }
}

fn feet_gesture_action(option: FeetGesture) -> Option<&'static str> {
    match option {
        FeetGesture::None => None,
        FeetGesture::Standing => Some("standing on both feet"),
        FeetGesture::Walking => Some("walking"),
        FeetGesture::Running => Some("running"),
        FeetGesture::Jumping => Some("jumping"),
        FeetGesture::Tiptoe => Some("standing on tiptoe"),
        FeetGesture::Kicking => Some("kicking"),
        FeetGesture::CrossedLegs => Some("standing with crossed legs"),
        FeetGesture::Relaxed => Some("resting their feet in a relaxed position"),
        FeetGesture::PointingToe => Some("pointing one toe"),
        FeetGesture::OneLegStand => Some("standing on one leg"),
    }
}

fn body_pose_action(option: BodyPose) -> Option<&'static str> {
    match option {
        BodyPose::None => None,
        BodyPose::StandingStraight => Some("standing up straight"),
        BodyPose::Sitting => Some("sitting"),
        BodyPose::LeaningForward => Some("leaning forward"),
        BodyPose::LeaningBack => Some("leaning back"),
        BodyPose::LyingDown => Some("lying down"),
        BodyPose::Squatting => Some("squatting"),
        BodyPose::ArmsCrossed => Some("standing with arms crossed"),
        BodyPose::HandsOnHips => Some("standing with hands on hips"),
        BodyPose::Stretching => Some("stretching"),
        BodyPose::Dancing => Some("dancing"),
    }
}

fn zoom_intensity(magnitude: f64) -> &'static str {
    if magnitude <= 2.0 {
        "slightly"
    } else if magnitude <= 8.0 {
        "moderately"
    } else if magnitude <= 14.0 {
        "significantly"
    } else {
        "dramatically"
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        let text = format!("{value:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn zoom_clause(zoom: f64) -> Option<String> {
    if zoom == 0.0 {
        return None;
    }
    let magnitude = zoom.abs();
    let intensity = zoom_intensity(magnitude);
    let amount = format_number(magnitude);
    Some(if zoom > 0.0 {
        format!("Zoom in {intensity} ({amount}x) so the subject fills more of the frame.")
    } else {
        format!("Zoom out {intensity} ({amount}x) to show more of the surroundings.")
    })
}

fn free_text_clause(prompt: &str) -> Option<String> {
    let trimmed = prompt.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Clauses in fixed order, space-joined; the aspect-ratio clause sits on its own line.
pub fn build_prompt(controls: &ControlState) -> String {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(view) = object_rotation_view(controls.object_rotation) {
        clauses.push(format!("Rotate the main subject so it is seen {view}."));
    }

    if let Some((direction, degrees)) = controls.camera_up_down.elevation() {
        clauses.push(format!(
            "Angle the camera {} by {degrees} degrees.",
            direction.as_str()
        ));
    }

    if controls.camera_rotation != 0.0 {
        clauses.push(format!(
            "Rotate the camera horizontally by {} degrees around the subject.",
            format_number(controls.camera_rotation)
        ));
    }

    if let Some(clause) = zoom_clause(controls.zoom) {
        clauses.push(clause);
    }

    if let Some(action) = hand_gesture_action(controls.hand_gesture) {
        clauses.push(format!("Change the subject's hand gesture so they are {action}."));
    }

    if let Some(action) = feet_gesture_action(controls.feet_gesture) {
        clauses.push(format!("Change the subject's feet and legs so they are {action}."));
    }

    if let Some(action) = body_pose_action(controls.body_pose) {
        clauses.push(format!("Change the subject's overall body pose so they are {action}."));
    }

    if let Some(clause) = free_text_clause(&controls.prompt) {
        clauses.push(clause);
    }

    let mut prompt = clauses.join(" ");
    if controls.lock_aspect_ratio {
        if !prompt.is_empty() {
            prompt.push('\n');
        }
        prompt.push_str(ASPECT_RATIO_CLAUSE);
    }
    prompt
}
