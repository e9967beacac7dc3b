use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CAMERA_ROTATION_MIN: f64 = 0.0;
pub const CAMERA_ROTATION_MAX: f64 = 360.0;
pub const CAMERA_ROTATION_STEP: f64 = 1.0;
pub const ZOOM_MIN: f64 = -20.0;
pub const ZOOM_MAX: f64 = 20.0;
pub const ZOOM_STEP: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("Unknown control field: {0}")]
    UnknownField(String),
    #[error("'{value}' is not a valid option for {field}")]
    UnknownOption { field: &'static str, value: String },
    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Invalid on/off value for {field}: '{value}'")]
    InvalidBool { field: &'static str, value: String },
}

fn option_key(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

macro_rules! option_set {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $first:ident => $first_label:literal, $first_localized:literal;
            $($variant:ident => $label:literal, $localized:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            #[default]
            $first,
            $($variant,)+
        }

        impl $name {
            pub const FIELD: &'static str = $field;
            pub const ALL: &'static [Self] = &[Self::$first, $(Self::$variant,)+];

            pub fn label(self) -> &'static str {
                match self {
                    Self::$first => $first_label,
                    $(Self::$variant => $label,)+
                }
            }

            pub fn localized_label(self) -> &'static str {
                match self {
                    Self::$first => $first_localized,
                    $(Self::$variant => $localized,)+
                }
            }

            pub fn is_none(self) -> bool {
                self == Self::$first
            }

            pub fn parse(value: &str) -> Result<Self, ControlError> {
                let key = option_key(value);
                let sentinel = option_key(Self::$first.label());
                if key == "none" || key == sentinel.trim_end_matches(|c: char| c.is_ascii_digit()) {
                    return Ok(Self::$first);
                }
                Self::ALL
                    .iter()
                    .copied()
                    .find(|option| {
                        option_key(option.label()) == key
                            || option_key(option.localized_label()) == key
                    })
                    .ok_or_else(|| ControlError::UnknownOption {
                        field: Self::FIELD,
                        value: value.to_string(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Self::parse(&value).map_err(de::Error::custom)
            }
        }
    };
}

option_set! {
    ObjectRotation, "object rotation" {
        None => "None", "គ្មាន (None)";
        FrontView => "Front View", "ចំពីខាងមុខ (Front View)";
        BackView => "Back View", "ចំពីខាងក្រោយ (Back View)";
        LeftSideView => "Left Side View", "ចំពីចំហៀងឆ្វេង (Left Side View)";
        RightSideView => "Right Side View", "ចំពីចំហៀងស្ដាំ (Right Side View)";
        Front45View => "Front 45° View", "ចំពីខាងមុខ ៤៥° (Front 45° View)";
        Back45View => "Back 45° View", "ចំពីខាងក្រោយ ៤៥° (Back 45° View)";
        LeftSide45View => "Left Side 45° View", "ចំពីចំហៀងឆ្វេង ៤៥° (Left Side 45° View)";
        RightSide45View => "Right Side 45° View", "ចំពីចំហៀងស្ដាំ ៤៥° (Right Side 45° View)";
    }
}

option_set! {
    CameraVerticalAngle, "camera vertical angle" {
        Level => "Level 0°", "មុំកាមេរ៉ា 0° (Level 0°)";
        Up25 => "Up 25°", "មុំកាមេរ៉ា ឡើងលើ 25° (Up 25°)";
        Up45 => "Up 45°", "មុំកាមេរ៉ា ឡើងលើ 45° (Up 45°)";
        Up75 => "Up 75°", "មុំកាមេរ៉ា ឡើងលើ 75° (Up 75°)";
        Up90 => "Up 90°", "មុំកាមេរ៉ា ឡើងលើ 90° (Up 90°)";
        Down25 => "Down 25°", "មុំកាមេរ៉ា ចុះក្រោម 25° (Down 25°)";
        Down45 => "Down 45°", "មុំកាមេរ៉ា ចុះក្រោម 45° (Down 45°)";
        Down75 => "Down 75°", "មុំកាមេរ៉ា ចុះក្រោម 75° (Down 75°)";
        Down90 => "Down 90°", "មុំកាមេរ៉ា ចុះក្រោម 90° (Down 90°)";
    }
}

option_set! {
    HandGesture, "hand gesture" {
        None => "None", "គ្មាន (None)";
        Waving => "Waving", "គ្រវីដៃ (Waving)";
        Pointing => "Pointing", "ចង្អុល (Pointing)";
        Fist => "Fist", "ក្ដាប់ដៃ (Fist)";
        ThumbsUp => "Thumbs Up", "មេដៃឡើង (Thumbs Up)";
        PeaceSign => "Peace Sign", "សញ្ញាសន្តិភាព (Peace Sign)";
        OpenPalm => "Open Palm", "បាតដៃបើក (Open Palm)";
        HoldingObject => "Holding Object", "កាន់វត្ថុ (Holding Object)";
        Typing => "Typing", "វាយអក្សរ (Typing)";
        Clapping => "Clapping", "ទះដៃ (Clapping)";
        Relaxed => "Relaxed", "សម្រាក (Relaxed)";
    }
}

option_set! {
    FeetGesture, "feet gesture" {
        None => "None", "គ្មាន (None)";
        Standing => "Standing", "ឈរ (Standing)";
        Walking => "Walking", "ដើរ (Walking)";
        Running => "Running", "រត់ (Running)";
        Jumping => "Jumping", "លោត (Jumping)";
        Tiptoe => "Tiptoe", "ឈានចុងជើង (Tiptoe)";
        Kicking => "Kicking", "ទាត់ (Kicking)";
        CrossedLegs => "Crossed Legs", "គងជើង (Crossed Legs)";
        Relaxed => "Relaxed", "សម្រាក (Relaxed)";
        PointingToe => "Pointing Toe", "ចង្អុលចុងជើង (Pointing Toe)";
        OneLegStand => "One Leg Stand", "ឈរជើងម្ខាង (One Leg Stand)";
    }
}

option_set! {
    BodyPose, "body pose" {
        None => "None", "គ្មាន (None)";
        StandingStraight => "Standing Straight", "ឈរត្រង់ (Standing Straight)";
        Sitting => "Sitting", "អង្គុយ (Sitting)";
        LeaningForward => "Leaning Forward", "ឱនទៅមុខ (Leaning Forward)";
        LeaningBack => "Leaning Back", "ផ្អៀងទៅក្រោយ (Leaning Back)";
        LyingDown => "Lying Down", "ដេក (Lying Down)";
        Squatting => "Squatting", "អង្គុយច្រហោង (Squatting)";
        ArmsCrossed => "Arms Crossed", "ក្រពាត់ដៃ (Arms Crossed)";
        HandsOnHips => "Hands on Hips", "ច្រត់ចង្កេះ (Hands on Hips)";
        Stretching => "Stretching", "ពត់ខ្លួន (Stretching)";
        Dancing => "Dancing", "រាំ (Dancing)";
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalDirection {
    Up,
    Down,
}

impl VerticalDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            VerticalDirection::Up => "up",
            VerticalDirection::Down => "down",
        }
    }
}

impl CameraVerticalAngle {
    pub fn elevation(self) -> Option<(VerticalDirection, u16)> {
        use VerticalDirection::{Down, Up};
        match self {
            CameraVerticalAngle::Level => None,
            CameraVerticalAngle::Up25 => Some((Up, 25)),
            CameraVerticalAngle::Up45 => Some((Up, 45)),
            CameraVerticalAngle::Up75 => Some((Up, 75)),
            CameraVerticalAngle::Up90 => Some((Up, 90)),
            CameraVerticalAngle::Down25 => Some((Down, 25)),
            CameraVerticalAngle::Down45 => Some((Down, 45)),
            CameraVerticalAngle::Down75 => Some((Down, 75)),
            CameraVerticalAngle::Down90 => Some((Down, 90)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    ObjectRotation,
    CameraUpDown,
    CameraRotation,
    Zoom,
    HandGesture,
    FeetGesture,
    BodyPose,
    Prompt,
    LockAspectRatio,
}

impl ControlField {
    pub const ALL: [ControlField; 9] = [
        ControlField::ObjectRotation,
        ControlField::CameraUpDown,
        ControlField::CameraRotation,
        ControlField::Zoom,
        ControlField::HandGesture,
        ControlField::FeetGesture,
        ControlField::BodyPose,
        ControlField::Prompt,
        ControlField::LockAspectRatio,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ControlField::ObjectRotation => "object-rotation",
            ControlField::CameraUpDown => "camera-angle",
            ControlField::CameraRotation => "camera-rotation",
            ControlField::Zoom => "zoom",
            ControlField::HandGesture => "hand",
            ControlField::FeetGesture => "feet",
            ControlField::BodyPose => "pose",
            ControlField::Prompt => "prompt",
            ControlField::LockAspectRatio => "lock-aspect",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            ControlField::ObjectRotation => &["objectRotation", "orientation"],
            ControlField::CameraUpDown => &["cameraUpDown", "vertical-angle"],
            ControlField::CameraRotation => &["cameraRotation", "horizontal-rotation"],
            ControlField::Zoom => &[],
            ControlField::HandGesture => &["handGesture"],
            ControlField::FeetGesture => &["feetGesture"],
            ControlField::BodyPose => &["bodyPose"],
            ControlField::Prompt => &["instruction"],
            ControlField::LockAspectRatio => &["lockAspectRatio"],
        }
    }

    pub fn parse(value: &str) -> Result<Self, ControlError> {
        let key = option_key(value);
        Self::ALL
            .iter()
            .copied()
            .find(|field| {
                option_key(field.name()) == key
                    || field.aliases().iter().any(|alias| option_key(alias) == key)
            })
            .ok_or_else(|| ControlError::UnknownField(value.to_string()))
    }

    pub fn option_labels(self) -> Option<Vec<(&'static str, &'static str)>> {
        fn labels<T: Copy>(
            all: &[T],
            label: fn(T) -> &'static str,
            localized: fn(T) -> &'static str,
        ) -> Vec<(&'static str, &'static str)> {
            all.iter().map(|&item| (label(item), localized(item))).collect()
        }

        match self {
            ControlField::ObjectRotation => Some(labels(
                ObjectRotation::ALL,
                ObjectRotation::label,
                ObjectRotation::localized_label,
            )),
            ControlField::CameraUpDown => Some(labels(
                CameraVerticalAngle::ALL,
                CameraVerticalAngle::label,
                CameraVerticalAngle::localized_label,
            )),
            ControlField::HandGesture => Some(labels(
                HandGesture::ALL,
                HandGesture::label,
                HandGesture::localized_label,
            )),
            ControlField::FeetGesture => Some(labels(
                FeetGesture::ALL,
                FeetGesture::label,
                FeetGesture::localized_label,
            )),
            ControlField::BodyPose => Some(labels(
                BodyPose::ALL,
                BodyPose::label,
                BodyPose::localized_label,
            )),
            ControlField::CameraRotation
            | ControlField::Zoom
            | ControlField::Prompt
            | ControlField::LockAspectRatio => None,
        }
    }
}

impl fmt::Display for ControlField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlState {
    pub object_rotation: ObjectRotation,
    pub camera_up_down: CameraVerticalAngle,
    pub camera_rotation: f64,
    pub zoom: f64,
    pub hand_gesture: HandGesture,
    pub feet_gesture: FeetGesture,
    pub body_pose: BodyPose,
    pub prompt: String,
    pub lock_aspect_ratio: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        ControlState {
            object_rotation: ObjectRotation::None,
            camera_up_down: CameraVerticalAngle::Level,
            camera_rotation: 0.0,
            zoom: 0.0,
            hand_gesture: HandGesture::None,
            feet_gesture: FeetGesture::None,
            body_pose: BodyPose::None,
            prompt: String::new(),
            lock_aspect_ratio: true,
        }
    }
}

fn snap_to_step(value: f64, min: f64, max: f64, step: f64) -> f64 {
    let steps = ((value.clamp(min, max) - min) / step).round();
    let snapped = (min + steps * step).clamp(min, max);
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

fn parse_number(field: ControlField, value: &str) -> Result<f64, ControlError> {
    let trimmed = value.trim().trim_end_matches(['°', 'x', 'X']).trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| ControlError::InvalidNumber {
            field: field.name(),
            value: value.to_string(),
        })
}

fn parse_switch(field: ControlField, value: &str) -> Result<bool, ControlError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(ControlError::InvalidBool {
            field: field.name(),
            value: value.to_string(),
        }),
    }
}

impl ControlState {
    pub fn apply(&mut self, field: ControlField, value: &str) -> Result<(), ControlError> {
        match field {
            ControlField::ObjectRotation => self.object_rotation = ObjectRotation::parse(value)?,
            ControlField::CameraUpDown => self.camera_up_down = CameraVerticalAngle::parse(value)?,
            ControlField::CameraRotation => {
                self.camera_rotation = snap_to_step(
                    parse_number(field, value)?,
                    CAMERA_ROTATION_MIN,
                    CAMERA_ROTATION_MAX,
                    CAMERA_ROTATION_STEP,
                );
            }
            ControlField::Zoom => {
                self.zoom = snap_to_step(parse_number(field, value)?, ZOOM_MIN, ZOOM_MAX, ZOOM_STEP);
            }
            ControlField::HandGesture => self.hand_gesture = HandGesture::parse(value)?,
            ControlField::FeetGesture => self.feet_gesture = FeetGesture::parse(value)?,
            ControlField::BodyPose => self.body_pose = BodyPose::parse(value)?,
            ControlField::Prompt => self.prompt = value.to_string(),
            ControlField::LockAspectRatio => self.lock_aspect_ratio = parse_switch(field, value)?,
        }
        Ok(())
    }

    pub fn clamp_ranges(&mut self) {
        self.camera_rotation = if self.camera_rotation.is_finite() {
            snap_to_step(
                self.camera_rotation,
                CAMERA_ROTATION_MIN,
                CAMERA_ROTATION_MAX,
                CAMERA_ROTATION_STEP,
            )
        } else {
            0.0
        };
        self.zoom = if self.zoom.is_finite() {
            snap_to_step(self.zoom, ZOOM_MIN, ZOOM_MAX, ZOOM_STEP)
        } else {
            0.0
        };
    }

    pub fn changed_fields(&self) -> Vec<ControlField> {
        ControlField::ALL
            .into_iter()
            .filter(|field| match field {
                ControlField::ObjectRotation => !self.object_rotation.is_none(),
                ControlField::CameraUpDown => !self.camera_up_down.is_none(),
                ControlField::CameraRotation => self.camera_rotation != 0.0,
                ControlField::Zoom => self.zoom != 0.0,
                ControlField::HandGesture => !self.hand_gesture.is_none(),
                ControlField::FeetGesture => !self.feet_gesture.is_none(),
                ControlField::BodyPose => !self.body_pose.is_none(),
                ControlField::Prompt => !self.prompt.trim().is_empty(),
                ControlField::LockAspectRatio => !self.lock_aspect_ratio,
            })
            .collect()
    }
}
