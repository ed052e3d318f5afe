//! Field rules for incoming payloads, plus the upload checks for social posts.

use crate::error::{AppError, ValidationErrors};
use regex::Regex;
use std::sync::OnceLock;

pub const SOCIAL_MEDIA_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "jpg", "jpeg", "png"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];
pub const SONG_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg"];
pub const MAX_VIDEO_SECONDS: f64 = 60.0;
pub const PASSWORD_MIN: usize = 8;

static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static USERNAME: OnceLock<Option<Regex>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

fn username_regex() -> Option<&'static Regex> {
    USERNAME
        .get_or_init(|| Regex::new(r"^[\w.@+-]+$").ok())
        .as_ref()
}

/// Collects every failing rule before reporting, so clients see all field errors at once.
#[derive(Debug, Default)]
pub struct RequestValidator {
    errors: ValidationErrors,
}

impl RequestValidator {
    pub fn new() -> Self {
        RequestValidator::default()
    }

    pub fn required<T>(&mut self, field: &str, value: Option<T>) -> &mut Self {
        if value.is_none() {
            self.errors.add(field, "This field is required.");
        }
        self
    }

    pub fn max_length(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.errors
                    .add(field, format!("Ensure this field has no more than {} characters.", max));
            }
        }
        self
    }

    pub fn min_length(&mut self, field: &str, value: Option<&str>, min: usize) -> &mut Self {
        if let Some(v) = value {
            if v.chars().count() < min {
                self.errors
                    .add(field, format!("Ensure this field has at least {} characters.", min));
            }
        }
        self
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            if !email_regex().map_or(v.contains('@'), |re| re.is_match(v)) {
                self.errors.add(field, "Enter a valid email address.");
            }
        }
        self
    }

    pub fn username(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            if !username_regex().map_or(true, |re| re.is_match(v)) {
                self.errors.add(
                    field,
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }
        self
    }

    pub fn allowed(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) -> &mut Self {
        if let Some(v) = value {
            if !allowed.contains(&v) {
                self.errors
                    .add(field, format!("\"{}\" is not a valid choice ({}).", v, allowed.join(", ")));
            }
        }
        self
    }

    pub fn range(&mut self, field: &str, value: Option<i64>, min: i64, max: i64) -> &mut Self {
        if let Some(v) = value {
            if v < min || v > max {
                self.errors
                    .add(field, format!("Ensure this value is between {} and {}.", min, max));
            }
        }
        self
    }

    pub fn minimum(&mut self, field: &str, value: Option<i64>, min: i64) -> &mut Self {
        if let Some(v) = value {
            if v < min {
                self.errors
                    .add(field, format!("Ensure this value is greater than or equal to {}.", min));
            }
        }
        self
    }

    /// Records an arbitrary failure found by the caller.
    pub fn fail(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.add(field, message);
        self
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        std::mem::take(&mut self.errors).into_result()
    }
}

/// Accepts plain seconds (`"90"`, `"12.5"`) or clock form (`"MM:SS"`, `"HH:MM:SS"`).
pub fn parse_duration(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    let invalid = || format!("\"{}\" is not a valid duration", raw);
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid());
    }
    let mut seconds = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let last = i + 1 == parts.len();
        let value: f64 = if last {
            part.trim().parse().map_err(|_| invalid())?
        } else {
            part.trim().parse::<u32>().map(f64::from).map_err(|_| invalid())?
        };
        if value < 0.0 || !value.is_finite() || (parts.len() > 1 && i > 0 && value >= 60.0) {
            return Err(invalid());
        }
        seconds = seconds * 60.0 + value;
    }
    Ok(seconds)
}

/// Media rules for a new social post.
pub struct SocialUpload<'a> {
    pub content_type: &'a str,
    pub media_extension: Option<&'a str>,
    pub duration_seconds: Option<f64>,
    /// Extension of the accompanying song's audio file, when a song is attached.
    pub song_extension: Option<Option<&'a str>>,
}

pub fn validate_social_upload(upload: &SocialUpload<'_>, v: &mut RequestValidator) {
    let ext = upload.media_extension.unwrap_or_default();
    if !SOCIAL_MEDIA_EXTENSIONS.contains(&ext) {
        v.fail(
            "media_file",
            format!("Unsupported file extension. Allowed: {}.", SOCIAL_MEDIA_EXTENSIONS.join(", ")),
        );
    }
    match upload.content_type {
        "video" => {
            if SOCIAL_MEDIA_EXTENSIONS.contains(&ext) && !VIDEO_EXTENSIONS.contains(&ext) {
                v.fail("media_file", "Video posts must be mp4, mov or avi.");
            }
            if upload.duration_seconds.is_some_and(|d| d > MAX_VIDEO_SECONDS) {
                v.fail("duration", "Video cannot exceed 1 minute.");
            }
        }
        "image" => {
            if let Some(song_ext) = upload.song_extension {
                let ok = song_ext.is_some_and(|e| SONG_AUDIO_EXTENSIONS.contains(&e));
                if !ok {
                    v.fail("song", "Song audio must be mp3, wav or ogg.");
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(v: &mut RequestValidator) -> ValidationErrors {
        match v.finish() {
            Err(AppError::Validation(e)) => e,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn collects_all_field_errors() {
        let mut v = RequestValidator::new();
        v.required::<&str>("username", None)
            .email("email", Some("not-an-email"))
            .min_length("password", Some("short"), PASSWORD_MIN);
        let e = errors(&mut v);
        assert!(e.field("username").is_some());
        assert!(e.field("email").is_some());
        assert!(e.field("password").is_some());
    }

    #[test]
    fn passing_rules_finish_ok() {
        let mut v = RequestValidator::new();
        v.email("email", Some("a@b.org"))
            .username("username", Some("grace.hopper"))
            .range("rating", Some(5), 1, 5)
            .max_length("name", Some("Vinyl"), 100);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn username_rejects_spaces() {
        let mut v = RequestValidator::new();
        v.username("username", Some("two words"));
        assert!(errors(&mut v).field("username").is_some());
    }

    #[test]
    fn durations_accept_seconds_and_clock_form() {
        assert_eq!(parse_duration("90"), Ok(90.0));
        assert_eq!(parse_duration("12.5"), Ok(12.5));
        assert_eq!(parse_duration("01:30"), Ok(90.0));
        assert_eq!(parse_duration("1:00:05"), Ok(3605.0));
        assert!(parse_duration("1:75").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn long_video_is_rejected_on_duration() {
        let mut v = RequestValidator::new();
        validate_social_upload(
            &SocialUpload {
                content_type: "video",
                media_extension: Some("mp4"),
                duration_seconds: Some(90.0),
                song_extension: None,
            },
            &mut v,
        );
        let e = errors(&mut v);
        assert_eq!(e.field("duration").map(|m| m.len()), Some(1));
        assert!(e.field("media_file").is_none());
    }

    #[test]
    fn video_with_image_extension_is_rejected() {
        let mut v = RequestValidator::new();
        validate_social_upload(
            &SocialUpload {
                content_type: "video",
                media_extension: Some("png"),
                duration_seconds: Some(10.0),
                song_extension: None,
            },
            &mut v,
        );
        assert!(errors(&mut v).field("media_file").is_some());
    }

    #[test]
    fn image_with_flac_song_is_rejected() {
        let mut v = RequestValidator::new();
        validate_social_upload(
            &SocialUpload {
                content_type: "image",
                media_extension: Some("jpg"),
                duration_seconds: None,
                song_extension: Some(Some("flac")),
            },
            &mut v,
        );
        assert!(errors(&mut v).field("song").is_some());
    }

    #[test]
    fn image_with_mp3_song_passes() {
        let mut v = RequestValidator::new();
        validate_social_upload(
            &SocialUpload {
                content_type: "image",
                media_extension: Some("jpeg"),
                duration_seconds: None,
                song_extension: Some(Some("mp3")),
            },
            &mut v,
        );
        assert!(v.finish().is_ok());
    }
}
