//! Built-in plugins
//!
//! Each plugin fires either because the job name contains its marker word or
//! because the job enables it explicitly in its `plugins` list.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::{PluginAction, PluginError, PluginRegistry, PluginTarget};

pub const TTS: &str = "tts";
pub const FILE_MOVE: &str = "file-move";
pub const MEDIA_CONVERT: &str = "media-convert";
pub const EMAIL_NOTIFY: &str = "email-notify";

/// Every built-in plugin, in default registration order
pub const ALL: [&str; 4] = [TTS, FILE_MOVE, MEDIA_CONVERT, EMAIL_NOTIFY];

#[derive(Debug, Error)]
#[error("unknown plugin '{0}' (available: tts, file-move, media-convert, email-notify)")]
pub struct UnknownPlugin(pub String);

/// Server-side settings of the built-in plugins
#[derive(Debug, Clone)]
pub struct BuiltinOptions {
    /// Directory that file moves may read from and write into
    pub file_move_root: PathBuf,
}

impl BuiltinOptions {
    pub fn new(file_move_root: impl Into<PathBuf>) -> Self {
        Self {
            file_move_root: file_move_root.into(),
        }
    }
}

pub fn is_builtin(name: &str) -> bool {
    ALL.contains(&name)
}

/// Looks up a built-in plugin by name
pub fn by_name(name: &str, options: &BuiltinOptions) -> Option<PluginAction> {
    match name {
        TTS => Some(tts()),
        FILE_MOVE => Some(file_move(options.file_move_root.clone())),
        MEDIA_CONVERT => Some(media_convert()),
        EMAIL_NOTIFY => Some(email_notify()),
        _ => None,
    }
}

/// Registry holding the named built-ins in the given order
pub fn registry<S: AsRef<str>>(
    names: &[S],
    options: &BuiltinOptions,
) -> Result<PluginRegistry, UnknownPlugin> {
    let mut registry = PluginRegistry::new();
    for name in names {
        let name = name.as_ref().trim();
        let action = by_name(name, options).ok_or_else(|| UnknownPlugin(name.to_string()))?;
        registry.register(action);
    }
    Ok(registry)
}

fn name_or_enabled(target: &PluginTarget<'_>, id: &str, marker: &str) -> bool {
    target.job_name.contains(marker) || target.job.plugin(id).is_some()
}

pub fn tts() -> PluginAction {
    PluginAction::new(
        TTS,
        |t| name_or_enabled(t, TTS, "Speak"),
        |t, console| {
            console.info(format!("Speaking summary for job: {}", t.job_name));
            Ok(())
        },
    )
}

/// Moves `source` to `destination` when both are configured.
///
/// Relative paths resolve against `root`. Both ends must lie inside `root`
/// after symlinks are resolved.
pub fn file_move(root: impl Into<PathBuf>) -> PluginAction {
    let root = root.into();
    PluginAction::new(
        FILE_MOVE,
        |t| name_or_enabled(t, FILE_MOVE, "Transfer"),
        move |t, console| {
            console.info(format!("Transferring files for job: {}", t.job_name));

            let settings = t.job.plugin(FILE_MOVE);
            let source = settings.and_then(|s| s.get("source"));
            let destination = settings.and_then(|s| s.get("destination"));

            match (source, destination) {
                (Some(source), Some(destination)) => {
                    let root = root.canonicalize().map_err(|e| {
                        PluginError::Failed(format!(
                            "file-move root '{}' is unusable: {e}",
                            root.display()
                        ))
                    })?;
                    let from = existing_within(&root, source)?;
                    let to = target_within(&root, destination)?;

                    fs::rename(&from, &to)?;
                    info!(job = %t.job_name, source = %from.display(), destination = %to.display(), "files moved");
                    console.info(format!("Moved {source} to {destination}"));
                    Ok(())
                }
                (Some(_), None) => Err(PluginError::MissingSetting("destination".into())),
                (None, Some(_)) => Err(PluginError::MissingSetting("source".into())),
                (None, None) => Ok(()),
            }
        },
    )
}

/// Resolves a path that must already exist.
fn existing_within(root: &Path, raw: &str) -> Result<PathBuf, PluginError> {
    let resolved = root.join(raw).canonicalize()?;
    ensure_within(root, resolved)
}

/// Resolves a path that may not exist yet; its parent directory must.
fn target_within(root: &Path, raw: &str) -> Result<PathBuf, PluginError> {
    let candidate = root.join(raw);
    let outside = || PluginError::OutsideRoot {
        path: candidate.clone(),
        root: root.to_path_buf(),
    };
    let file_name = candidate.file_name().ok_or_else(outside)?;
    let parent = candidate.parent().ok_or_else(outside)?.canonicalize()?;
    ensure_within(root, parent.join(file_name))
}

fn ensure_within(root: &Path, path: PathBuf) -> Result<PathBuf, PluginError> {
    if path != root && path.starts_with(root) {
        Ok(path)
    } else {
        Err(PluginError::OutsideRoot {
            path,
            root: root.to_path_buf(),
        })
    }
}

pub fn media_convert() -> PluginAction {
    PluginAction::new(
        MEDIA_CONVERT,
        |t| name_or_enabled(t, MEDIA_CONVERT, "Convert"),
        |t, console| {
            console.info(format!("Converting media for: {}", t.job_name));
            if let Some(folder) = t.job.plugin(MEDIA_CONVERT).and_then(|s| s.get("folder")) {
                console.info(format!("Media folder: {folder}"));
            }
            Ok(())
        },
    )
}

pub fn email_notify() -> PluginAction {
    PluginAction::new(
        EMAIL_NOTIFY,
        |t| t.context.notify,
        |t, console| {
            console.info(format!("Email sent: Build succeeded for {}", t.job_name));
            Ok(())
        },
    )
}
