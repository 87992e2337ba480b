use std::collections::BTreeSet;
use std::fmt::Write as _;

use gdrive_core::DriveFile;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];
pub const SYNCED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "txt"];

/// One node of the remote folder tree. `path` is root-relative and always
/// `/`-separated; `children` is only populated for folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub is_folder: bool,
    pub size: Option<u64>,
    pub modified_time: Option<OffsetDateTime>,
    pub path: String,
    pub children: Vec<RemoteFile>,
}

impl RemoteFile {
    pub fn from_drive(file: &DriveFile, parent_path: &str, children: Vec<RemoteFile>) -> Self {
        let modified_time = file.modified_time.as_deref().and_then(|value| {
            OffsetDateTime::parse(value, &Rfc3339)
                .map_err(|err| {
                    tracing::warn!(file = %file.name, value, %err, "unparseable modifiedTime");
                })
                .ok()
        });
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            is_folder: file.is_folder(),
            size: file.size_bytes(),
            modified_time,
            path: join_remote_path(parent_path, &file.name),
            children,
        }
    }
}

pub fn join_remote_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

pub fn has_extension(name: &str, extensions: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| lower.strip_suffix(*ext).is_some_and(|rest| rest.ends_with('.')))
}

/// Depth-first flattening of every non-folder node whose name matches `extensions`.
pub fn flatten_files<'a>(tree: &'a [RemoteFile], extensions: &[&str]) -> Vec<&'a RemoteFile> {
    let mut out = Vec::new();
    collect_files(tree, extensions, &mut out);
    out
}

fn collect_files<'a>(items: &'a [RemoteFile], extensions: &[&str], out: &mut Vec<&'a RemoteFile>) {
    for item in items {
        if item.is_folder {
            collect_files(&item.children, extensions, out);
        } else if has_extension(&item.name, extensions) {
            out.push(item);
        }
    }
}

pub fn image_files(tree: &[RemoteFile]) -> Vec<&RemoteFile> {
    flatten_files(tree, IMAGE_EXTENSIONS)
}

pub fn synced_files(tree: &[RemoteFile]) -> Vec<&RemoteFile> {
    flatten_files(tree, SYNCED_EXTENSIONS)
}

pub fn top_level_folders(tree: &[RemoteFile]) -> BTreeSet<String> {
    tree.iter()
        .filter(|item| item.is_folder)
        .map(|item| item.name.clone())
        .collect()
}

pub fn render_tree(tree: &[RemoteFile]) -> String {
    let mut out = String::new();
    render_level(tree, 0, &mut out);
    out
}

fn render_level(items: &[RemoteFile], depth: usize, out: &mut String) {
    for item in items {
        let indent = "  ".repeat(depth);
        if item.is_folder {
            let _ = writeln!(out, "{indent}{}/", item.name);
            render_level(&item.children, depth + 1, out);
        } else {
            match item.size {
                Some(size) => {
                    let _ = writeln!(out, "{indent}{} ({} KB)", item.name, size.div_ceil(1024));
                }
                None => {
                    let _ = writeln!(out, "{indent}{}", item.name);
                }
            }
        }
    }
}
