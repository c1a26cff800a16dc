use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fields pulled out of the tool's metadata JSON for one post. Every field
/// is best-effort: the tool's schema varies by extractor version, so missing
/// keys degrade to empty values rather than errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostInfo {
    pub username: String,
    pub fullname: String,
    pub timestamp: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub location: String,
    pub likes: i64,
    pub comments: i64,
    pub is_video: bool,
    pub post_url: String,
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn extract_caption(data: &Value) -> String {
    let caption = str_field(data, "description");
    if !caption.is_empty() {
        return caption;
    }
    let caption = str_field(data, "caption");
    if !caption.is_empty() {
        return caption;
    }
    // Older extractor versions nest the caption in GraphQL edges
    data.pointer("/edge_media_to_caption/edges/0/node/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Hashtags from the `tags` array when present, otherwise scanned out of the
/// caption text.
fn extract_hashtags(data: &Value, caption: &str) -> Vec<String> {
    if let Some(tags) = data.get("tags").and_then(Value::as_array) {
        let tags: Vec<String> = tags
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !tags.is_empty() {
            return tags;
        }
    }
    scan_hashtags(caption)
}

fn scan_hashtags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '#' {
            continue;
        }
        let rest = &text[i + 1..];
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if end > 0 {
            tags.push(rest[..end].to_string());
        }
    }
    tags
}

fn extract_mentions(data: &Value) -> Vec<String> {
    let Some(tagged) = data.get("tagged_users").and_then(Value::as_array) else {
        return Vec::new();
    };
    tagged
        .iter()
        .filter_map(|user| match user {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => {
                let username = str_field(user, "username");
                if username.is_empty() {
                    None
                } else {
                    Some(username)
                }
            }
            _ => None,
        })
        .collect()
}

fn extract_location(data: &Value) -> String {
    let slug = str_field(data, "location_slug");
    if !slug.is_empty() {
        return slug;
    }
    if let Some(location) = data.get("location") {
        let name = str_field(location, "name");
        if !name.is_empty() {
            return name;
        }
        return str_field(location, "slug");
    }
    String::new()
}

fn extract_timestamp(data: &Value) -> String {
    let preformatted = str_field(data, "post_date");
    if !preformatted.is_empty() {
        return preformatted;
    }
    match data.get("timestamp") {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

pub fn parse_post_info(data: &Value, fallback_username: &str) -> PostInfo {
    let username = {
        let direct = str_field(data, "username");
        if !direct.is_empty() {
            direct
        } else {
            let owner = data
                .pointer("/owner/username")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if owner.is_empty() {
                fallback_username.to_string()
            } else {
                owner.to_string()
            }
        }
    };

    let fullname = {
        let direct = str_field(data, "fullname");
        if !direct.is_empty() {
            direct
        } else {
            data.pointer("/owner/full_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        }
    };

    let caption = extract_caption(data);
    let hashtags = extract_hashtags(data, &caption);

    let post_url = {
        let direct = str_field(data, "post_url");
        if !direct.is_empty() {
            direct
        } else {
            let shortcode = str_field(data, "shortcode");
            if shortcode.is_empty() {
                String::new()
            } else {
                format!("https://instagram.com/p/{}/", shortcode)
            }
        }
    };

    PostInfo {
        username,
        fullname,
        timestamp: extract_timestamp(data),
        mentions: extract_mentions(data),
        location: extract_location(data),
        likes: data.get("likes").and_then(Value::as_i64).unwrap_or(0),
        comments: data.get("comments").and_then(Value::as_i64).unwrap_or(0),
        is_video: data.get("is_video").and_then(Value::as_bool).unwrap_or(false)
            || data.get("video_url").is_some(),
        post_url,
        caption,
        hashtags,
    }
}

pub fn render_text(info: &PostInfo) -> String {
    let or_dash = |s: &str| {
        if s.is_empty() {
            "-".to_string()
        } else {
            s.to_string()
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "User:      @{} ({})", info.username, or_dash(&info.fullname));
    let _ = writeln!(out, "Posted:    {}", or_dash(&info.timestamp));
    let _ = writeln!(out, "Location:  {}", or_dash(&info.location));
    let _ = writeln!(out, "Type:      {}", if info.is_video { "video" } else { "image" });
    let _ = writeln!(out, "Likes:     {}", info.likes);
    let _ = writeln!(out, "Comments:  {}", info.comments);
    let tags = if info.hashtags.is_empty() {
        "-".to_string()
    } else {
        info.hashtags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "Tags:      {}", tags);
    let mentions = if info.mentions.is_empty() {
        "-".to_string()
    } else {
        info.mentions
            .iter()
            .map(|m| format!("@{}", m))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "Mentions:  {}", mentions);
    let _ = writeln!(out, "Link:      {}", or_dash(&info.post_url));
    let _ = writeln!(out, "Caption:");
    for line in info.caption.lines() {
        let _ = writeln!(out, "    {}", line);
    }
    if info.caption.is_empty() {
        let _ = writeln!(out, "    -");
    }
    out
}

/// Sidecar path for a metadata file: `X.jpg.json` -> `X.jpg.info.txt`.
pub fn sidecar_path_for(json_path: &Path) -> PathBuf {
    let s = json_path.to_string_lossy();
    let base = s
        .strip_suffix(".json")
        .or_else(|| s.strip_suffix(".JSON"))
        .unwrap_or(&s);
    PathBuf::from(format!("{}.info.txt", base))
}

/// Media file a metadata JSON describes: `X.jpg.json` -> `X.jpg`.
fn media_path_for(json_path: &Path) -> PathBuf {
    let s = json_path.to_string_lossy();
    let base = s
        .strip_suffix(".json")
        .or_else(|| s.strip_suffix(".JSON"))
        .unwrap_or(&s);
    PathBuf::from(base)
}

fn move_into(path: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path without a file name"))?;
    let dest = dest_dir.join(name);
    fs::rename(path, &dest)?;
    Ok(dest)
}

/// Sort freshly downloaded files into per-account directories. Each metadata
/// JSON names the post owner; it and the media file it describes move to
/// `{root}/{username}/` and the text sidecar is written alongside. Files no
/// metadata claims stay where the tool put them. Returns the final location
/// of every input file, in input order.
pub fn classify_downloads(files: &[PathBuf], root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut relocated: HashMap<PathBuf, PathBuf> = HashMap::new();

    for path in files {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            continue;
        }
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        let Ok(data) = serde_json::from_str::<Value>(&content) else {
            debug!("Unparseable metadata {}", path.display());
            continue;
        };
        let info = parse_post_info(&data, "");
        if info.username.is_empty() {
            continue;
        }

        let dest_dir = root.join(&info.username);
        fs::create_dir_all(&dest_dir)?;

        let media = media_path_for(path);
        if media != *path && media.is_file() {
            relocated.insert(media.clone(), move_into(&media, &dest_dir)?);
        }
        let new_json = move_into(path, &dest_dir)?;
        fs::write(sidecar_path_for(&new_json), render_text(&info))?;
        relocated.insert(path.clone(), new_json);
    }

    Ok(files
        .iter()
        .map(|path| relocated.get(path).cloned().unwrap_or_else(|| path.clone()))
        .collect())
}

/// Read a metadata JSON written by the fetch tool and persist the extracted
/// summary as a text sidecar next to it. Returns the sidecar path.
pub fn write_sidecar(json_path: &Path, account: &str) -> io::Result<PathBuf> {
    let content = fs::read_to_string(json_path)?;
    let data: Value = serde_json::from_str(&content)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let info = parse_post_info(&data, account);
    let sidecar = sidecar_path_for(json_path);
    fs::write(&sidecar, render_text(&info))?;
    debug!("Wrote metadata sidecar {}", sidecar.display());
    Ok(sidecar)
}
