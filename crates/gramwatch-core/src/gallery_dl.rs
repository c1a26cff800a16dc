use crate::archive::MediaKind;
use crate::error::FetchError;
use crate::fetcher::{DiscoveredItem, FetchedFile, MediaFetcher};
use crate::settings::Settings;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

const MEDIA_EXTENSIONS: [&str; 3] = ["jpg", "mp4", "webp"];

/// gallery-dl invoked as a subprocess. All platform knowledge (page parsing,
/// session handling, rate limiting) lives in the tool; this adapter only
/// builds command lines and parses the filenames it prints.
pub struct GalleryDlFetcher {
    program: PathBuf,
    proxy: Option<String>,
    cookies: Option<PathBuf>,
}

impl GalleryDlFetcher {
    /// Tool path comes from `GALLERY_DL_PATH` or falls back to the PATH
    /// lookup. Proxy and cookie file come from settings; a cookie file that
    /// does not exist yet is simply not passed along.
    pub fn from_settings(settings: &Settings) -> Self {
        let program = env::var("GALLERY_DL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("gallery-dl"));

        let cookies = {
            let path = settings.cookies_path();
            if path.is_file() {
                Some(path)
            } else {
                None
            }
        };

        GalleryDlFetcher {
            program,
            proxy: settings.proxy().map(str::to_string),
            cookies,
        }
    }

    fn account_url(account: &str) -> String {
        format!("https://www.instagram.com/{}/", account)
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(proxy) = &self.proxy {
            cmd.arg("--proxy").arg(proxy);
        }
        if let Some(cookies) = &self.cookies {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd
    }

    fn run(&self, cmd: &mut Command) -> Result<Output, FetchError> {
        debug!("Running {:?}", cmd);
        cmd.output().map_err(|e| FetchError::Spawn {
            program: self.program.display().to_string(),
            detail: e.to_string(),
        })
    }
}

fn stderr_excerpt(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        format!("exit status {}", output.status)
    } else {
        trimmed.chars().take(500).collect()
    }
}

fn is_media_filename(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        }
        None => false,
    }
}

/// Parse simulate-mode output into discovered items. Each media line is the
/// bare filename, sometimes prefixed with "# "; anything else (warnings,
/// progress chatter) is ignored.
pub fn parse_scan_output(stdout: &str, kind: MediaKind) -> Vec<DiscoveredItem> {
    let mut items = Vec::new();
    let mut media_index = 0u32;

    for line in stdout.lines() {
        let line = line.trim();
        let line = line.strip_prefix("# ").unwrap_or(line);
        if line.is_empty() || !is_media_filename(line) {
            continue;
        }

        media_index += 1;
        let stem = line.rsplit_once('.').map(|(s, _)| s).unwrap_or(line);
        let post_id = stem.split('_').next().unwrap_or(stem).to_string();

        items.push(DiscoveredItem {
            id: line.to_string(),
            post_id,
            kind,
            media_index,
        });
    }

    items
}

/// Parse download-mode output into the files it wrote. gallery-dl prints one
/// path per line; metadata JSON files come from `--write-metadata`.
pub fn parse_download_output(stdout: &str) -> Vec<FetchedFile> {
    stdout
        .lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("# ").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| FetchedFile {
            path: PathBuf::from(line),
            is_metadata: line.to_lowercase().ends_with(".json"),
        })
        .collect()
}

impl MediaFetcher for GalleryDlFetcher {
    fn scan(
        &self,
        account: &str,
        kind: MediaKind,
        limit: u32,
    ) -> Result<Vec<DiscoveredItem>, FetchError> {
        let mut cmd = self.base_command();
        cmd.arg("--simulate")
            .arg("-o")
            .arg(format!("extractor.instagram.include={}", kind.plural()))
            .arg("--range")
            .arg(format!("1-{}", limit))
            .arg(Self::account_url(account));

        let output = self.run(&mut cmd)?;
        let items = parse_scan_output(&String::from_utf8_lossy(&output.stdout), kind);

        // The tool exits non-zero on partial failures (e.g. an expired story)
        // even when it listed media; treat output as success in that case.
        if items.is_empty() && !output.status.success() {
            return Err(FetchError::Account {
                account: account.to_string(),
                detail: stderr_excerpt(&output),
            });
        }

        Ok(items)
    }

    fn fetch_item(
        &self,
        account: &str,
        item: &DiscoveredItem,
        dest_dir: &Path,
    ) -> Result<Vec<FetchedFile>, FetchError> {
        let mut cmd = self.base_command();
        cmd.arg("--range")
            .arg(format!("{}-{}", item.media_index, item.media_index))
            .arg("--write-metadata")
            .arg("-o")
            .arg(format!("extractor.instagram.include={}", item.kind.plural()))
            .arg("-D")
            .arg(dest_dir)
            .arg(Self::account_url(account));

        let output = self.run(&mut cmd)?;
        if !output.status.success() {
            return Err(FetchError::Item {
                id: item.id.clone(),
                detail: stderr_excerpt(&output),
            });
        }

        let files = parse_download_output(&String::from_utf8_lossy(&output.stdout));
        if files.is_empty() {
            warn!("No files reported for item {}", item.id);
        }
        Ok(files)
    }

    fn download_url(&self, url: &str, dest_dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        let mut cmd = self.base_command();
        cmd.arg("--write-metadata").arg("-D").arg(dest_dir).arg(url);

        let output = self.run(&mut cmd)?;
        if !output.status.success() {
            return Err(FetchError::Url {
                url: url.to_string(),
                detail: stderr_excerpt(&output),
            });
        }

        Ok(parse_download_output(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .map(|f| f.path)
            .collect())
    }
}
