use hyper::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    Body, Response, StatusCode,
};
use rand::Rng;
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;

/// Name of the only multipart field that may carry a file.
pub const AVATAR_FIELD: &str = "avatar";

/// Upper bound (inclusive) of the random part of generated file names.
const RANDOM_SUFFIX_MAX: u32 = 1_000_000_000;

/// The directory uploaded avatars are written to and served from.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Creates `dir` if it does not exist.
    pub async fn open(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates a new file for an upload whose client-side name was
    /// `original_name`. Returns the generated name along with the open file.
    pub async fn create(&self, original_name: &str) -> io::Result<(String, File)> {
        let file_name = unique_file_name(original_name);
        let path = self.dir.join(&file_name);
        trace!("creating upload {:?} for '{}'", path, original_name);
        let file = File::create(&path).await?;
        Ok((file_name, file))
    }

    /// Deletes a stored upload. Failures are logged, not returned.
    pub async fn remove(&self, file_name: &str) {
        let path = self.dir.join(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => info!("removed upload {:?}", path),
            Err(e) => warn!("failed to remove upload {:?}: {}", path, e),
        }
    }

    /// Maps a request path below the uploads prefix to a file inside the
    /// upload directory. Percent-escapes are decoded, `..` segments are refused.
    pub fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(requested)
            .ok()
            .map(|decoded| decoded.to_string())?;

        let mut path = self.dir.clone();
        let mut segments = 0;
        for segment in decoded.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s if s.contains('\\') || s.contains('\0') => return None,
                s => {
                    path.push(s);
                    segments += 1;
                }
            }
        }

        if segments == 0 {
            None
        } else {
            Some(path)
        }
    }

    /// Answers a `GET` or `HEAD` for a stored file, `None` when there is no
    /// such file. The body is streamed from the open file.
    pub async fn serve(&self, requested: &str, head_only: bool) -> Option<Response<Body>> {
        let path = self.resolve(requested)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("failed to open upload {:?}: {}", path, e);
                }
                return None;
            }
        };

        let metadata = match file.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return None,
            Err(e) => {
                warn!("failed to read metadata of upload {:?}: {}", path, e);
                return None;
            }
        };

        let body = if head_only {
            Body::empty()
        } else {
            Body::wrap_stream(ReaderStream::new(file))
        };

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::OK;

        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        if let Ok(value) = mime.as_ref().parse() {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, metadata.len().into());
        Some(response)
    }
}

/// `<ms timestamp>-<random integer><original extension>`
pub fn unique_file_name(original_name: &str) -> String {
    let suffix = rand::thread_rng().gen_range(0..=RANDOM_SUFFIX_MAX);
    format!(
        "{}-{}{}",
        crate::current_timestamp_ms(),
        suffix,
        extension_of(original_name)
    )
}

/// Last extension including the dot, empty when there is none.
fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
