/*!
 * MIME Resolution
 * Filename overrides, configured extension table, then extension guessing
 */

use std::collections::HashMap;
use std::path::Path;

use super::paths::basename;
use crate::config::MimeConfig;
use crate::core::limits::DEFAULT_MIME;

/// Resolves MIME types for entry names
#[derive(Debug, Clone, Default)]
pub struct MimeResolver {
    filenames: HashMap<String, String>,
    extensions: HashMap<String, String>,
}

impl MimeResolver {
    pub fn new(config: &MimeConfig) -> Self {
        let extensions = config
            .define
            .iter()
            .flat_map(|(mime, exts)| {
                exts.iter()
                    .map(move |ext| (ext.trim_start_matches('.').to_lowercase(), mime.clone()))
            })
            .collect();

        Self {
            filenames: config.filenames.clone(),
            extensions,
        }
    }

    /// MIME type for a filename or path
    pub fn lookup(&self, filename: &str) -> String {
        let name = basename(filename);

        if let Some(mime) = self.filenames.get(name) {
            return mime.clone();
        }

        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        if let Some(mime) = extension.as_ref().and_then(|e| self.extensions.get(e)) {
            return mime.clone();
        }

        mime_guess::from_path(name)
            .first_raw()
            .unwrap_or(DEFAULT_MIME)
            .to_string()
    }
}
