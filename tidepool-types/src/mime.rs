//! MIME classification for upload routing.

/// Extension → MIME type for the formats a project tree actually produces.
const MIME_TYPES: &[(&str, &str)] = &[
    // Text and docs
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    // Code
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("cjs", "text/javascript"),
    ("jsx", "text/javascript"),
    ("ts", "text/typescript"),
    ("tsx", "text/typescript"),
    ("rs", "text/x-rust"),
    ("py", "text/x-python"),
    ("go", "text/x-go"),
    ("sh", "text/x-shellscript"),
    ("vue", "text/x-vue"),
    ("svelte", "text/x-svelte"),
    ("astro", "text/x-astro"),
    // Web
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("scss", "text/x-scss"),
    ("sass", "text/x-sass"),
    ("less", "text/x-less"),
    // Data and config
    ("json", "application/json"),
    ("jsonc", "application/json"),
    ("xml", "application/xml"),
    ("yaml", "text/yaml"),
    ("yml", "text/yaml"),
    ("toml", "text/x-toml"),
    ("env", "text/plain"),
    ("csv", "text/csv"),
    ("sql", "text/x-sql"),
    ("graphql", "text/x-graphql"),
    // Images
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("avif", "image/avif"),
    // Fonts
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    // Media
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    // Documents and archives
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("wasm", "application/wasm"),
];

/// Extensionless filenames that are still text.
const TEXT_FILENAMES: &[&str] = &["dockerfile", "makefile", "license", "readme", "gitignore"];

/// Returns the MIME type for a path, based on its extension.
///
/// Unknown extensions fall back to `application/octet-stream`; a handful of
/// well-known extensionless filenames map to `text/plain`.
#[must_use]
pub fn mime_for_path(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) => {
            let ext = ext.to_ascii_lowercase();
            if let Some((_, mime)) = MIME_TYPES.iter().find(|(e, _)| *e == ext) {
                return mime;
            }
            // Dotfiles like `.gitignore` split into an empty stem.
            if stem.is_empty() && TEXT_FILENAMES.contains(&ext.as_str()) {
                return "text/plain";
            }
            "application/octet-stream"
        }
        None => {
            if TEXT_FILENAMES.contains(&name.to_ascii_lowercase().as_str()) {
                "text/plain"
            } else {
                "application/octet-stream"
            }
        }
    }
}
