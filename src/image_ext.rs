//! Shared image file-extension knowledge for resolvers and the dedup walker.

/// File extensions treated as directly downloadable images.
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Returns true if `ext` (without the leading dot) names an image format.
pub(crate) fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
}

/// Returns true if a URL path or file name ends in an image extension.
pub(crate) fn has_image_extension(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .is_some_and(|ext| ext != path && is_image_extension(ext))
}
