/// Whether `path` is selected by a server's path whitelist.
///
/// An absent or empty whitelist accepts everything. Otherwise a path is
/// accepted when it starts with a whitelist entry, or when a whitelist entry
/// starts with it, so both directory prefixes and exact files can be listed.
pub fn is_whitelisted(whitelist: Option<&[String]>, path: &str) -> bool {
    match whitelist {
        None | Some([]) => true,
        Some(prefixes) => prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()) || prefix.starts_with(path)),
    }
}
