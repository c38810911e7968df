use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Alpha-mask stem suffixes, in precedence order. An optional `$N` marks a
// duplicate name inside a bundle.
pub(crate) static ALPHA_SUFFIXES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [r"\[alpha\](\$[0-9]+)?$", r"_alpha(\$[0-9]+)?$", r"alpha(\$[0-9]+)?$", r"a(\$[0-9]+)?$"]
        .map(|pattern| Regex::new(pattern).unwrap())
});

regex!(ATLAS_DESCRIPTOR, r"^portraits#[0-9]+\.json$");

/// Extensions of images the alpha stage considers.
pub(crate) const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Extensions the text stage never touches.
pub(crate) const TEXT_SKIP_EXTENSIONS: [&str; 16] = [
    "atlas", "skel", "wav", "mp3", "m4a", "mp4", "avi", "mov", "mkv", "flv", "png", "jpg", "jpeg", "webp", "ab", "bin",
];

/// Stem suffixes marking data tables outside `gamedata`.
pub(crate) const TABLE_SUFFIXES: [&str; 4] = ["_table", "_data", "_database", "_const"];

/// Directory holding encrypted Lua scripts.
pub(crate) const SCRIPT_DIR: &str = "[uc]lua";

/// Bytes sniffed when deciding whether a file is binary.
pub(crate) const SNIFF_LEN: usize = 1024;
