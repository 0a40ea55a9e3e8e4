//! Locating a Chromium-based executable.

use std::path::PathBuf;

/// Executable names looked up on `PATH`, most common first.
const CHROMIUM_EXECUTABLES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "microsoft-edge",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const PLATFORM_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const PLATFORM_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_PATHS: &[&str] = &[];

/// Find a browser executable.
///
/// Order: the configured path, the `CHROME` environment variable, well-known
/// install locations, then `PATH`.
pub fn detect_browser(custom_path: Option<&str>) -> Option<PathBuf> {
    let explicit = custom_path
        .map(PathBuf::from)
        .into_iter()
        .chain(std::env::var_os("CHROME").map(PathBuf::from))
        .chain(PLATFORM_PATHS.iter().map(PathBuf::from));

    for candidate in explicit {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    CHROMIUM_EXECUTABLES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Short, platform-specific install hint for launch failures.
pub fn install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "install Chrome (brew install --cask google-chrome) or set browser.chrome_path"
    } else if cfg!(target_os = "windows") {
        "install Chrome (winget install Google.Chrome) or set browser.chrome_path"
    } else {
        "install Chromium (e.g. apt install chromium) or set browser.chrome_path / CHROME"
    }
}
