use regex::Regex;
use std::sync::OnceLock;

fn wildcard_runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"\?+").expect("valid wildcard regex"))
}

/// Character-wise pattern over the common length of `strings`: shared
/// characters are kept, differing positions become `*`
fn forward_glob<I, S>(strings: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let chars: Vec<Vec<char>> = strings
        .into_iter()
        .map(|s| s.as_ref().chars().collect())
        .collect();
    let common = chars.iter().map(Vec::len).min().unwrap_or(0);

    let pattern: String = (0..common)
        .map(|i| {
            let first = chars[0][i];
            if chars.iter().all(|c| c[i] == first) {
                first
            } else {
                '?'
            }
        })
        .collect();

    wildcard_runs().replace_all(&pattern, "*").into_owned()
}

/// Glob pattern matching every string of `strings`, e.g.
/// `["s1a-iw-vv-001.tiff", "s1a-iw-vh-001.tiff"]` gives `"s1a-iw-v*-001.tiff"`.
///
/// Strings are compared position by position from the start; if that ends
/// in a wildcard, the tail is recovered by comparing them from the end.
pub fn get_glob<S: AsRef<str>>(strings: &[S]) -> String {
    let mut glob = forward_glob(strings.iter().map(|s| s.as_ref()));

    if glob.ends_with('*') {
        let reversed: Vec<String> = strings
            .iter()
            .map(|s| s.as_ref().chars().rev().collect())
            .collect();
        let tail: String = forward_glob(&reversed).chars().rev().collect();
        glob.push_str(&tail);
        glob = glob.replace("**", "*");
    }

    glob
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarization_glob() {
        let files = ["s1a-iw-vv-001.tiff", "s1a-iw-vh-001.tiff"];
        assert_eq!(get_glob(&files), "s1a-iw-v*-001.tiff");
    }

    #[test]
    fn test_different_lengths() {
        assert_eq!(get_glob(&["abc1xyz", "abc22xyz"]), "abc*xyz");
    }

    #[test]
    fn test_identical_and_empty() {
        assert_eq!(get_glob(&["manifest.safe"]), "manifest.safe");
        assert_eq!(get_glob(&["same", "same"]), "same");
        let none: [&str; 0] = [];
        assert_eq!(get_glob(&none), "");
    }
}
